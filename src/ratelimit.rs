use std::time::{Duration, Instant};

/// Sliding-window request counter applied locally, before the remote quota
/// check. Each allowed call is recorded; calls beyond `max_requests` within
/// the window are refused until old entries age out.
#[derive(Debug)]
pub struct RateLimiter {
    requests: Vec<Instant>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            requests: Vec::new(),
            max_requests,
            window,
        }
    }

    pub fn can_make_request(&mut self) -> bool {
        let now = Instant::now();
        self.requests
            .retain(|t| now.duration_since(*t) < self.window);

        if self.requests.len() >= self.max_requests {
            return false;
        }
        self.requests.push(now);
        true
    }

    /// Time until the oldest recorded request leaves the window.
    pub fn time_until_next_window(&self) -> Duration {
        match self.requests.first() {
            None => Duration::ZERO,
            Some(first) => self.window.saturating_sub(first.elapsed()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_after_limit_within_window() {
        let mut limiter = RateLimiter::new(2, Duration::from_millis(1000));
        assert!(limiter.can_make_request());
        assert!(limiter.can_make_request());
        assert!(!limiter.can_make_request());
    }

    #[test]
    fn allows_again_after_window_elapses() {
        let mut limiter = RateLimiter::new(2, Duration::from_millis(50));
        assert!(limiter.can_make_request());
        assert!(limiter.can_make_request());
        assert!(!limiter.can_make_request());

        std::thread::sleep(Duration::from_millis(60));
        assert!(limiter.can_make_request());
    }

    #[test]
    fn reports_time_until_next_window() {
        let mut limiter = RateLimiter::new(1, Duration::from_millis(1000));
        assert_eq!(limiter.time_until_next_window(), Duration::ZERO);

        assert!(limiter.can_make_request());
        let wait = limiter.time_until_next_window();
        assert!(wait > Duration::ZERO && wait <= Duration::from_millis(1000));
    }
}
