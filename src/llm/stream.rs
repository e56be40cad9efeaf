use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::{debug, error};

use super::{LlmError, StreamResponse};

/// How many times a stream that closes before producing any content is
/// re-polled before giving up. Models transient empty-first-chunk responses
/// from the upstream service.
pub const MAX_NO_CONTENT_RETRIES: u32 = 3;
pub const NO_CONTENT_RETRY_DELAY: Duration = Duration::from_millis(2000);

/// Decode a server-sent-event style byte stream into the full response text.
///
/// Frames are newline-delimited. Lines starting with `:` are comments and
/// skipped; `data: ` lines carry either the `[DONE]` terminator (skipped, the
/// transport closing signals the real end) or a JSON chunk. Every non-empty
/// content delta is appended to the accumulator and `on_update` is invoked
/// with the full accumulated text so far.
///
/// An inline error object in a frame aborts decoding, as does a frame that
/// fails to parse. A stream that closes with nothing accumulated is re-polled
/// up to [`MAX_NO_CONTENT_RETRIES`] times with a fixed delay before failing
/// with [`LlmError::NoContent`].
pub async fn process_stream<S>(
    stream: S,
    mut on_update: impl FnMut(&str),
) -> Result<String, LlmError>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>>,
{
    let mut stream = Box::pin(stream.fuse());
    let mut accumulated = String::new();
    let mut buffer = String::new();
    let mut no_content_retries = 0;

    loop {
        match stream.next().await {
            Some(chunk) => {
                let chunk = chunk?;
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_string();
                    buffer = buffer[pos + 1..].to_string();
                    handle_line(&line, &mut accumulated, &mut on_update)?;
                }
            }
            None => {
                if accumulated.is_empty() && no_content_retries < MAX_NO_CONTENT_RETRIES {
                    no_content_retries += 1;
                    debug!(attempt = no_content_retries, "stream closed empty, waiting");
                    tokio::time::sleep(NO_CONTENT_RETRY_DELAY).await;
                    continue;
                }
                break;
            }
        }
    }

    // A final frame may arrive without a trailing newline.
    let rest = buffer.trim().to_string();
    if !rest.is_empty() {
        handle_line(&rest, &mut accumulated, &mut on_update)?;
    }

    if accumulated.is_empty() {
        return Err(LlmError::NoContent);
    }
    Ok(accumulated)
}

fn handle_line(
    line: &str,
    accumulated: &mut String,
    on_update: &mut impl FnMut(&str),
) -> Result<(), LlmError> {
    if line.starts_with(':') {
        return Ok(());
    }
    let Some(data) = line.strip_prefix("data: ") else {
        return Ok(());
    };
    if data == "[DONE]" {
        return Ok(());
    }

    let parsed: StreamResponse = serde_json::from_str(data).map_err(|e| {
        error!(error = %e, "malformed stream frame");
        LlmError::Parse(e.to_string())
    })?;

    if let Some(choice) = parsed.choices.first() {
        if let Some(content) = choice.delta.content.as_deref() {
            if !content.is_empty() {
                accumulated.push_str(content);
                on_update(accumulated);
            }
        }
        if let Some(err) = &choice.error {
            return Err(LlmError::Stream(err.message.clone()));
        }
    }
    Ok(())
}
