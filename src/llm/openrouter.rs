use std::cell::RefCell;
use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use super::stream::process_stream;
use super::{ApiContent, ApiError, ApiMessage, ContentBlock, ErrorResponse, KeyInfo, LlmError};
use crate::retry::RetryPolicy;
use crate::store::models::{Message, Role};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "anthropic/claude-3-5-haiku";
pub const DEFAULT_SITE_NAME: &str = "Writing Assistant";

/// Messages longer than this are sent as structured blocks carrying a cache
/// hint, alongside all system messages.
pub const CACHE_HINT_THRESHOLD: usize = 1000;

pub const MAX_RETRIES: u32 = 3;
pub const RETRY_DELAY: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub api_key: String,
    pub base_url: String,
    /// Sent as the `HTTP-Referer` header identifying the requesting site.
    pub site_url: String,
    /// Sent as the `X-Title` header.
    pub site_name: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
    pub presence_penalty: f64,
    pub frequency_penalty: f64,
    pub transforms: Vec<String>,
}

impl ChatConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            site_url: "http://localhost".to_string(),
            site_name: DEFAULT_SITE_NAME.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            top_p: 0.9,
            presence_penalty: 0.1,
            frequency_penalty: 0.1,
            transforms: vec!["middle-out".to_string()],
        }
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage>,
    stream: bool,
    temperature: f64,
    max_tokens: u32,
    top_p: f64,
    presence_penalty: f64,
    frequency_penalty: f64,
    transforms: &'a [String],
}

/// Map a conversation message onto the wire format. System messages and
/// oversized messages become structured blocks with an ephemeral cache hint;
/// everything else passes through as a plain string. No token budget check
/// happens here, the remote service reports its own errors for that.
pub fn format_message(msg: &Message) -> ApiMessage {
    if msg.role == Role::System || msg.content.chars().count() > CACHE_HINT_THRESHOLD {
        ApiMessage {
            role: msg.role,
            content: ApiContent::Blocks(vec![ContentBlock::cached_text(msg.content.clone())]),
        }
    } else {
        ApiMessage {
            role: msg.role,
            content: ApiContent::Text(msg.content.clone()),
        }
    }
}

/// Whether the key's remaining quota allows another request. A `null` limit
/// means unlimited.
pub fn quota_allows(usage: f64, limit: Option<f64>) -> bool {
    match limit {
        Some(limit) => usage < limit,
        None => true,
    }
}

pub struct ChatClient {
    client: Client,
    config: ChatConfig,
}

impl ChatClient {
    pub fn new(config: ChatConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Pre-flight quota check against the key-info endpoint. Fails open: any
    /// network or parse failure returns `true` so that availability wins over
    /// strict quota enforcement.
    pub async fn check_rate_limit(&self) -> bool {
        match self.fetch_key_info().await {
            Ok(info) => quota_allows(info.data.usage, info.data.limit),
            Err(err) => {
                warn!(error = %err, "rate limit check failed, continuing");
                true
            }
        }
    }

    async fn fetch_key_info(&self) -> Result<KeyInfo, LlmError> {
        let resp = self
            .client
            .get(format!("{}/auth/key", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(LlmError::Api(ApiError {
                code: resp.status().as_u16(),
                message: "Failed to check rate limit".to_string(),
                metadata: None,
            }));
        }
        Ok(resp.json::<KeyInfo>().await?)
    }

    fn build_request<'a>(&'a self, messages: &[Message], stream: bool) -> CompletionRequest<'a> {
        CompletionRequest {
            model: &self.config.model,
            messages: messages.iter().map(format_message).collect(),
            stream,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            top_p: self.config.top_p,
            presence_penalty: self.config.presence_penalty,
            frequency_penalty: self.config.frequency_penalty,
            transforms: &self.config.transforms,
        }
    }

    /// One attempt: format the conversation, POST it, and decode the
    /// streaming body. `on_update` receives the full accumulated text after
    /// every increment; the final accumulated text is returned.
    pub async fn send(
        &self,
        messages: &[Message],
        on_update: impl FnMut(&str),
    ) -> Result<String, LlmError> {
        let body = self.build_request(messages, true);

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .header("HTTP-Referer", &self.config.site_url)
            .header("X-Title", &self.config.site_name)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let err: ErrorResponse = resp
                .json()
                .await
                .map_err(|e| LlmError::Parse(e.to_string()))?;
            return Err(LlmError::Api(err.error));
        }

        debug!(model = %self.config.model, "chat request accepted, decoding stream");
        process_stream(resp.bytes_stream(), on_update).await
    }

    /// The full attempt unit under the chat retry policy: transient server
    /// codes and unstructured failures are re-attempted with a fixed delay,
    /// other structured errors surface immediately.
    pub async fn send_with_retry(
        &self,
        messages: &[Message],
        on_update: impl FnMut(&str),
    ) -> Result<String, LlmError> {
        let policy = RetryPolicy::fixed(MAX_RETRIES, RETRY_DELAY);
        let on_update = RefCell::new(on_update);
        let on_update = &on_update;

        policy
            .run(
                move || async move {
                    self.send(messages, |acc| {
                        let mut cb = on_update.borrow_mut();
                        (&mut *cb)(acc)
                    })
                    .await
                },
                LlmError::is_retryable,
            )
            .await
    }
}
