pub mod openrouter;
pub mod stream;

use serde::{Deserialize, Serialize};

use crate::store::models::Role;

/// A message in the chat completion wire format. Content is either a plain
/// string or a list of structured blocks (used to attach cache hints).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiMessage {
    pub role: Role,
    pub content: ApiContent,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(untagged)]
pub enum ApiContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CacheControl {
    #[serde(rename = "type")]
    pub kind: String,
}

impl ContentBlock {
    /// A text block annotated with an ephemeral cache hint.
    pub fn cached_text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: text.into(),
            cache_control: Some(CacheControl {
                kind: "ephemeral".to_string(),
            }),
        }
    }
}

// ── Streaming response frames ──

#[derive(Debug, Deserialize)]
pub struct StreamResponse {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: StreamDelta,
    pub error: Option<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StreamDelta {
    pub content: Option<String>,
}

// ── Structured API errors ──

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorResponse {
    pub error: ApiError,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiError {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ModerationMetadata>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ModerationMetadata {
    #[serde(default)]
    pub reasons: Vec<String>,
    pub flagged_input: Option<String>,
}

// ── Key / quota info ──

#[derive(Debug, Deserialize)]
pub struct KeyInfo {
    pub data: KeyData,
}

#[derive(Debug, Deserialize)]
pub struct KeyData {
    pub usage: f64,
    pub limit: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {} - {}", .0.code, .0.message)]
    Api(ApiError),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Stream error: {0}")]
    Stream(String),
    #[error("No content was generated after multiple retries")]
    NoContent,
}

impl LlmError {
    /// Whether another attempt may succeed. Structured API errors are only
    /// retryable for the transient server codes; anything unstructured
    /// (transport, parse, stream integrity) is retried until the attempt
    /// budget runs out.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Api(err) => matches!(err.code, 408 | 502 | 503),
            _ => true,
        }
    }

    /// The pre-formatted message surfaced to the UI layer. Recognized codes
    /// map to tailored strings; unrecognized codes pass the raw message
    /// through.
    pub fn user_message(&self) -> String {
        let LlmError::Api(err) = self else {
            return self.to_string();
        };
        match err.code {
            400 => "Invalid request. Please check your input and try again.".to_string(),
            401 => "Authentication failed. Please check your API key.".to_string(),
            402 => "Insufficient credits. Please add more credits to continue.".to_string(),
            403 => match &err.metadata {
                Some(meta) if !meta.reasons.is_empty() => {
                    let mut msg = format!("Content moderation error: {}", meta.reasons.join(", "));
                    if let Some(flagged) = &meta.flagged_input {
                        msg.push_str(&format!("\nFlagged content: \"{}\"", flagged));
                    }
                    msg
                }
                _ => err.message.clone(),
            },
            408 => "Request timed out. Please try again.".to_string(),
            429 => "Rate limit exceeded. Please wait before trying again.".to_string(),
            502 => {
                "The selected model is currently unavailable. Please try again later.".to_string()
            }
            503 => "No available model providers. Please try again later.".to_string(),
            _ => err.message.clone(),
        }
    }
}
