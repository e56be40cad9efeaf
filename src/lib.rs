//! Core library for an AI writing assistant: a streaming chat pipeline
//! against an OpenRouter-style completion API, conversation and document
//! collections with inline comments, and best-effort dual-backend local
//! persistence.

pub mod app;
pub mod llm;
pub mod persist;
pub mod prompts;
pub mod ratelimit;
pub mod retry;
pub mod store;

pub use app::App;
pub use llm::openrouter::{ChatClient, ChatConfig};
pub use llm::LlmError;
pub use persist::{PersistError, Storage};
pub use ratelimit::RateLimiter;
pub use retry::RetryPolicy;
pub use store::models::{Comment, Conversation, Document, Message, Role};
pub use store::{ChatStore, DocumentStore, StorePhase};
