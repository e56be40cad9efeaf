pub mod chat;
pub mod documents;
pub mod models;

pub use chat::{ChatStore, StorePhase};
pub use documents::DocumentStore;
