pub mod fallback;
pub mod primary;

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::store::models::{now_millis, Conversation, Document};
use fallback::FallbackStore;
use primary::PrimaryStore;

/// Global schema version gating every stored record. A mismatch invalidates
/// the record as a whole; there is no partial migration.
pub const STORAGE_VERSION: &str = "1.0";

const CONVERSATIONS_KEY: &str = "conversations";
const ACTIVE_CONVERSATION_KEY: &str = "active_conversation";
const DOCUMENTS_KEY: &str = "documents";

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// What both backends store per logical name: the schema version, the save
/// timestamp used for reconciliation, and the payload itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordEnvelope {
    pub version: String,
    pub saved_at: i64,
    pub data: serde_json::Value,
}

/// Dual-backend persistence for the conversation and document collections
/// plus the active-conversation id.
///
/// Writes go to the primary SQLite store and are mirrored to the key-value
/// fallback; a primary write failure is logged and propagated (the caller's
/// in-memory state is never rolled back), a fallback failure is only logged.
/// Loads read both backends and keep whichever valid record was saved last,
/// back-filling the stale side.
pub struct Storage {
    primary: PrimaryStore,
    fallback: FallbackStore,
}

impl Storage {
    pub fn new(dir: &Path, namespace: &str) -> Result<Self, PersistError> {
        Ok(Self {
            primary: PrimaryStore::new(dir)?,
            fallback: FallbackStore::new(&dir.join("kv"), namespace),
        })
    }

    fn save_value<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), PersistError> {
        let record = RecordEnvelope {
            version: STORAGE_VERSION.to_string(),
            saved_at: now_millis(),
            data: serde_json::to_value(value)?,
        };

        let primary_result = self.primary.put(key, &record);
        if let Err(err) = &primary_result {
            error!(key, error = %err, "primary store write failed");
        }
        if let Err(err) = self.fallback.put(key, &record) {
            warn!(key, error = %err, "fallback mirror write failed");
        }
        primary_result
    }

    fn load_value<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let record = self.load_record(key)?;
        match serde_json::from_value(record.data) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(key, error = %err, "stored record failed validation, ignoring");
                None
            }
        }
    }

    /// Reconciliation read: take the newer of the two backends' valid
    /// records and back-fill the other side. Read failures never propagate,
    /// they degrade to whatever the other backend holds.
    fn load_record(&self, key: &str) -> Option<RecordEnvelope> {
        let primary = match self.primary.get(key) {
            Ok(record) => record.filter(|r| self.version_ok(key, r)),
            Err(err) => {
                error!(key, error = %err, "primary store read failed, using fallback");
                None
            }
        };
        let fallback = self
            .fallback
            .get(key)
            .filter(|r| self.version_ok(key, r));

        match (primary, fallback) {
            (Some(p), Some(f)) => {
                if f.saved_at > p.saved_at {
                    self.backfill_primary(key, &f);
                    Some(f)
                } else {
                    Some(p)
                }
            }
            (Some(p), None) => {
                self.mirror_fallback(key, &p);
                Some(p)
            }
            (None, Some(f)) => {
                self.backfill_primary(key, &f);
                Some(f)
            }
            (None, None) => None,
        }
    }

    fn version_ok(&self, key: &str, record: &RecordEnvelope) -> bool {
        if record.version == STORAGE_VERSION {
            return true;
        }
        debug!(
            key,
            found = %record.version,
            expected = STORAGE_VERSION,
            "version mismatch, treating record as absent"
        );
        false
    }

    fn backfill_primary(&self, key: &str, record: &RecordEnvelope) {
        if let Err(err) = self.primary.put(key, record) {
            warn!(key, error = %err, "failed to back-fill primary store");
        }
    }

    fn mirror_fallback(&self, key: &str, record: &RecordEnvelope) {
        if let Err(err) = self.fallback.put(key, record) {
            warn!(key, error = %err, "failed to mirror record to fallback store");
        }
    }

    // ── Conversations ──

    pub fn save_conversations(&self, conversations: &[Conversation]) -> Result<(), PersistError> {
        self.save_value(CONVERSATIONS_KEY, conversations)
    }

    pub fn load_conversations(&self) -> Vec<Conversation> {
        self.load_value(CONVERSATIONS_KEY).unwrap_or_default()
    }

    pub fn save_active_conversation(&self, id: Option<&str>) -> Result<(), PersistError> {
        match id {
            Some(id) => self.save_value(ACTIVE_CONVERSATION_KEY, id),
            None => {
                let result = self.primary.delete(ACTIVE_CONVERSATION_KEY);
                if let Err(err) = &result {
                    error!(error = %err, "failed to clear active conversation");
                }
                if let Err(err) = self.fallback.remove(ACTIVE_CONVERSATION_KEY) {
                    warn!(error = %err, "failed to clear active conversation fallback");
                }
                result
            }
        }
    }

    pub fn load_active_conversation(&self) -> Option<String> {
        self.load_value(ACTIVE_CONVERSATION_KEY)
    }

    // ── Documents ──

    pub fn save_documents(&self, documents: &[Document]) -> Result<(), PersistError> {
        self.save_value(DOCUMENTS_KEY, documents)
    }

    pub fn load_documents(&self) -> Vec<Document> {
        self.load_value(DOCUMENTS_KEY).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::models::{Message, Role};

    fn storage() -> (tempfile::TempDir, Storage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path(), "localhost").unwrap();
        (dir, storage)
    }

    fn sample_conversations() -> Vec<Conversation> {
        let mut conv = Conversation::new();
        conv.title = "drafting".to_string();
        conv.messages.push(Message::new(Role::User, "tighten this up"));
        conv.messages.push(Message::new(Role::Assistant, "done"));
        vec![conv]
    }

    #[test]
    fn conversations_round_trip() {
        let (_dir, storage) = storage();
        let conversations = sample_conversations();

        storage.save_conversations(&conversations).unwrap();
        assert_eq!(storage.load_conversations(), conversations);
    }

    #[test]
    fn version_mismatch_loads_as_empty() {
        let (_dir, storage) = storage();
        storage.save_conversations(&sample_conversations()).unwrap();

        // Tamper both backends' version markers.
        let mut record = storage.primary.get(CONVERSATIONS_KEY).unwrap().unwrap();
        record.version = "0.9".to_string();
        storage.primary.put(CONVERSATIONS_KEY, &record).unwrap();
        storage.fallback.put(CONVERSATIONS_KEY, &record).unwrap();

        assert!(storage.load_conversations().is_empty());
    }

    #[test]
    fn newer_fallback_record_wins_and_backfills_primary() {
        let (_dir, storage) = storage();
        storage.save_conversations(&sample_conversations()).unwrap();

        let mut newer = sample_conversations();
        newer[0].title = "rewritten".to_string();
        let record = RecordEnvelope {
            version: STORAGE_VERSION.to_string(),
            saved_at: now_millis() + 10_000,
            data: serde_json::to_value(&newer).unwrap(),
        };
        storage.fallback.put(CONVERSATIONS_KEY, &record).unwrap();

        let loaded = storage.load_conversations();
        assert_eq!(loaded[0].title, "rewritten");

        let primary = storage.primary.get(CONVERSATIONS_KEY).unwrap().unwrap();
        assert_eq!(primary.saved_at, record.saved_at);
    }

    #[test]
    fn primary_only_record_is_mirrored_to_fallback() {
        let (_dir, storage) = storage();
        storage.save_conversations(&sample_conversations()).unwrap();
        storage.fallback.remove(CONVERSATIONS_KEY).unwrap();

        assert_eq!(storage.load_conversations().len(), 1);
        assert!(storage.fallback.get(CONVERSATIONS_KEY).is_some());
    }

    #[test]
    fn fallback_only_record_is_backfilled_to_primary() {
        let (_dir, storage) = storage();
        let conversations = sample_conversations();
        let record = RecordEnvelope {
            version: STORAGE_VERSION.to_string(),
            saved_at: now_millis(),
            data: serde_json::to_value(&conversations).unwrap(),
        };
        storage.fallback.put(CONVERSATIONS_KEY, &record).unwrap();

        assert_eq!(storage.load_conversations(), conversations);
        assert!(storage.primary.get(CONVERSATIONS_KEY).unwrap().is_some());
    }

    #[test]
    fn active_conversation_id_round_trips_and_clears() {
        let (_dir, storage) = storage();
        assert!(storage.load_active_conversation().is_none());

        storage.save_active_conversation(Some("conv-1")).unwrap();
        assert_eq!(storage.load_active_conversation().as_deref(), Some("conv-1"));

        storage.save_active_conversation(None).unwrap();
        assert!(storage.load_active_conversation().is_none());
    }

    #[test]
    fn documents_round_trip() {
        let (_dir, storage) = storage();
        let mut doc = Document::new("essay");
        doc.content = "<p>first draft</p>".to_string();
        let documents = vec![doc];

        storage.save_documents(&documents).unwrap();
        assert_eq!(storage.load_documents(), documents);
    }

    #[test]
    fn unparseable_record_loads_as_empty() {
        let (_dir, storage) = storage();
        let record = RecordEnvelope {
            version: STORAGE_VERSION.to_string(),
            saved_at: now_millis(),
            data: serde_json::json!([{"id": 17, "bogus": true}]),
        };
        storage.primary.put(CONVERSATIONS_KEY, &record).unwrap();

        assert!(storage.load_conversations().is_empty());
    }
}
