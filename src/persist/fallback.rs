use std::path::{Path, PathBuf};

use tracing::warn;

use super::{PersistError, RecordEnvelope};

/// The fallback key-value store: one JSON file per record, with keys
/// namespaced the way the original keyed browser storage by hostname.
pub struct FallbackStore {
    dir: PathBuf,
    namespace: String,
}

impl FallbackStore {
    pub fn new(dir: &Path, namespace: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            namespace: namespace.to_string(),
        }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}_{}.json", key, self.namespace))
    }

    pub fn put(&self, key: &str, record: &RecordEnvelope) -> Result<(), PersistError> {
        std::fs::create_dir_all(&self.dir)?;
        let body = serde_json::to_string(record)?;
        std::fs::write(self.path(key), body)?;
        Ok(())
    }

    /// Read errors degrade to `None`; a damaged fallback file never blocks a
    /// load.
    pub fn get(&self, key: &str) -> Option<RecordEnvelope> {
        let path = self.path(key);
        if !path.exists() {
            return None;
        }
        let body = match std::fs::read_to_string(&path) {
            Ok(body) => body,
            Err(err) => {
                warn!(key, error = %err, "failed to read fallback record");
                return None;
            }
        };
        match serde_json::from_str(&body) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(key, error = %err, "failed to parse fallback record");
                None
            }
        }
    }

    pub fn remove(&self, key: &str) -> Result<(), PersistError> {
        let path = self.path(key);
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}
