use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use super::{PersistError, RecordEnvelope};

/// The primary structured store: one SQLite row per logical record name,
/// carrying the schema version, save timestamp and JSON payload.
pub struct PrimaryStore {
    conn: Mutex<Connection>,
}

impl PrimaryStore {
    pub fn new(dir: &Path) -> Result<Self, PersistError> {
        std::fs::create_dir_all(dir).ok();
        let db_path = dir.join("writing-assistant.db");
        let conn = Connection::open(db_path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), PersistError> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS records (
                name TEXT PRIMARY KEY,
                version TEXT NOT NULL,
                saved_at INTEGER NOT NULL,
                payload TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    pub fn put(&self, name: &str, record: &RecordEnvelope) -> Result<(), PersistError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO records (name, version, saved_at, payload) VALUES (?1, ?2, ?3, ?4)",
            params![name, record.version, record.saved_at, record.data.to_string()],
        )?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Option<RecordEnvelope>, PersistError> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT version, saved_at, payload FROM records WHERE name = ?1",
                params![name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((version, saved_at, payload)) => Ok(Some(RecordEnvelope {
                version,
                saved_at,
                data: serde_json::from_str(&payload)?,
            })),
            None => Ok(None),
        }
    }

    pub fn delete(&self, name: &str) -> Result<(), PersistError> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM records WHERE name = ?1", params![name])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(saved_at: i64) -> RecordEnvelope {
        RecordEnvelope {
            version: "1.0".to_string(),
            saved_at,
            data: serde_json::json!({"n": saved_at}),
        }
    }

    #[test]
    fn put_get_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = PrimaryStore::new(dir.path()).unwrap();

        assert!(store.get("conversations").unwrap().is_none());

        store.put("conversations", &record(7)).unwrap();
        let loaded = store.get("conversations").unwrap().unwrap();
        assert_eq!(loaded.saved_at, 7);
        assert_eq!(loaded.data["n"], 7);

        store.put("conversations", &record(8)).unwrap();
        assert_eq!(store.get("conversations").unwrap().unwrap().saved_at, 8);

        store.delete("conversations").unwrap();
        assert!(store.get("conversations").unwrap().is_none());
    }
}
