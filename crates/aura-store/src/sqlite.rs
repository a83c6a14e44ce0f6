use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::db::init_db;
use crate::error::{Result, StoreError};
use crate::kv::{merge_fields, Entry, KvStore};

/// [`KvStore`] over a SQLite `kv` table.
///
/// Wraps a single connection in a `Mutex`; every operation is short and the
/// merge runs inside one transaction, so a merge is atomic with respect to
/// other writers on the same database file.
pub struct SqliteStore {
    db: Mutex<Connection>,
}

impl SqliteStore {
    /// Wrap a connection, initialising the schema if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite connection mutex poisoned".to_string()))
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let db = self.lock()?;
        let raw: Option<String> = db
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        raw.map(|s| serde_json::from_str(&s).map_err(StoreError::from))
            .transpose()
    }

    async fn put(&self, key: &str, value: &Value) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.lock()?;
        db.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                            updated_at = excluded.updated_at",
            rusqlite::params![key, json, now],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<Entry>> {
        let db = self.lock()?;
        let rows = match prefix_upper_bound(prefix) {
            Some(upper) => {
                let mut stmt = db.prepare_cached(RANGE_QUERY)?;
                let rows = stmt
                    .query_map([prefix, upper.as_str()], read_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            None => {
                let mut stmt = db.prepare_cached(OPEN_RANGE_QUERY)?;
                let rows = stmt
                    .query_map([prefix], read_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };

        let entries: Vec<Entry> = rows
            .into_iter()
            .filter_map(|(key, raw)| match serde_json::from_str(&raw) {
                Ok(value) => Some(Entry { key, value }),
                Err(e) => {
                    warn!(%key, error = %e, "skipping stored value that is not JSON");
                    None
                }
            })
            .collect();
        debug!(count = entries.len(), "prefix listing");
        Ok(entries)
    }

    async fn merge_update(&self, key: &str, patch: &Map<String, Value>) -> Result<Option<Value>> {
        let mut db = self.lock()?;
        let tx = db.transaction()?;
        let raw: Option<String> = tx
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        let Some(raw) = raw else {
            return Ok(None);
        };

        let mut doc: Value = serde_json::from_str(&raw)?;
        merge_fields(key, &mut doc, patch)?;

        tx.execute(
            "UPDATE kv SET value = ?1, updated_at = ?2 WHERE key = ?3",
            rusqlite::params![
                serde_json::to_string(&doc)?,
                chrono::Utc::now().to_rfc3339(),
                key
            ],
        )?;
        tx.commit()?;
        Ok(Some(doc))
    }
}

/// Keys in `[?1, ?2)` are exactly the keys starting with `?1`: SQLite's
/// BINARY collation orders UTF-8 text by code point.
const RANGE_QUERY: &str = "SELECT key, value FROM kv
     WHERE key >= ?1 AND key < ?2
     ORDER BY key";

/// Fallback when the prefix has no upper bound (empty, or ends in the
/// highest code point).
const OPEN_RANGE_QUERY: &str = "SELECT key, value FROM kv
     WHERE key >= ?1 AND substr(key, 1, length(?1)) = ?1
     ORDER BY key";

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String)> {
    Ok((row.get(0)?, row.get(1)?))
}

/// Smallest string greater than every string starting with `prefix`: the
/// prefix with its last character bumped to the next code point.
fn prefix_upper_bound(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    while let Some(last) = chars.pop() {
        let next = match last as u32 {
            0xD7FF => Some('\u{E000}'),
            c => char::from_u32(c + 1),
        };
        if let Some(next) = next {
            chars.push(next);
            return Some(chars.into_iter().collect());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> SqliteStore {
        SqliteStore::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn put_then_get() {
        let s = store();
        s.put("player:alice", &json!({"username": "alice", "aura": 3}))
            .await
            .unwrap();
        let got = s.get("player:alice").await.unwrap().unwrap();
        assert_eq!(got["aura"], 3);
        assert!(s.get("player:bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn prefix_listing_is_scoped_and_ordered() {
        let s = store();
        for key in ["task:alice:2", "task:alice:1", "task:alice2:1", "habit:alice:1"] {
            s.put(key, &json!({"k": key})).await.unwrap();
        }
        let keys: Vec<String> = s
            .list_by_prefix("task:alice:")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec!["task:alice:1", "task:alice:2"]);
    }

    #[tokio::test]
    async fn prefix_listing_skips_non_json_rows() {
        let s = store();
        s.put("task:alice:1", &json!({"ok": true})).await.unwrap();
        s.lock()
            .unwrap()
            .execute(
                "INSERT INTO kv (key, value, updated_at) VALUES ('task:alice:2', 'not json', 'x')",
                [],
            )
            .unwrap();
        let entries = s.list_by_prefix("task:alice:").await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn merge_update_on_missing_key_creates_nothing() {
        let s = store();
        let patch = json!({"aura": 1}).as_object().cloned().unwrap();
        assert!(s.merge_update("player:ghost", &patch).await.unwrap().is_none());
        assert!(s.get("player:ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn merge_update_persists() {
        let s = store();
        s.put("player:alice", &json!({"username": "alice", "aura": 10, "level": 2}))
            .await
            .unwrap();
        let patch = json!({"aura": 4}).as_object().cloned().unwrap();
        let merged = s.merge_update("player:alice", &patch).await.unwrap().unwrap();
        assert_eq!(merged, json!({"username": "alice", "aura": 4, "level": 2}));
        assert_eq!(s.get("player:alice").await.unwrap().unwrap(), merged);
    }

    #[test]
    fn upper_bound_bumps_last_character() {
        assert_eq!(prefix_upper_bound("task:alice:").as_deref(), Some("task:alice;"));
        assert_eq!(prefix_upper_bound("a\u{D7FF}").as_deref(), Some("a\u{E000}"));
        assert_eq!(prefix_upper_bound("a\u{10FFFF}").as_deref(), Some("b"));
        assert_eq!(prefix_upper_bound(""), None);
    }

    #[test]
    fn prefix_listing_seeks_a_bounded_range() {
        let s = store();
        let db = s.lock().unwrap();
        let plan: String = db
            .query_row(
                &format!("EXPLAIN QUERY PLAN {RANGE_QUERY}"),
                ["habit:alice:", "habit:alice;"],
                |row| row.get(3),
            )
            .unwrap();
        assert!(plan.contains("key>? AND key<?"), "unbounded plan: {plan}");
    }

    #[tokio::test]
    async fn prefix_listing_ignores_neighbouring_keys() {
        let s = store();
        for i in 0..50 {
            s.put(&format!("task:u{i}:1"), &json!({})).await.unwrap();
        }
        s.put("habit:alice:1", &json!({})).await.unwrap();
        s.put("habit:alice;", &json!({})).await.unwrap();
        s.put("habit:alicf:1", &json!({})).await.unwrap();

        let keys: Vec<String> = s
            .list_by_prefix("habit:alice:")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.key)
            .collect();
        assert_eq!(keys, vec!["habit:alice:1"]);
    }
}
