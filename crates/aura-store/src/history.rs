//! Append-only history log.
//!
//! Every aura change the engine makes is recorded here with a snapshot of
//! the record it changed, so players can see why their score moved.

use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::db::init_db;
use crate::error::{Result, StoreError};

/// Which kind of record a history entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryKind {
    Task,
    Routine,
    Habit,
    Player,
}

impl std::fmt::Display for HistoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HistoryKind::Task => "task",
            HistoryKind::Routine => "routine",
            HistoryKind::Habit => "habit",
            HistoryKind::Player => "player",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for HistoryKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "task" => Ok(HistoryKind::Task),
            "routine" => Ok(HistoryKind::Routine),
            "habit" => Ok(HistoryKind::Habit),
            "player" => Ok(HistoryKind::Player),
            other => Err(format!("unknown history kind: {other}")),
        }
    }
}

/// An entry to append. `id` and `timestamp` are assigned by the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewHistoryEntry {
    pub user_id: String,
    pub kind: HistoryKind,
    pub data: Option<Value>,
    pub comments: Option<String>,
}

/// A persisted history entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// UUIDv7, so ids sort by time.
    pub id: String,
    pub user_id: String,
    pub kind: HistoryKind,
    pub data: Option<Value>,
    pub comments: Option<String>,
    /// RFC 3339.
    pub timestamp: String,
}

impl HistoryEntry {
    fn stamp(new: NewHistoryEntry) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            user_id: new.user_id,
            kind: new.kind,
            data: new.data,
            comments: new.comments,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[async_trait]
pub trait HistoryLog: Send + Sync {
    async fn append(&self, entry: NewHistoryEntry) -> Result<HistoryEntry>;

    /// Most recent entries for `user_id`, newest first.
    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<HistoryEntry>>;
}

/// History log in the SQLite `history` table.
pub struct SqliteHistory {
    db: Mutex<Connection>,
}

impl SqliteHistory {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl HistoryLog for SqliteHistory {
    async fn append(&self, new: NewHistoryEntry) -> Result<HistoryEntry> {
        let entry = HistoryEntry::stamp(new);
        let data = entry.data.as_ref().map(serde_json::to_string).transpose()?;
        let db = self
            .db
            .lock()
            .map_err(|_| StoreError::Unavailable("history connection mutex poisoned".to_string()))?;
        db.execute(
            "INSERT INTO history (id, user_id, kind, data, comments, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                entry.id,
                entry.user_id,
                entry.kind.to_string(),
                data,
                entry.comments,
                entry.timestamp
            ],
        )?;
        debug!(user_id = %entry.user_id, kind = %entry.kind, "history logged");
        Ok(entry)
    }

    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<HistoryEntry>> {
        let db = self
            .db
            .lock()
            .map_err(|_| StoreError::Unavailable("history connection mutex poisoned".to_string()))?;
        let mut stmt = db.prepare(
            "SELECT id, user_id, kind, data, comments, timestamp
             FROM history
             WHERE user_id = ?1
             ORDER BY timestamp DESC, id DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![user_id, limit as i64], row_to_entry)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }
}

/// Map a SELECT row to a `HistoryEntry`. Unknown kinds or unparsable
/// snapshots degrade to `Player` / `None` rather than hiding the row.
fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryEntry> {
    let kind = row
        .get::<_, String>(2)?
        .parse()
        .unwrap_or(HistoryKind::Player);
    let data = row
        .get::<_, Option<String>>(3)?
        .and_then(|s| serde_json::from_str(&s).ok());
    Ok(HistoryEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind,
        data,
        comments: row.get(4)?,
        timestamp: row.get(5)?,
    })
}

/// In-process history log, paired with `MemoryStore`.
#[derive(Default)]
pub struct MemoryHistory {
    entries: Mutex<Vec<HistoryEntry>>,
}

impl MemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryLog for MemoryHistory {
    async fn append(&self, new: NewHistoryEntry) -> Result<HistoryEntry> {
        let entry = HistoryEntry::stamp(new);
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("history mutex poisoned".to_string()))?
            .push(entry.clone());
        Ok(entry)
    }

    async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<HistoryEntry>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("history mutex poisoned".to_string()))?;
        Ok(entries
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_entry(user: &str, comment: &str) -> NewHistoryEntry {
        NewHistoryEntry {
            user_id: user.to_string(),
            kind: HistoryKind::Player,
            data: Some(json!({"aura": 1})),
            comments: Some(comment.to_string()),
        }
    }

    #[tokio::test]
    async fn sqlite_recent_is_newest_first_and_scoped() {
        let log = SqliteHistory::new(Connection::open_in_memory().unwrap()).unwrap();
        log.append(new_entry("alice", "first")).await.unwrap();
        log.append(new_entry("bob", "other")).await.unwrap();
        log.append(new_entry("alice", "second")).await.unwrap();

        let recent = log.recent("alice", 10).await.unwrap();
        let comments: Vec<_> = recent.iter().filter_map(|e| e.comments.as_deref()).collect();
        assert_eq!(comments, vec!["second", "first"]);
        assert_eq!(recent[0].data, Some(json!({"aura": 1})));

        assert_eq!(log.recent("alice", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn memory_recent_respects_limit() {
        let log = MemoryHistory::new();
        for i in 0..5 {
            log.append(new_entry("alice", &format!("n{i}"))).await.unwrap();
        }
        let recent = log.recent("alice", 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].comments.as_deref(), Some("n4"));
    }

    #[test]
    fn kind_roundtrips_through_text() {
        for kind in [HistoryKind::Task, HistoryKind::Routine, HistoryKind::Habit, HistoryKind::Player] {
            assert_eq!(kind.to_string().parse::<HistoryKind>().unwrap(), kind);
        }
    }
}
