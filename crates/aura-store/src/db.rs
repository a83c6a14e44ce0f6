use rusqlite::Connection;

use crate::error::Result;

/// Initialise the document store and history schema in `conn`.
///
/// Idempotent: every statement uses `IF NOT EXISTS`.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS kv (
            key         TEXT NOT NULL PRIMARY KEY,
            value       TEXT NOT NULL,      -- JSON document
            updated_at  TEXT NOT NULL
        ) STRICT;

        CREATE TABLE IF NOT EXISTS history (
            id          TEXT NOT NULL PRIMARY KEY,
            user_id     TEXT NOT NULL,
            kind        TEXT NOT NULL,      -- task | routine | habit | player
            data        TEXT,               -- JSON snapshot or NULL
            comments    TEXT,
            timestamp   TEXT NOT NULL       -- RFC 3339
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_history_user
            ON history (user_id, timestamp DESC);
        ",
    )?;
    Ok(())
}
