use rusqlite::Connection;

use crate::error::Result;

/// Initialise the scheduler schema in `conn`.
///
/// Creates the `jobs` table (idempotent) and an index on `next_run` for the
/// polling query. Tables from before the run lease existed gain its columns.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS jobs (
            id                TEXT    NOT NULL PRIMARY KEY,
            name              TEXT    NOT NULL,
            schedule          TEXT    NOT NULL,   -- JSON-encoded Schedule enum
            status            TEXT    NOT NULL DEFAULT 'pending',
            last_run          TEXT,               -- RFC 3339 or NULL
            next_run          TEXT,               -- RFC 3339 or NULL
            run_count         INTEGER NOT NULL DEFAULT 0,
            last_error        TEXT,
            last_duration_ms  INTEGER,
            lease_owner       TEXT,               -- engine holding the run lease
            lease_expires     TEXT,               -- RFC 3339; stale after this
            created_at        TEXT    NOT NULL,
            updated_at        TEXT    NOT NULL
        ) STRICT;

        CREATE INDEX IF NOT EXISTS idx_jobs_next_run ON jobs (next_run);
        ",
    )?;

    let has_lease = conn
        .prepare("SELECT 1 FROM pragma_table_info('jobs') WHERE name = 'lease_owner'")?
        .exists([])?;
    if !has_lease {
        conn.execute_batch(
            "ALTER TABLE jobs ADD COLUMN lease_owner TEXT;
             ALTER TABLE jobs ADD COLUMN lease_expires TEXT;",
        )?;
    }
    Ok(())
}
