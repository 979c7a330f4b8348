use rusqlite::Connection;

use crate::error::Result;

/// Initialise `learning_exchange.db`'s tables. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA foreign_keys=ON;

         CREATE TABLE IF NOT EXISTS queued_packages (
            id                TEXT PRIMARY KEY,
            learning_id       TEXT NOT NULL,
            category          TEXT NOT NULL,
            title             TEXT NOT NULL,
            description       TEXT NOT NULL,
            confidence        REAL NOT NULL,
            scope             TEXT NOT NULL,
            applicable_rooms  TEXT NOT NULL DEFAULT '[]',
            applicable_bots   TEXT NOT NULL DEFAULT '[]',
            source_bot        TEXT NOT NULL,
            source_room       TEXT,
            evidence          TEXT NOT NULL DEFAULT '[]',
            status            TEXT NOT NULL DEFAULT 'queued',
            distributed_to    TEXT NOT NULL DEFAULT '[]',
            approved          INTEGER NOT NULL DEFAULT 0,
            created_at        TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS idx_packages_status_created
            ON queued_packages(status, created_at);",
    )?;
    Ok(())
}
