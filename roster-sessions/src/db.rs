use rusqlite::Connection;

use crate::error::Result;

/// Initialise the `sessions` and `messages` tables. Safe to call on every
/// startup — uses `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA foreign_keys=ON;

         CREATE TABLE IF NOT EXISTS sessions (
            id            TEXT PRIMARY KEY,
            session_key   TEXT NOT NULL UNIQUE,
            message_count INTEGER NOT NULL DEFAULT 0,
            total_tokens  INTEGER NOT NULL DEFAULT 0,
            last_model    TEXT,
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS idx_sessions_updated
            ON sessions(updated_at DESC);

         CREATE TABLE IF NOT EXISTS messages (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            session_key   TEXT NOT NULL,
            step_no       INTEGER NOT NULL,
            role          TEXT NOT NULL,
            content       TEXT NOT NULL,
            tool_call_id  TEXT,
            bot_name      TEXT NOT NULL,
            created_at    TEXT NOT NULL,
            FOREIGN KEY(session_key) REFERENCES sessions(session_key)
         );
         CREATE INDEX IF NOT EXISTS idx_messages_session
            ON messages(session_key, step_no);",
    )?;
    Ok(())
}
