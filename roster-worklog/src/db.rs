use rusqlite::Connection;

use crate::error::Result;

/// Initialise `work_logs.db` tables: `session_log` and `log_entry`.
pub fn init_worklog_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA foreign_keys=ON;

         CREATE TABLE IF NOT EXISTS session_log (
            id           TEXT PRIMARY KEY,
            session_key  TEXT NOT NULL,
            query        TEXT NOT NULL,
            started_at   TEXT NOT NULL,
            ended_at     TEXT,
            room_id      TEXT,
            coordinator  INTEGER NOT NULL DEFAULT 0,
            participants TEXT NOT NULL DEFAULT '[]',
            final_output TEXT
         );
         CREATE INDEX IF NOT EXISTS idx_session_log_room
            ON session_log(room_id, started_at DESC);
         CREATE INDEX IF NOT EXISTS idx_session_log_key
            ON session_log(session_key, started_at DESC);

         CREATE TABLE IF NOT EXISTS log_entry (
            id                TEXT PRIMARY KEY,
            session_id        TEXT NOT NULL,
            step_no           INTEGER NOT NULL,
            timestamp         TEXT NOT NULL,
            level             TEXT NOT NULL,
            category          TEXT NOT NULL,
            bot_name          TEXT NOT NULL,
            triggered_by      TEXT,
            message           TEXT NOT NULL,
            details_json      TEXT,
            confidence        REAL,
            duration_ms       INTEGER,
            tool_name         TEXT,
            tool_input        TEXT,
            tool_output       TEXT,
            tool_status       TEXT,
            mentions          TEXT NOT NULL DEFAULT '[]',
            response_to_step  INTEGER,
            coordinator_mode  INTEGER NOT NULL DEFAULT 0,
            escalation        INTEGER NOT NULL DEFAULT 0,
            shareable         INTEGER NOT NULL DEFAULT 0,
            insight_category  TEXT,
            FOREIGN KEY(session_id) REFERENCES session_log(id)
         );
         CREATE INDEX IF NOT EXISTS idx_log_entry_session
            ON log_entry(session_id, step_no);
         CREATE INDEX IF NOT EXISTS idx_log_entry_shareable
            ON log_entry(shareable, confidence);",
    )?;
    Ok(())
}

/// Initialise `tool_outputs.db`'s single table — kept in its own physical
/// file per SPEC_FULL.md §6 so large tool payloads never bloat the worklog
/// database's WAL.
pub fn init_tool_outputs_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;

         CREATE TABLE IF NOT EXISTS tool_outputs (
            id              TEXT PRIMARY KEY,
            tool_name       TEXT NOT NULL,
            full_output     TEXT NOT NULL,
            context_summary TEXT NOT NULL,
            session_key     TEXT NOT NULL,
            created_at      TEXT NOT NULL,
            accessed_count  INTEGER NOT NULL DEFAULT 0,
            char_count      INTEGER NOT NULL
         );
         CREATE INDEX IF NOT EXISTS idx_tool_outputs_session
            ON tool_outputs(session_key, created_at DESC);",
    )?;
    Ok(())
}
