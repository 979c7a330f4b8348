use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::error::{Result, WorkLogError};
use crate::types::{LogEntry, LogLevel, NewLogEntry, SessionHandle, SessionLog};

/// Append-only decision log (§4.3).
///
/// Every [`WorkLog::log`] call also emits a level-matched `tracing` event so
/// operators get the same data via `RUST_LOG` without a DB read.
pub struct WorkLog {
    db: Mutex<Connection>,
    /// Incremented whenever a log write fails twice and is dropped (§4.3
    /// failure semantics: never fail the caller's operation).
    dropped_writes: AtomicU64,
}

impl WorkLog {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
            dropped_writes: AtomicU64::new(0),
        }
    }

    pub fn dropped_write_count(&self) -> u64 {
        self.dropped_writes.load(Ordering::Relaxed)
    }

    #[instrument(skip(self, query, participants), fields(session_key))]
    pub fn start_session(
        &self,
        session_key: &str,
        query: &str,
        room_id: Option<&str>,
        coordinator: bool,
        participants: &[String],
    ) -> Result<SessionHandle> {
        let id = Uuid::now_v7().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let participants_json = serde_json::to_string(participants).unwrap_or_default();

        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO session_log (id, session_key, query, started_at, room_id, coordinator, participants)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![id, session_key, query, now, room_id, coordinator as i64, participants_json],
        )?;

        Ok(SessionHandle {
            session_id: id,
            session_key: session_key.to_string(),
            room_id: room_id.map(String::from),
            coordinator,
        })
    }

    /// Append a log entry, retrying once on failure before giving up (§4.3
    /// "writes retry once, then drop with a warning counter incremented").
    /// Never returns an error the caller is expected to propagate further —
    /// callers that cannot tolerate any risk of a dropped entry should inspect
    /// [`Self::dropped_write_count`] instead.
    #[instrument(skip(self, entry), fields(session_id, level = %level, category = %entry.category))]
    pub fn log(
        &self,
        handle: &SessionHandle,
        level: LogLevel,
        message: &str,
        bot_name: &str,
        entry: NewLogEntry,
    ) {
        match self.try_log(handle, level, message, bot_name, &entry) {
            Ok(()) => {}
            Err(first_err) => {
                warn!(error = %first_err, "worklog write failed, retrying once");
                if let Err(second_err) = self.try_log(handle, level, message, bot_name, &entry) {
                    self.dropped_writes.fetch_add(1, Ordering::Relaxed);
                    error!(error = %second_err, "worklog write dropped after retry");
                }
            }
        }
        emit_tracing_event(level, &entry.category, bot_name, message);
    }

    fn try_log(
        &self,
        handle: &SessionHandle,
        level: LogLevel,
        message: &str,
        bot_name: &str,
        entry: &NewLogEntry,
    ) -> Result<()> {
        let id = Uuid::now_v7().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();

        let next_step: i64 = db.query_row(
            "SELECT COALESCE(MAX(step_no), -1) + 1 FROM log_entry WHERE session_id = ?1",
            rusqlite::params![handle.session_id],
            |row| row.get(0),
        )?;

        let details = entry.details_json.as_ref().map(|v| v.to_string());
        let tool_input = entry.tool_input.as_ref().map(|v| v.to_string());
        let mentions = serde_json::to_string(&entry.mentions).unwrap_or_default();

        db.execute(
            "INSERT INTO log_entry (
                id, session_id, step_no, timestamp, level, category, bot_name, triggered_by,
                message, details_json, confidence, duration_ms, tool_name, tool_input,
                tool_output, tool_status, mentions, response_to_step, coordinator_mode,
                escalation, shareable, insight_category
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22)",
            rusqlite::params![
                id,
                handle.session_id,
                next_step,
                now,
                level.as_str(),
                entry.category,
                bot_name,
                entry.triggered_by,
                message,
                details,
                entry.confidence,
                entry.duration_ms,
                entry.tool_name,
                tool_input,
                entry.tool_output,
                entry.tool_status,
                mentions,
                entry.response_to_step,
                handle.coordinator as i64,
                entry.escalation as i64,
                entry.shareable as i64,
                entry.insight_category,
            ],
        )?;
        Ok(())
    }

    /// Record completion. Returns the ids of entries marked `shareable` with
    /// `confidence >= promotion_threshold`, for the caller to enqueue into the
    /// LearningExchange (§4.3/§4.7 — worklog does not depend on roster-learning).
    #[instrument(skip(self, final_output), fields(session_id = %handle.session_id))]
    pub fn end_session(&self, handle: &SessionHandle, final_output: &str, promotion_threshold: f64) -> Result<Vec<String>> {
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let rows_changed = db.execute(
            "UPDATE session_log SET ended_at = ?1, final_output = ?2 WHERE id = ?3",
            rusqlite::params![now, final_output, handle.session_id],
        )?;
        if rows_changed == 0 {
            return Err(WorkLogError::NotFound(handle.session_id.clone()));
        }

        let mut stmt = db.prepare(
            "SELECT id FROM log_entry WHERE session_id = ?1 AND shareable = 1 AND confidence >= ?2",
        )?;
        let ids = stmt
            .query_map(rusqlite::params![handle.session_id, promotion_threshold], |row| {
                row.get::<_, String>(0)
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(ids)
    }

    #[instrument(skip(self))]
    pub fn get_log(&self, session_id: &str) -> Result<(SessionLog, Vec<LogEntry>)> {
        let db = self.db.lock().unwrap();
        let session = db
            .query_row(
                "SELECT id, session_key, query, started_at, ended_at, room_id, coordinator, participants, final_output
                 FROM session_log WHERE id = ?1",
                rusqlite::params![session_id],
                row_to_session_log,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => WorkLogError::NotFound(session_id.to_string()),
                other => WorkLogError::Database(other),
            })?;

        let mut stmt = db.prepare(
            "SELECT id, session_id, step_no, timestamp, level, category, bot_name, triggered_by,
                    message, details_json, confidence, duration_ms, tool_name, tool_input,
                    tool_output, tool_status, mentions, response_to_step, coordinator_mode,
                    escalation, shareable, insight_category
             FROM log_entry WHERE session_id = ?1 ORDER BY step_no ASC",
        )?;
        let entries = stmt
            .query_map(rusqlite::params![session_id], row_to_log_entry)?
            .filter_map(|r| r.ok())
            .collect();

        Ok((session, entries))
    }

    pub fn get_logs_by_room(&self, room_id: &str, limit: usize) -> Result<Vec<SessionLog>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, session_key, query, started_at, ended_at, room_id, coordinator, participants, final_output
             FROM session_log WHERE room_id = ?1 ORDER BY started_at DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(rusqlite::params![room_id, limit as i64], row_to_session_log)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn get_all_logs(&self, limit: usize, room_id: Option<&str>) -> Result<Vec<SessionLog>> {
        let db = self.db.lock().unwrap();
        let (sql, has_room) = if room_id.is_some() {
            (
                "SELECT id, session_key, query, started_at, ended_at, room_id, coordinator, participants, final_output
                 FROM session_log WHERE room_id = ?1 ORDER BY started_at DESC LIMIT ?2",
                true,
            )
        } else {
            (
                "SELECT id, session_key, query, started_at, ended_at, room_id, coordinator, participants, final_output
                 FROM session_log ORDER BY started_at DESC LIMIT ?1",
                false,
            )
        };
        let mut stmt = db.prepare(sql)?;
        let rows = if has_room {
            stmt.query_map(rusqlite::params![room_id.unwrap(), limit as i64], row_to_session_log)?
                .filter_map(|r| r.ok())
                .collect()
        } else {
            stmt.query_map(rusqlite::params![limit as i64], row_to_session_log)?
                .filter_map(|r| r.ok())
                .collect()
        };
        Ok(rows)
    }

    /// Case-insensitive substring search across `message` and `details_json`.
    pub fn search(&self, text: &str, room_id: Option<&str>, bot_name: Option<&str>) -> Result<Vec<LogEntry>> {
        let db = self.db.lock().unwrap();
        let pattern = format!("%{}%", text.to_lowercase());

        let mut sql = String::from(
            "SELECT le.id, le.session_id, le.step_no, le.timestamp, le.level, le.category, le.bot_name,
                    le.triggered_by, le.message, le.details_json, le.confidence, le.duration_ms,
                    le.tool_name, le.tool_input, le.tool_output, le.tool_status, le.mentions,
                    le.response_to_step, le.coordinator_mode, le.escalation, le.shareable, le.insight_category
             FROM log_entry le
             JOIN session_log sl ON sl.id = le.session_id
             WHERE (LOWER(le.message) LIKE ?1 OR LOWER(COALESCE(le.details_json, '')) LIKE ?1)",
        );
        if room_id.is_some() {
            sql.push_str(" AND sl.room_id = ?2");
        }
        if bot_name.is_some() {
            sql.push_str(if room_id.is_some() { " AND le.bot_name = ?3" } else { " AND le.bot_name = ?2" });
        }

        let mut stmt = db.prepare(&sql)?;
        let rows: Vec<LogEntry> = match (room_id, bot_name) {
            (Some(r), Some(b)) => stmt
                .query_map(rusqlite::params![pattern, r, b], row_to_log_entry)?
                .filter_map(|r| r.ok())
                .collect(),
            (Some(r), None) => stmt
                .query_map(rusqlite::params![pattern, r], row_to_log_entry)?
                .filter_map(|r| r.ok())
                .collect(),
            (None, Some(b)) => stmt
                .query_map(rusqlite::params![pattern, b], row_to_log_entry)?
                .filter_map(|r| r.ok())
                .collect(),
            (None, None) => stmt
                .query_map(rusqlite::params![pattern], row_to_log_entry)?
                .filter_map(|r| r.ok())
                .collect(),
        };
        Ok(rows)
    }
}

fn emit_tracing_event(level: LogLevel, category: &str, bot_name: &str, message: &str) {
    match level {
        LogLevel::Error => error!(category, bot_name, "{}", message),
        LogLevel::Warning | LogLevel::Correction | LogLevel::Uncertainty => {
            warn!(category, bot_name, "{}", message)
        }
        _ => info!(category, bot_name, "{}", message),
    }
}

fn row_to_session_log(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionLog> {
    let participants_json: String = row.get(7)?;
    Ok(SessionLog {
        id: row.get(0)?,
        session_key: row.get(1)?,
        query: row.get(2)?,
        started_at: row.get(3)?,
        ended_at: row.get(4)?,
        room_id: row.get(5)?,
        coordinator: row.get::<_, i64>(6)? != 0,
        participants: serde_json::from_str(&participants_json).unwrap_or_default(),
        final_output: row.get(8)?,
    })
}

fn row_to_log_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<LogEntry> {
    let level_str: String = row.get(4)?;
    let details_str: Option<String> = row.get(9)?;
    let tool_input_str: Option<String> = row.get(13)?;
    let mentions_str: String = row.get(16)?;

    Ok(LogEntry {
        id: row.get(0)?,
        session_id: row.get(1)?,
        step_no: row.get(2)?,
        timestamp: row.get(3)?,
        level: level_str.parse().unwrap_or(LogLevel::Info),
        category: row.get(5)?,
        bot_name: row.get(6)?,
        triggered_by: row.get(7)?,
        message: row.get(8)?,
        details_json: details_str.and_then(|s| serde_json::from_str(&s).ok()),
        confidence: row.get(10)?,
        duration_ms: row.get(11)?,
        tool_name: row.get(12)?,
        tool_input: tool_input_str.and_then(|s| serde_json::from_str(&s).ok()),
        tool_output: row.get(14)?,
        tool_status: row.get(15)?,
        mentions: serde_json::from_str(&mentions_str).unwrap_or_default(),
        response_to_step: row.get(17)?,
        coordinator_mode: row.get::<_, i64>(18)? != 0,
        escalation: row.get::<_, i64>(19)? != 0,
        shareable: row.get::<_, i64>(20)? != 0,
        insight_category: row.get(21)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worklog() -> WorkLog {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_worklog_db(&conn).unwrap();
        WorkLog::new(conn)
    }

    #[test]
    fn start_log_end_roundtrip() {
        let wl = worklog();
        let handle = wl
            .start_session("cli:u1", "do the thing", None, false, &["leader".to_string()])
            .unwrap();
        wl.log(&handle, LogLevel::Decision, "picked plan A", "leader", NewLogEntry {
            category: "planning".to_string(),
            shareable: true,
            confidence: Some(0.9),
            ..Default::default()
        });
        let shareable = wl.end_session(&handle, "done", 0.85).unwrap();
        assert_eq!(shareable.len(), 1);

        let (session, entries) = wl.get_log(&handle.session_id).unwrap();
        assert_eq!(session.final_output.as_deref(), Some("done"));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].step_no, 0);
    }

    #[test]
    fn search_matches_case_insensitive_substring() {
        let wl = worklog();
        let handle = wl.start_session("cli:u1", "q", None, false, &[]).unwrap();
        wl.log(&handle, LogLevel::Info, "Found the Widget factory", "leader", NewLogEntry::default());
        let hits = wl.search("widget", None, None).unwrap();
        assert_eq!(hits.len(), 1);
    }
}
