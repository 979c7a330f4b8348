use std::collections::HashSet;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{debug, instrument};
use uuid::Uuid;

use roster_core::ChannelKey;

use crate::error::{Result, SessionError};
use crate::types::{Message, MessageRole, Session};

/// A message to be appended, before a `step_no`/`id`/`timestamp` have been assigned.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub role: MessageRole,
    pub content: String,
    pub tool_call_id: Option<String>,
    pub bot_name: String,
}

impl NewMessage {
    pub fn new(role: MessageRole, content: impl Into<String>, bot_name: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_call_id: None,
            bot_name: bot_name.into(),
        }
    }

    pub fn with_tool_call_id(mut self, id: impl Into<String>) -> Self {
        self.tool_call_id = Some(id.into());
        self
    }
}

/// Thread-safe manager for persisted sessions and their message history.
///
/// Wraps a single SQLite connection in a `Mutex`, appropriate for a
/// single-node deployment.
pub struct SessionManager {
    db: Mutex<Connection>,
}

impl SessionManager {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Mutex::new(conn),
        }
    }

    #[instrument(skip(self), fields(key = %key))]
    pub fn get_or_create(&self, key: &ChannelKey) -> Result<Session> {
        if let Some(session) = self.get(key)? {
            debug!("session cache hit");
            return Ok(session);
        }

        let id = Uuid::now_v7().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let key_str = key.format();

        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT OR IGNORE INTO sessions (id, session_key, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
            rusqlite::params![id, key_str, now],
        )?;

        db.query_row(
            "SELECT id, session_key, message_count, total_tokens, last_model, created_at, updated_at
             FROM sessions WHERE session_key = ?1",
            rusqlite::params![key_str],
            row_to_session,
        )
        .map_err(SessionError::Database)
    }

    #[instrument(skip(self), fields(key = %key))]
    pub fn get(&self, key: &ChannelKey) -> Result<Option<Session>> {
        let key_str = key.format();
        let db = self.db.lock().unwrap();
        match db.query_row(
            "SELECT id, session_key, message_count, total_tokens, last_model, created_at, updated_at
             FROM sessions WHERE session_key = ?1",
            rusqlite::params![key_str],
            row_to_session,
        ) {
            Ok(s) => Ok(Some(s)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(SessionError::Database(e)),
        }
    }

    /// Append one or more messages atomically, assigning dense, increasing
    /// `step_no` values. Used by the agent loop to write a `tool_use` and its
    /// `tool_result` in a single update so the pairing invariant is never
    /// observable as broken mid-write (§4.9 step 6d).
    #[instrument(skip(self, messages), fields(key = %key, count = messages.len()))]
    pub fn append_messages(&self, key: &ChannelKey, messages: &[NewMessage]) -> Result<Vec<Message>> {
        if messages.is_empty() {
            return Ok(Vec::new());
        }
        let key_str = key.format();
        let now = chrono::Utc::now().to_rfc3339();

        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;

        let next_step: i64 = tx.query_row(
            "SELECT COALESCE(MAX(step_no), -1) + 1 FROM messages WHERE session_key = ?1",
            rusqlite::params![key_str],
            |row| row.get(0),
        )?;

        let mut appended = Vec::with_capacity(messages.len());
        for (offset, msg) in messages.iter().enumerate() {
            let step_no = next_step + offset as i64;
            tx.execute(
                "INSERT INTO messages (session_key, step_no, role, content, tool_call_id, bot_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    key_str,
                    step_no,
                    msg.role.as_str(),
                    msg.content,
                    msg.tool_call_id,
                    msg.bot_name,
                    now,
                ],
            )?;
            let id = tx.last_insert_rowid();
            appended.push(Message {
                id,
                step_no,
                role: msg.role,
                content: msg.content.clone(),
                tool_call_id: msg.tool_call_id.clone(),
                timestamp: now.clone(),
                bot_name: msg.bot_name.clone(),
            });
        }

        tx.execute(
            "UPDATE sessions SET message_count = message_count + ?1, updated_at = ?2 WHERE session_key = ?3",
            rusqlite::params![messages.len() as i64, now, key_str],
        )?;

        tx.commit()?;
        Ok(appended)
    }

    #[instrument(skip(self), fields(key = %key))]
    pub fn get_messages(&self, key: &ChannelKey) -> Result<Vec<Message>> {
        let key_str = key.format();
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, step_no, role, content, tool_call_id, bot_name, created_at
             FROM messages WHERE session_key = ?1 ORDER BY step_no ASC",
        )?;
        let rows = stmt.query_map(rusqlite::params![key_str], row_to_message)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    #[instrument(skip(self), fields(key = %key, tokens, model))]
    pub fn update_stats(&self, key: &ChannelKey, tokens: u64, model: &str) -> Result<()> {
        let key_str = key.format();
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        let rows_changed = db.execute(
            "UPDATE sessions
             SET total_tokens = total_tokens + ?1, last_model = ?2, updated_at = ?3
             WHERE session_key = ?4",
            rusqlite::params![tokens as i64, model, now, key_str],
        )?;
        if rows_changed == 0 {
            return Err(SessionError::NotFound { key: key_str });
        }
        Ok(())
    }

    /// Drop every message for `key` and zero its stats, leaving the session
    /// row itself intact (CLI `session reset`).
    #[instrument(skip(self), fields(key = %key))]
    pub fn reset(&self, key: &ChannelKey) -> Result<()> {
        let key_str = key.format();
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute("DELETE FROM messages WHERE session_key = ?1", rusqlite::params![key_str])?;
        db.execute(
            "UPDATE sessions SET message_count = 0, total_tokens = 0, updated_at = ?1 WHERE session_key = ?2",
            rusqlite::params![now, key_str],
        )?;
        Ok(())
    }

    /// Replace `messages[..boundary_idx]` with at most one summary message
    /// (or nothing, for `token_limit` mode) in a single transaction, renumbering
    /// the remaining rows so `step_no` stays dense. `messages` must be the
    /// full, in-order result of a preceding [`Self::get_messages`] call.
    /// Refuses with [`SessionError::WouldOrphanToolPair`] if `boundary_idx`
    /// would split a `tool_use`/`tool_result` pair, regardless of what the
    /// caller already checked.
    #[instrument(skip(self, messages, summary), fields(key = %key, boundary_idx))]
    pub fn compact_prefix(
        &self,
        key: &ChannelKey,
        messages: &[Message],
        boundary_idx: usize,
        summary: Option<(&str, &str)>,
    ) -> Result<usize> {
        if !boundary_is_safe(messages, boundary_idx) {
            return Err(SessionError::WouldOrphanToolPair);
        }
        let key_str = key.format();
        let now = chrono::Utc::now().to_rfc3339();
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;

        let dropped = &messages[..boundary_idx];
        for m in dropped {
            tx.execute("DELETE FROM messages WHERE id = ?1", rusqlite::params![m.id])?;
        }

        if let Some((content, bot_name)) = summary {
            tx.execute(
                "INSERT INTO messages (session_key, step_no, role, content, tool_call_id, bot_name, created_at)
                 VALUES (?1, -1, 'assistant', ?2, NULL, ?3, ?4)",
                rusqlite::params![key_str, content, bot_name, now],
            )?;
        }

        renumber_steps(&tx, &key_str)?;

        tx.execute(
            "UPDATE sessions
             SET message_count = (SELECT COUNT(*) FROM messages WHERE session_key = ?1), updated_at = ?2
             WHERE session_key = ?1",
            rusqlite::params![key_str, now],
        )?;

        tx.commit()?;
        Ok(dropped.len())
    }

    /// Like [`Self::compact_prefix`], but the caller supplies the already-trimmed
    /// replacement rows for `messages[..boundary_idx]` instead of one summary
    /// string — used by emergency compaction, which collapses/truncates rather
    /// than summarizes. Same `boundary_idx` safety check as `compact_prefix`.
    #[instrument(skip(self, messages, replacement), fields(key = %key, boundary_idx))]
    pub fn replace_prefix_verbatim(
        &self,
        key: &ChannelKey,
        messages: &[Message],
        boundary_idx: usize,
        replacement: Vec<Message>,
    ) -> Result<usize> {
        if !boundary_is_safe(messages, boundary_idx) {
            return Err(SessionError::WouldOrphanToolPair);
        }
        let key_str = key.format();
        let now = chrono::Utc::now().to_rfc3339();
        let mut db = self.db.lock().unwrap();
        let tx = db.transaction()?;

        let dropped_count = messages[..boundary_idx].len();
        for m in &messages[..boundary_idx] {
            tx.execute("DELETE FROM messages WHERE id = ?1", rusqlite::params![m.id])?;
        }

        for m in &replacement {
            tx.execute(
                "INSERT INTO messages (session_key, step_no, role, content, tool_call_id, bot_name, created_at)
                 VALUES (?1, -1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![key_str, m.role.as_str(), m.content, m.tool_call_id, m.bot_name, now],
            )?;
        }

        renumber_steps(&tx, &key_str)?;

        tx.execute(
            "UPDATE sessions
             SET message_count = (SELECT COUNT(*) FROM messages WHERE session_key = ?1), updated_at = ?2
             WHERE session_key = ?1",
            rusqlite::params![key_str, now],
        )?;

        tx.commit()?;
        Ok(dropped_count.saturating_sub(replacement.len()))
    }
}

/// True if `messages[0..boundary_idx]` contains every `tool_use` whose
/// matching `tool_result` also lies inside `0..boundary_idx` — i.e. no pair
/// straddles the cut. Mirrors the scan `Compactor::safe_boundary_at_or_before`
/// uses to pick a candidate boundary in the first place; this is the
/// independent check the mutation itself enforces before committing.
fn boundary_is_safe(messages: &[Message], boundary_idx: usize) -> bool {
    let boundary_idx = boundary_idx.min(messages.len());
    let mut pending: HashSet<&str> = HashSet::new();
    for m in &messages[..boundary_idx] {
        match (m.role, &m.tool_call_id) {
            (MessageRole::ToolUse, Some(id)) => {
                pending.insert(id.as_str());
            }
            (MessageRole::ToolResult, Some(id)) => {
                pending.remove(id.as_str());
            }
            _ => {}
        }
    }
    pending.is_empty()
}

/// Renumber every row for `session_key` to a dense, increasing `step_no`
/// ordered by the existing `step_no` (ties broken by `id`), so rows inserted
/// with a placeholder `step_no = -1` sort first.
fn renumber_steps(tx: &rusqlite::Transaction<'_>, key_str: &str) -> Result<()> {
    let ids: Vec<i64> = {
        let mut stmt = tx.prepare(
            "SELECT id FROM messages WHERE session_key = ?1 ORDER BY step_no ASC, id ASC",
        )?;
        let rows = stmt.query_map(rusqlite::params![key_str], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<_>>()?
    };
    for (new_step, id) in ids.iter().enumerate() {
        tx.execute(
            "UPDATE messages SET step_no = ?1 WHERE id = ?2",
            rusqlite::params![new_step as i64, id],
        )?;
    }
    Ok(())
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    let key_str: String = row.get(1)?;
    let key = roster_core::ChannelKey::parse(&key_str).unwrap_or(roster_core::ChannelKey {
        channel: String::new(),
        chat_id: key_str,
    });
    Ok(Session {
        id: row.get(0)?,
        key,
        message_count: row.get::<_, i64>(2)? as u32,
        total_tokens: row.get::<_, i64>(3)? as u64,
        last_model: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let role_str: String = row.get(2)?;
    Ok(Message {
        id: row.get(0)?,
        step_no: row.get(1)?,
        role: role_str.parse().unwrap_or(MessageRole::User),
        content: row.get(3)?,
        tool_call_id: row.get(4)?,
        bot_name: row.get(5)?,
        timestamp: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_core::ChannelKey;

    fn manager() -> SessionManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        SessionManager::new(conn)
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let mgr = manager();
        let key = ChannelKey::new("cli", "u1");
        let a = mgr.get_or_create(&key).unwrap();
        let b = mgr.get_or_create(&key).unwrap();
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn append_messages_assigns_dense_step_numbers() {
        let mgr = manager();
        let key = ChannelKey::new("cli", "u1");
        mgr.get_or_create(&key).unwrap();
        mgr.append_messages(&key, &[NewMessage::new(MessageRole::User, "hi", "leader")])
            .unwrap();
        mgr.append_messages(
            &key,
            &[
                NewMessage::new(MessageRole::Assistant, "calling", "leader"),
                NewMessage::new(MessageRole::ToolUse, "search(x)", "leader").with_tool_call_id("tc1"),
                NewMessage::new(MessageRole::ToolResult, "found", "leader").with_tool_call_id("tc1"),
            ],
        )
        .unwrap();
        let msgs = mgr.get_messages(&key).unwrap();
        let steps: Vec<i64> = msgs.iter().map(|m| m.step_no).collect();
        assert_eq!(steps, vec![0, 1, 2, 3]);

        let session = mgr.get(&key).unwrap().unwrap();
        assert_eq!(session.message_count, 4);
    }

    #[test]
    fn compact_prefix_preserves_suffix_and_renumbers() {
        let mgr = manager();
        let key = ChannelKey::new("cli", "u1");
        mgr.get_or_create(&key).unwrap();
        mgr.append_messages(
            &key,
            &[
                NewMessage::new(MessageRole::User, "a", "leader"),
                NewMessage::new(MessageRole::Assistant, "b", "leader"),
                NewMessage::new(MessageRole::User, "c", "leader"),
            ],
        )
        .unwrap();
        let messages = mgr.get_messages(&key).unwrap();
        mgr.compact_prefix(&key, &messages, 2, Some(("summary of a,b", "system")))
            .unwrap();

        let after = mgr.get_messages(&key).unwrap();
        assert_eq!(after.len(), 2);
        assert_eq!(after[0].content, "summary of a,b");
        assert_eq!(after[1].content, "c");
        assert_eq!(after[0].step_no, 0);
        assert_eq!(after[1].step_no, 1);
    }

    #[test]
    fn compact_prefix_rejects_boundary_that_splits_a_tool_pair() {
        let mgr = manager();
        let key = ChannelKey::new("cli", "u1");
        mgr.get_or_create(&key).unwrap();
        mgr.append_messages(
            &key,
            &[
                NewMessage::new(MessageRole::Assistant, "calling", "leader"),
                NewMessage::new(MessageRole::ToolUse, "search(x)", "leader").with_tool_call_id("tc1"),
                NewMessage::new(MessageRole::ToolResult, "found", "leader").with_tool_call_id("tc1"),
            ],
        )
        .unwrap();
        let messages = mgr.get_messages(&key).unwrap();
        // boundary 2 falls between the tool_use (idx 1) and its tool_result (idx 2).
        let err = mgr.compact_prefix(&key, &messages, 2, Some(("summary", "system"))).unwrap_err();
        assert!(matches!(err, SessionError::WouldOrphanToolPair));

        let unchanged = mgr.get_messages(&key).unwrap();
        assert_eq!(unchanged.len(), 3);
    }
}
