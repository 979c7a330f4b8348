use std::sync::Mutex;

use rusqlite::Connection;
use uuid::Uuid;

use crate::error::{Result, WorkLogError};
use crate::types::ToolOutput;

/// Overflow storage for tool output exceeding `max_tool_output_chars` (§4.4).
pub struct ToolOutputStore {
    db: Mutex<Connection>,
}

impl ToolOutputStore {
    pub fn new(conn: Connection) -> Self {
        Self { db: Mutex::new(conn) }
    }

    /// Persist `full_output` and return the stable reference form to place in
    /// context instead of the raw text.
    pub fn store(&self, tool_name: &str, full_output: &str, context_summary: &str, session_key: &str) -> Result<ToolOutput> {
        let id = Uuid::now_v7().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let char_count = full_output.chars().count();

        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO tool_outputs (id, tool_name, full_output, context_summary, session_key, created_at, accessed_count, char_count)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
            rusqlite::params![id, tool_name, full_output, context_summary, session_key, now, char_count as i64],
        )?;

        Ok(ToolOutput {
            id,
            tool_name: tool_name.to_string(),
            full_output: full_output.to_string(),
            context_summary: context_summary.to_string(),
            session_key: session_key.to_string(),
            created_at: now,
            accessed_count: 0,
            char_count,
        })
    }

    /// Resolve a `ref://<id>` back to its full output, bumping `accessed_count`.
    pub fn resolve(&self, id: &str) -> Result<ToolOutput> {
        let db = self.db.lock().unwrap();
        db.execute(
            "UPDATE tool_outputs SET accessed_count = accessed_count + 1 WHERE id = ?1",
            rusqlite::params![id],
        )?;
        db.query_row(
            "SELECT id, tool_name, full_output, context_summary, session_key, created_at, accessed_count, char_count
             FROM tool_outputs WHERE id = ?1",
            rusqlite::params![id],
            row_to_tool_output,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => WorkLogError::NotFound(id.to_string()),
            other => WorkLogError::Database(other),
        })
    }
}

fn row_to_tool_output(row: &rusqlite::Row<'_>) -> rusqlite::Result<ToolOutput> {
    Ok(ToolOutput {
        id: row.get(0)?,
        tool_name: row.get(1)?,
        full_output: row.get(2)?,
        context_summary: row.get(3)?,
        session_key: row.get(4)?,
        created_at: row.get(5)?,
        accessed_count: row.get::<_, i64>(6)? as u64,
        char_count: row.get::<_, i64>(7)? as usize,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ToolOutputStore {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_tool_outputs_db(&conn).unwrap();
        ToolOutputStore::new(conn)
    }

    #[test]
    fn store_then_resolve_roundtrip() {
        let store = store();
        let out = store.store("search", "lots of text", "found 3 results", "cli:u1").unwrap();
        let reference = out.reference();
        assert!(reference.starts_with("[search output"));
        assert!(reference.contains(&out.id));

        let resolved = store.resolve(&out.id).unwrap();
        assert_eq!(resolved.full_output, "lots of text");
        assert_eq!(resolved.accessed_count, 1);
    }
}
