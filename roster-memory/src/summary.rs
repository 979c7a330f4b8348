use std::sync::Mutex;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::error::{MemoryError, Result};
use crate::types::{SummaryNode, SummaryScope};

/// Default staleness threshold and batch cap for the refresh job (§4.4 Summaries).
pub const DEFAULT_STALENESS_THRESHOLD: u32 = 10;
pub const DEFAULT_REFRESH_BATCH_CAP: usize = 20;

/// Manages the SummaryNode tree: one root, children per channel, grandchildren
/// per active entity or topic.
pub struct SummaryTree {
    db: Mutex<Connection>,
}

impl SummaryTree {
    pub fn new(conn: Connection) -> Self {
        Self { db: Mutex::new(conn) }
    }

    /// Return the single root node, creating it if this is a fresh database.
    pub fn get_or_create_root(&self) -> Result<SummaryNode> {
        let db = self.db.lock().unwrap();
        if let Some(node) = find_node(&db, SummaryScope::Root, None, "")? {
            return Ok(node);
        }
        let id = Uuid::now_v7().to_string();
        db.execute(
            "INSERT INTO summary_nodes (id, parent_id, scope, label, content) VALUES (?1, NULL, 'root', '', '')",
            params![id],
        )?;
        Ok(SummaryNode {
            id,
            parent_id: None,
            scope: SummaryScope::Root,
            content: String::new(),
            staleness_counter: 0,
            events_covered: 0,
        })
    }

    /// Return (creating if needed) the always-on user-preferences node, pinned
    /// under root (§4.4 Retrieval item 1).
    pub fn get_or_create_user_preferences(&self) -> Result<SummaryNode> {
        let root = self.get_or_create_root()?;
        self.get_or_create_child(&root.id, SummaryScope::Root, "preferences")
    }

    /// Return (creating if needed) the child node for the given scope+label
    /// under `parent_id` (e.g. a channel node under root, or an entity node
    /// under a channel).
    pub fn get_or_create_child(&self, parent_id: &str, scope: SummaryScope, label: &str) -> Result<SummaryNode> {
        let db = self.db.lock().unwrap();
        if let Some(node) = find_node(&db, scope, Some(parent_id), label)? {
            return Ok(node);
        }
        let id = Uuid::now_v7().to_string();
        db.execute(
            "INSERT INTO summary_nodes (id, parent_id, scope, label, content) VALUES (?1, ?2, ?3, ?4, '')",
            params![id, parent_id, scope.as_str(), label],
        )?;
        Ok(SummaryNode {
            id,
            parent_id: Some(parent_id.to_string()),
            scope,
            content: String::new(),
            staleness_counter: 0,
            events_covered: 0,
        })
    }

    /// Increment staleness by one and bump `events_covered`, called whenever
    /// an event within this node's scope is added.
    pub fn mark_event_added(&self, node_id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let rows = db.execute(
            "UPDATE summary_nodes SET staleness_counter = staleness_counter + 1, events_covered = events_covered + 1 WHERE id = ?1",
            params![node_id],
        )?;
        if rows == 0 {
            return Err(MemoryError::NotFound(node_id.to_string()));
        }
        Ok(())
    }

    /// Nodes due for a refresh (`staleness_counter >= threshold`), capped at `batch_cap`.
    pub fn stale_nodes(&self, threshold: u32, batch_cap: usize) -> Result<Vec<SummaryNode>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, parent_id, scope, content, staleness_counter, events_covered
             FROM summary_nodes WHERE staleness_counter >= ?1 ORDER BY staleness_counter DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![threshold, batch_cap as i64], row_to_node)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Replace `content` with a freshly generated summary and reset staleness to zero.
    pub fn apply_refresh(&self, node_id: &str, content: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "UPDATE summary_nodes SET content = ?1, staleness_counter = 0 WHERE id = ?2",
            params![content, node_id],
        )?;
        Ok(())
    }

    pub fn get(&self, node_id: &str) -> Result<Option<SummaryNode>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, parent_id, scope, content, staleness_counter, events_covered FROM summary_nodes WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![node_id], row_to_node)?;
        match rows.next() {
            Some(r) => Ok(Some(r?)),
            None => Ok(None),
        }
    }

    pub fn find_channel_node(&self, channel_label: &str) -> Result<Option<SummaryNode>> {
        let root = self.get_or_create_root()?;
        let db = self.db.lock().unwrap();
        find_node(&db, SummaryScope::Channel, Some(&root.id), channel_label)
    }
}

fn find_node(db: &Connection, scope: SummaryScope, parent_id: Option<&str>, label: &str) -> Result<Option<SummaryNode>> {
    let result = db.query_row(
        "SELECT id, parent_id, scope, content, staleness_counter, events_covered
         FROM summary_nodes WHERE scope = ?1 AND COALESCE(parent_id, '') = ?2 AND label = ?3",
        params![scope.as_str(), parent_id.unwrap_or(""), label],
        row_to_node,
    );
    match result {
        Ok(node) => Ok(Some(node)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(MemoryError::Database(e)),
    }
}

fn row_to_node(row: &rusqlite::Row<'_>) -> rusqlite::Result<SummaryNode> {
    let scope_str: String = row.get(2)?;
    Ok(SummaryNode {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        scope: scope_str.parse().unwrap_or(SummaryScope::Topic),
        content: row.get(3)?,
        staleness_counter: row.get::<_, i64>(4)? as u32,
        events_covered: row.get::<_, i64>(5)? as u32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> SummaryTree {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        SummaryTree::new(conn)
    }

    #[test]
    fn root_is_singleton() {
        let t = tree();
        let a = t.get_or_create_root().unwrap();
        let b = t.get_or_create_root().unwrap();
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn staleness_refresh_cycle() {
        let t = tree();
        let root = t.get_or_create_root().unwrap();
        let channel = t.get_or_create_child(&root.id, SummaryScope::Channel, "cli").unwrap();
        for _ in 0..10 {
            t.mark_event_added(&channel.id).unwrap();
        }
        let stale = t.stale_nodes(10, 20).unwrap();
        assert_eq!(stale.len(), 1);
        t.apply_refresh(&channel.id, "summary text").unwrap();
        let refreshed = t.get(&channel.id).unwrap().unwrap();
        assert_eq!(refreshed.staleness_counter, 0);
        assert_eq!(refreshed.content, "summary text");
    }
}
