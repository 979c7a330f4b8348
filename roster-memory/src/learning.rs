use std::sync::Mutex;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{Learning, LearningSource};

/// Default half-life for relevance decay, in days (§3 invariant).
pub const DEFAULT_HALF_LIFE_DAYS: f64 = 14.0;
/// Fixed boost applied to `relevance_score` whenever a Learning is used.
pub const ACCESS_BOOST: f64 = 0.1;

/// Manages a bot's private-by-default Learnings.
pub struct LearningStore {
    db: Mutex<Connection>,
}

impl LearningStore {
    pub fn new(conn: Connection) -> Self {
        Self { db: Mutex::new(conn) }
    }

    pub fn record(
        &self,
        owner_bot: &str,
        text: &str,
        category: &str,
        confidence: f64,
        source: LearningSource,
    ) -> Result<Learning> {
        let id = Uuid::now_v7().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO learnings (id, owner_bot, text, category, confidence, relevance_score, source, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1.0, ?6, ?7)",
            params![id, owner_bot, text, category, confidence, source.as_str(), now],
        )?;
        Ok(Learning {
            id,
            owner_bot: owner_bot.to_string(),
            text: text.to_string(),
            category: category.to_string(),
            confidence,
            relevance_score: 1.0,
            source,
            created_at: now,
            last_used_at: None,
        })
    }

    /// Learnings for `owner_bot`, decayed by age and re-sorted by the decayed
    /// score, highest first. Does not mutate stored `relevance_score` — call
    /// [`Self::touch`] when a learning is actually used.
    pub fn relevant_for(&self, owner_bot: &str, half_life_days: f64, limit: usize) -> Result<Vec<Learning>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, owner_bot, text, category, confidence, relevance_score, source, created_at, last_used_at
             FROM learnings WHERE owner_bot = ?1",
        )?;
        let now = chrono::Utc::now();
        let mut rows: Vec<Learning> = stmt
            .query_map(params![owner_bot], row_to_learning)?
            .filter_map(|r| r.ok())
            .collect();

        for l in rows.iter_mut() {
            let created = chrono::DateTime::parse_from_rfc3339(&l.created_at)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .unwrap_or(now);
            let age_days = now.signed_duration_since(created).num_seconds() as f64 / 86_400.0;
            let decay = 0.5_f64.powf(age_days / half_life_days.max(0.001));
            l.relevance_score *= decay;
        }
        rows.sort_by(|a, b| b.relevance_score.partial_cmp(&a.relevance_score).unwrap_or(std::cmp::Ordering::Equal));
        rows.truncate(limit);
        Ok(rows)
    }

    /// Boost a Learning's persisted `relevance_score` by a fixed fraction and
    /// stamp `last_used_at` (§3 "access boosts by a fixed fraction").
    pub fn touch(&self, id: &str) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "UPDATE learnings SET relevance_score = relevance_score + ?1, last_used_at = ?2 WHERE id = ?3",
            params![ACCESS_BOOST, now, id],
        )?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<Learning>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, owner_bot, text, category, confidence, relevance_score, source, created_at, last_used_at
             FROM learnings WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], row_to_learning)?;
        match rows.next() {
            Some(r) => Ok(Some(r?)),
            None => Ok(None),
        }
    }
}

fn row_to_learning(row: &rusqlite::Row<'_>) -> rusqlite::Result<Learning> {
    let source_str: String = row.get(6)?;
    Ok(Learning {
        id: row.get(0)?,
        owner_bot: row.get(1)?,
        text: row.get(2)?,
        category: row.get(3)?,
        confidence: row.get(4)?,
        relevance_score: row.get(5)?,
        source: source_str.parse().unwrap_or(LearningSource::UserFeedback),
        created_at: row.get(7)?,
        last_used_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> LearningStore {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        LearningStore::new(conn)
    }

    #[test]
    fn record_and_touch_roundtrip() {
        let store = store();
        let l = store
            .record("leader", "prefers terse replies", "user_preference", 0.8, LearningSource::UserFeedback)
            .unwrap();
        store.touch(&l.id).unwrap();
        let fetched = store.get(&l.id).unwrap().unwrap();
        assert!(fetched.relevance_score > 1.0);
        assert!(fetched.last_used_at.is_some());
    }
}
