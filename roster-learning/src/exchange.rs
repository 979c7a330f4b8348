use std::collections::VecDeque;
use std::sync::Mutex;

use rusqlite::{params, Connection};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::applicability::applicable_bots;
use crate::error::Result;
use crate::types::{LearningPackage, NewPackage, PackageScope, PackageStatus};

/// Categories eligible for promotion by default (§4.7 item 1), mirrored from
/// `RosterConfig::learning_exchange.shareable_categories`'s default set.
pub const DEFAULT_SHAREABLE_CATEGORIES: &[&str] = &[
    "user_preference",
    "tool_pattern",
    "error_pattern",
    "performance_tip",
    "context_tip",
    "workflow_tip",
    "reasoning_pattern",
    "integration_tip",
];

/// Outcome of one receive-callback invocation during a distribution cycle.
pub struct DistributionOutcome {
    pub package_id: String,
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

/// Queues, applies applicability rules to, and distributes LearningPackages
/// across the bot roster (§4.7). Backed by its own `learning_exchange.db`.
pub struct LearningExchange {
    db: Mutex<Connection>,
    /// In-memory FIFO of queued+approved package ids, rebuilt from the Store
    /// on startup to preserve insertion order (§4.7 "Startup recovery").
    queue: Mutex<VecDeque<String>>,
    auto_approve: bool,
    min_confidence: f64,
    shareable_categories: Vec<String>,
}

impl LearningExchange {
    pub fn open(conn: Connection, auto_approve: bool, min_confidence: f64, shareable_categories: Vec<String>) -> Result<Self> {
        crate::db::init_db(&conn)?;
        let queue = load_queued_ids(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
            queue: Mutex::new(queue.into()),
            auto_approve,
            min_confidence,
            shareable_categories,
        })
    }

    /// Whether a Learning with `confidence`/`category` is eligible for
    /// promotion into a package at all (§4.7 item 1).
    pub fn should_promote(&self, confidence: f64, category: &str) -> bool {
        confidence >= self.min_confidence && self.shareable_categories.iter().any(|c| c == category)
    }

    /// Atomically insert a LearningPackage and mark it queued. Approval state
    /// follows `auto_approve`: when true the package is immediately eligible
    /// for the next distribution cycle; when false it sits `queued` until
    /// [`Self::approve_package`] is called (DESIGN.md open question 3).
    #[instrument(skip(self, package))]
    pub fn promote_learning(&self, learning_id: &str, package: NewPackage) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        let approved = self.auto_approve;

        {
            let db = self.db.lock().unwrap();
            db.execute(
                "INSERT INTO queued_packages
                 (id, learning_id, category, title, description, confidence, scope,
                  applicable_rooms, applicable_bots, source_bot, source_room, evidence,
                  status, distributed_to, approved, created_at)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,'queued','[]',?13,?14)",
                params![
                    id,
                    learning_id,
                    package.category,
                    package.title,
                    package.description,
                    package.confidence,
                    package.scope.as_str(),
                    serde_json::to_string(&package.applicable_rooms).unwrap_or_default(),
                    serde_json::to_string(&package.applicable_bots).unwrap_or_default(),
                    package.source_bot,
                    package.source_room,
                    serde_json::to_string(&package.evidence).unwrap_or_default(),
                    approved as i64,
                    now,
                ],
            )?;
        }

        if approved {
            self.queue.lock().unwrap().push_back(id.clone());
        }
        info!(package_id = %id, approved, "learning package promoted");
        Ok(id)
    }

    /// Manually approve a held package, making it eligible for the next cycle.
    pub fn approve_package(&self, package_id: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let rows = db.execute(
            "UPDATE queued_packages SET approved = 1 WHERE id = ?1 AND status = 'queued'",
            params![package_id],
        )?;
        drop(db);
        if rows > 0 {
            self.queue.lock().unwrap().push_back(package_id.to_string());
        }
        Ok(())
    }

    /// All queued packages in insertion order (§4.2 `get_pending_packages`).
    pub fn get_pending_packages(&self) -> Result<Vec<LearningPackage>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, learning_id, category, title, description, confidence, scope,
                    applicable_rooms, applicable_bots, source_bot, source_room, evidence,
                    status, distributed_to, approved, created_at
             FROM queued_packages WHERE status = 'queued' ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map([], row_to_package)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Flip status to distributed and append recipients (§4.2 `mark_distributed`).
    pub fn mark_distributed(&self, package_id: &str, bot_names: &[String]) -> Result<()> {
        let db = self.db.lock().unwrap();
        let existing_json: String = db.query_row(
            "SELECT distributed_to FROM queued_packages WHERE id = ?1",
            params![package_id],
            |row| row.get(0),
        )?;
        let mut recipients: Vec<String> = serde_json::from_str(&existing_json).unwrap_or_default();
        for b in bot_names {
            if !recipients.contains(b) {
                recipients.push(b.clone());
            }
        }
        db.execute(
            "UPDATE queued_packages SET status = 'distributed', distributed_to = ?1 WHERE id = ?2",
            params![serde_json::to_string(&recipients).unwrap_or_default(), package_id],
        )?;
        Ok(())
    }

    /// Pop the next queued package id off the in-memory FIFO, if any.
    pub fn pop_next(&self) -> Option<String> {
        self.queue.lock().unwrap().pop_front()
    }

    pub fn get_package(&self, id: &str) -> Result<Option<LearningPackage>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, learning_id, category, title, description, confidence, scope,
                    applicable_rooms, applicable_bots, source_bot, source_room, evidence,
                    status, distributed_to, approved, created_at
             FROM queued_packages WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], row_to_package)?;
        match rows.next() {
            Some(r) => Ok(Some(r?)),
            None => Ok(None),
        }
    }

    /// Run one exchange cycle: pop every currently queued+approved package,
    /// compute its applicable-bot set, and invoke `receive` once per
    /// applicable bot. On a callback error the package is still marked
    /// distributed if at least one recipient succeeded; otherwise it stays
    /// queued for the next cycle (§4.7 item 2).
    pub fn run_cycle(
        &self,
        all_bots: &[String],
        room_members: impl Fn(&str) -> Vec<String>,
        mut receive: impl FnMut(&str, &LearningPackage) -> std::result::Result<(), String>,
    ) -> Result<Vec<DistributionOutcome>> {
        let mut outcomes = Vec::new();
        while let Some(id) = self.pop_next() {
            let Some(package) = self.get_package(&id)? else {
                continue;
            };
            let bots = applicable_bots(&package, all_bots, &room_members);
            let mut succeeded = Vec::new();
            let mut failed = Vec::new();
            for bot in &bots {
                match receive(bot, &package) {
                    Ok(()) => succeeded.push(bot.clone()),
                    Err(err) => {
                        warn!(package_id = %package.id, bot = %bot, error = %err, "learning distribution callback failed");
                        failed.push(bot.clone());
                    }
                }
            }
            if !succeeded.is_empty() {
                self.mark_distributed(&package.id, &succeeded)?;
            } else if !bots.is_empty() {
                // No recipient succeeded: leave queued, re-enqueue for the next cycle.
                self.queue.lock().unwrap().push_back(package.id.clone());
            }
            outcomes.push(DistributionOutcome {
                package_id: package.id,
                succeeded,
                failed,
            });
        }
        Ok(outcomes)
    }
}

fn load_queued_ids(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM queued_packages WHERE status = 'queued' AND approved = 1 ORDER BY created_at ASC",
    )?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

fn row_to_package(row: &rusqlite::Row<'_>) -> rusqlite::Result<LearningPackage> {
    let scope_str: String = row.get(6)?;
    let status_str: String = row.get(12)?;
    let rooms_json: String = row.get(7)?;
    let bots_json: String = row.get(8)?;
    let evidence_json: String = row.get(11)?;
    let distributed_json: String = row.get(13)?;
    Ok(LearningPackage {
        id: row.get(0)?,
        learning_id: row.get(1)?,
        category: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        confidence: row.get(5)?,
        scope: scope_str.parse().unwrap_or(PackageScope::General),
        applicable_rooms: serde_json::from_str(&rooms_json).unwrap_or_default(),
        applicable_bots: serde_json::from_str(&bots_json).unwrap_or_default(),
        source_bot: row.get(9)?,
        source_room: row.get(10)?,
        evidence: serde_json::from_str(&evidence_json).unwrap_or_default(),
        status: status_str.parse().unwrap_or(PackageStatus::Queued),
        distributed_to: serde_json::from_str(&distributed_json).unwrap_or_default(),
        approved: row.get::<_, i64>(14)? != 0,
        created_at: row.get(15)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange(auto_approve: bool) -> LearningExchange {
        let conn = Connection::open_in_memory().unwrap();
        LearningExchange::open(conn, auto_approve, 0.85, DEFAULT_SHAREABLE_CATEGORIES.iter().map(|s| s.to_string()).collect()).unwrap()
    }

    fn new_package() -> NewPackage {
        NewPackage {
            category: "user_preference".into(),
            title: "IEEE citations".into(),
            description: "user wants IEEE-style citations".into(),
            confidence: 0.92,
            scope: PackageScope::General,
            applicable_rooms: vec![],
            applicable_bots: vec![],
            source_bot: "researcher".into(),
            source_room: Some("general".into()),
            evidence: vec!["evt1".into()],
        }
    }

    #[test]
    fn auto_approve_makes_package_immediately_poppable() {
        let ex = exchange(true);
        let id = ex.promote_learning("learning1", new_package()).unwrap();
        assert_eq!(ex.pop_next(), Some(id));
    }

    #[test]
    fn manual_approval_withholds_until_approved() {
        let ex = exchange(false);
        let id = ex.promote_learning("learning1", new_package()).unwrap();
        assert_eq!(ex.pop_next(), None);
        ex.approve_package(&id).unwrap();
        assert_eq!(ex.pop_next(), Some(id));
    }

    #[test]
    fn run_cycle_distributes_to_applicable_bots_except_source() {
        let ex = exchange(true);
        ex.promote_learning("learning1", new_package()).unwrap();
        let all_bots = vec!["leader".to_string(), "researcher".to_string(), "coder".to_string()];
        let outcomes = ex
            .run_cycle(&all_bots, |_| vec![], |_bot, _pkg| Ok(()))
            .unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].succeeded.len(), 2);
        let pending = ex.get_pending_packages().unwrap();
        assert!(pending.is_empty());
    }

    #[test]
    fn startup_recovery_reloads_queued_approved_packages() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO queued_packages
             (id, learning_id, category, title, description, confidence, scope,
              applicable_rooms, applicable_bots, source_bot, source_room, evidence,
              status, distributed_to, approved, created_at)
             VALUES ('p1','l1','user_preference','t','d',0.9,'general','[]','[]','researcher',NULL,'[]','queued','[]',1,?1)",
            params![now],
        )
        .unwrap();
        let ex = LearningExchange::open(conn, true, 0.85, vec!["user_preference".to_string()]).unwrap();
        assert_eq!(ex.pop_next(), Some("p1".to_string()));
    }
}
