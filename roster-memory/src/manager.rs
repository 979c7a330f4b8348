use std::sync::Mutex;

use rusqlite::{params, Connection};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::embedding::{check_dimension, cosine_similarity, normalize_name, pack, unpack};
use crate::error::{MemoryError, Result};
use crate::types::{Edge, Entity, Event, ExtractionStatus, Fact};

/// Default cosine-similarity threshold above which two entities are
/// considered duplicates when their normalized names don't already match.
pub const DEFAULT_DEDUP_THRESHOLD: f32 = 0.92;

/// Manages Events, Entities, Edges, and Facts — the knowledge-graph half of
/// MemoryStore (§3/§4.4).
pub struct MemoryManager {
    db: Mutex<Connection>,
    embedding_dim: usize,
}

impl MemoryManager {
    pub fn new(conn: Connection, embedding_dim: usize) -> Self {
        Self {
            db: Mutex::new(conn),
            embedding_dim,
        }
    }

    #[instrument(skip(self, event))]
    pub fn ingest_event(&self, event: &Event) -> Result<()> {
        check_dimension(&event.embedding, self.embedding_dim)?;
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO events (id, content, source_bot, timestamp, confidence, embedding, embedding_dim, extraction_status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event.id,
                event.content,
                event.source_bot,
                event.timestamp,
                event.confidence,
                pack(&event.embedding),
                event.embedding.len() as i64,
                event.extraction_status.as_str(),
            ],
        )?;
        Ok(())
    }

    /// Batch of events awaiting extraction, oldest first (background extractor input).
    pub fn pending_events(&self, batch_size: usize) -> Result<Vec<Event>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, content, source_bot, timestamp, confidence, embedding, extraction_status
             FROM events WHERE extraction_status = 'pending' ORDER BY timestamp ASC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![batch_size as i64], row_to_event)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn mark_extraction_status(&self, event_id: &str, status: ExtractionStatus) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "UPDATE events SET extraction_status = ?1 WHERE id = ?2",
            params![status.as_str(), event_id],
        )?;
        Ok(())
    }

    /// Upsert an entity with dedup by normalized-name exact match, falling
    /// back to cosine similarity above `threshold` against existing entities
    /// of the same type (§3 Entity dedup rule).
    #[instrument(skip(self, embedding))]
    pub fn upsert_entity(
        &self,
        canonical_name: &str,
        entity_type: &str,
        embedding: &[f32],
        alias: Option<&str>,
        threshold: f32,
    ) -> Result<Entity> {
        check_dimension(embedding, self.embedding_dim)?;
        let normalized = normalize_name(canonical_name);
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();

        if let Some(existing) = find_by_normalized_name(&db, &normalized)? {
            return merge_alias_and_touch(&db, existing, alias, &now);
        }

        // No exact match — scan same-type entities for a similarity hit.
        let candidates = load_entities_by_type(&db, entity_type)?;
        if let Some((best, _)) = candidates
            .iter()
            .map(|e| (e, cosine_similarity(embedding, &e.embedding)))
            .filter(|(_, score)| *score >= threshold)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        {
            debug!(entity = %best.canonical_name, "deduped entity via cosine similarity");
            return merge_alias_and_touch(&db, best.id.clone(), alias, &now);
        }

        let id = Uuid::now_v7().to_string();
        let aliases: Vec<String> = alias.into_iter().map(String::from).collect();
        db.execute(
            "INSERT INTO entities (id, canonical_name, normalized_name, aliases, entity_type, embedding, embedding_dim, last_seen)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                id,
                canonical_name,
                normalized,
                serde_json::to_string(&aliases).unwrap_or_default(),
                entity_type,
                pack(embedding),
                embedding.len() as i64,
                now,
            ],
        )?;
        Ok(Entity {
            id,
            canonical_name: canonical_name.to_string(),
            aliases,
            entity_type: entity_type.to_string(),
            embedding: embedding.to_vec(),
            last_seen: now,
        })
    }

    /// Cosine similarity scan across all entities, ties broken by more recent `last_seen`.
    pub fn search_similar_entities(&self, query: &[f32], top_k: usize, threshold: f32) -> Result<Vec<(Entity, f32)>> {
        let db = self.db.lock().unwrap();
        let all = load_all_entities(&db)?;
        let mut scored: Vec<(Entity, f32)> = all
            .into_iter()
            .map(|e| {
                let score = cosine_similarity(query, &e.embedding);
                (e, score)
            })
            .filter(|(_, score)| *score >= threshold)
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.0.last_seen.cmp(&a.0.last_seen))
        });
        scored.truncate(top_k);
        Ok(scored)
    }

    /// Insert or strengthen an Edge. On `(subject,predicate,object)` conflict,
    /// the higher confidence wins and evidence merges (§3 invariant).
    #[instrument(skip(self, evidence_event_ids))]
    pub fn upsert_edge(
        &self,
        subject_entity: &str,
        predicate: &str,
        object_entity: &str,
        confidence: f64,
        evidence_event_ids: &[String],
    ) -> Result<Edge> {
        let db = self.db.lock().unwrap();
        entity_must_exist(&db, subject_entity)?;
        entity_must_exist(&db, object_entity)?;

        let existing: Option<(String, f64, String)> = db
            .query_row(
                "SELECT id, confidence, evidence_event_ids FROM edges
                 WHERE subject_entity = ?1 AND predicate = ?2 AND object_entity = ?3",
                params![subject_entity, predicate, object_entity],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .ok();

        match existing {
            Some((id, old_conf, old_evidence_json)) => {
                let mut evidence: Vec<String> = serde_json::from_str(&old_evidence_json).unwrap_or_default();
                for e in evidence_event_ids {
                    if !evidence.contains(e) {
                        evidence.push(e.clone());
                    }
                }
                let winning_conf = confidence.max(old_conf);
                db.execute(
                    "UPDATE edges SET confidence = ?1, evidence_event_ids = ?2 WHERE id = ?3",
                    params![winning_conf, serde_json::to_string(&evidence).unwrap_or_default(), id],
                )?;
                Ok(Edge {
                    id,
                    subject_entity: subject_entity.to_string(),
                    predicate: predicate.to_string(),
                    object_entity: object_entity.to_string(),
                    confidence: winning_conf,
                    evidence_event_ids: evidence,
                })
            }
            None => {
                let id = Uuid::now_v7().to_string();
                db.execute(
                    "INSERT INTO edges (id, subject_entity, predicate, object_entity, confidence, evidence_event_ids)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        id,
                        subject_entity,
                        predicate,
                        object_entity,
                        confidence,
                        serde_json::to_string(evidence_event_ids).unwrap_or_default(),
                    ],
                )?;
                Ok(Edge {
                    id,
                    subject_entity: subject_entity.to_string(),
                    predicate: predicate.to_string(),
                    object_entity: object_entity.to_string(),
                    confidence,
                    evidence_event_ids: evidence_event_ids.to_vec(),
                })
            }
        }
    }

    /// Insert or strengthen a Fact. Same uniqueness/higher-confidence rule as Edge.
    pub fn upsert_fact(&self, subject: &str, predicate: &str, object: &str, confidence: f64, source: &str) -> Result<Fact> {
        let db = self.db.lock().unwrap();
        let existing: Option<(String, f64)> = db
            .query_row(
                "SELECT id, confidence FROM facts WHERE subject = ?1 AND predicate = ?2 AND object = ?3",
                params![subject, predicate, object],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .ok();

        match existing {
            Some((id, old_conf)) if confidence <= old_conf => Ok(Fact {
                id,
                subject: subject.to_string(),
                predicate: predicate.to_string(),
                object: object.to_string(),
                confidence: old_conf,
                source: source.to_string(),
            }),
            Some((id, _)) => {
                db.execute(
                    "UPDATE facts SET confidence = ?1, source = ?2 WHERE id = ?3",
                    params![confidence, source, id],
                )?;
                Ok(Fact {
                    id,
                    subject: subject.to_string(),
                    predicate: predicate.to_string(),
                    object: object.to_string(),
                    confidence,
                    source: source.to_string(),
                })
            }
            None => {
                let id = Uuid::now_v7().to_string();
                db.execute(
                    "INSERT INTO facts (id, subject, predicate, object, confidence, source) VALUES (?1,?2,?3,?4,?5,?6)",
                    params![id, subject, predicate, object, confidence, source],
                )?;
                Ok(Fact {
                    id,
                    subject: subject.to_string(),
                    predicate: predicate.to_string(),
                    object: object.to_string(),
                    confidence,
                    source: source.to_string(),
                })
            }
        }
    }

    pub fn facts_about(&self, entity_name: &str) -> Result<Vec<Fact>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, subject, predicate, object, confidence, source FROM facts
             WHERE subject = ?1 OR object = ?1",
        )?;
        let rows = stmt.query_map(params![entity_name], |row| {
            Ok(Fact {
                id: row.get(0)?,
                subject: row.get(1)?,
                predicate: row.get(2)?,
                object: row.get(3)?,
                confidence: row.get(4)?,
                source: row.get(5)?,
            })
        })?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// All entities, most recently seen first (CLI `memory entities`).
    pub fn list_entities(&self, limit: usize) -> Result<Vec<Entity>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT id, canonical_name, aliases, entity_type, embedding, last_seen
             FROM entities ORDER BY last_seen DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], row_to_entity)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Look up a single entity by canonical or normalized name (CLI `memory entity <name>`).
    pub fn find_entity_by_name(&self, name: &str) -> Result<Option<Entity>> {
        let db = self.db.lock().unwrap();
        match find_by_normalized_name(&db, &normalize_name(name))? {
            Some(id) => db
                .query_row(
                    "SELECT id, canonical_name, aliases, entity_type, embedding, last_seen FROM entities WHERE id = ?1",
                    params![id],
                    row_to_entity,
                )
                .map(Some)
                .map_err(MemoryError::Database),
            None => Ok(None),
        }
    }

    /// Remove an entity and everything that references it (CLI `memory forget <name>`).
    pub fn forget_entity(&self, name: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let id = find_by_normalized_name(&db, &normalize_name(name))?
            .ok_or_else(|| MemoryError::NotFound(name.to_string()))?;
        db.execute("DELETE FROM edges WHERE subject_entity = ?1 OR object_entity = ?1", params![id])?;
        db.execute("DELETE FROM entities WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Row counts per table, for the CLI `memory doctor` health summary.
    pub fn counts(&self) -> Result<MemoryCounts> {
        let db = self.db.lock().unwrap();
        let count = |table: &str| -> Result<u64> {
            db.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
                .map_err(MemoryError::Database)
        };
        Ok(MemoryCounts {
            events: count("events")?,
            entities: count("entities")?,
            edges: count("edges")?,
            facts: count("facts")?,
        })
    }

    /// Runs SQLite's own consistency check (CLI `memory doctor`).
    pub fn integrity_check(&self) -> Result<String> {
        let db = self.db.lock().unwrap();
        db.query_row("PRAGMA integrity_check", [], |row| row.get(0))
            .map_err(MemoryError::Database)
    }
}

/// Row counts across the knowledge graph tables.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct MemoryCounts {
    pub events: u64,
    pub entities: u64,
    pub edges: u64,
    pub facts: u64,
}

fn entity_must_exist(db: &Connection, id: &str) -> Result<()> {
    let exists: bool = db
        .query_row("SELECT 1 FROM entities WHERE id = ?1", params![id], |_| Ok(true))
        .unwrap_or(false);
    if exists {
        Ok(())
    } else {
        Err(MemoryError::DanglingEntityRef(id.to_string()))
    }
}

fn find_by_normalized_name(db: &Connection, normalized: &str) -> Result<Option<String>> {
    match db.query_row(
        "SELECT id FROM entities WHERE normalized_name = ?1",
        params![normalized],
        |row| row.get::<_, String>(0),
    ) {
        Ok(id) => Ok(Some(id)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(MemoryError::Database(e)),
    }
}

fn merge_alias_and_touch(db: &Connection, id: String, alias: Option<&str>, now: &str) -> Result<Entity> {
    if let Some(alias) = alias {
        let aliases_json: String = db.query_row(
            "SELECT aliases FROM entities WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        let mut aliases: Vec<String> = serde_json::from_str(&aliases_json).unwrap_or_default();
        if !aliases.iter().any(|a| a == alias) {
            aliases.push(alias.to_string());
            db.execute(
                "UPDATE entities SET aliases = ?1 WHERE id = ?2",
                params![serde_json::to_string(&aliases).unwrap_or_default(), id],
            )?;
        }
    }
    db.execute("UPDATE entities SET last_seen = ?1 WHERE id = ?2", params![now, id])?;
    db.query_row(
        "SELECT id, canonical_name, aliases, entity_type, embedding, last_seen FROM entities WHERE id = ?1",
        params![id],
        row_to_entity,
    )
    .map_err(MemoryError::Database)
}

fn load_entities_by_type(db: &Connection, entity_type: &str) -> Result<Vec<Entity>> {
    let mut stmt = db.prepare(
        "SELECT id, canonical_name, aliases, entity_type, embedding, last_seen FROM entities WHERE entity_type = ?1",
    )?;
    let rows = stmt.query_map(params![entity_type], row_to_entity)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

fn load_all_entities(db: &Connection) -> Result<Vec<Entity>> {
    let mut stmt = db.prepare("SELECT id, canonical_name, aliases, entity_type, embedding, last_seen FROM entities")?;
    let rows = stmt.query_map([], row_to_entity)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

fn row_to_entity(row: &rusqlite::Row<'_>) -> rusqlite::Result<Entity> {
    let aliases_json: String = row.get(2)?;
    let embedding_blob: Vec<u8> = row.get(4)?;
    Ok(Entity {
        id: row.get(0)?,
        canonical_name: row.get(1)?,
        aliases: serde_json::from_str(&aliases_json).unwrap_or_default(),
        entity_type: row.get(3)?,
        embedding: unpack(&embedding_blob),
        last_seen: row.get(5)?,
    })
}

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    let status_str: String = row.get(6)?;
    let embedding_blob: Vec<u8> = row.get(5)?;
    Ok(Event {
        id: row.get(0)?,
        content: row.get(1)?,
        source_bot: row.get(2)?,
        timestamp: row.get(3)?,
        confidence: row.get(4)?,
        embedding: unpack(&embedding_blob),
        extraction_status: status_str.parse().unwrap_or(ExtractionStatus::Pending),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> MemoryManager {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        MemoryManager::new(conn, 3)
    }

    #[test]
    fn upsert_entity_dedups_by_normalized_name() {
        let mgr = manager();
        let a = mgr.upsert_entity("Jane Doe", "person", &[1.0, 0.0, 0.0], None, 0.9).unwrap();
        let b = mgr.upsert_entity("jane   doe", "person", &[1.0, 0.0, 0.0], None, 0.9).unwrap();
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn upsert_entity_dedups_by_similarity_above_threshold() {
        let mgr = manager();
        let a = mgr.upsert_entity("Widget Factory", "org", &[1.0, 0.0, 0.0], None, 0.9).unwrap();
        let b = mgr
            .upsert_entity("Widget Factory Inc", "org", &[0.99, 0.01, 0.0], None, 0.9)
            .unwrap();
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn upsert_edge_merges_evidence_and_keeps_higher_confidence() {
        let mgr = manager();
        let e1 = mgr.upsert_entity("Alice", "person", &[1.0, 0.0, 0.0], None, 0.9).unwrap();
        let e2 = mgr.upsert_entity("Acme", "org", &[0.0, 1.0, 0.0], None, 0.9).unwrap();
        mgr.upsert_edge(&e1.id, "works_at", &e2.id, 0.6, &["ev1".to_string()]).unwrap();
        let merged = mgr
            .upsert_edge(&e1.id, "works_at", &e2.id, 0.9, &["ev2".to_string()])
            .unwrap();
        assert_eq!(merged.confidence, 0.9);
        assert_eq!(merged.evidence_event_ids.len(), 2);
    }

    #[test]
    fn search_similar_entities_orders_by_score() {
        let mgr = manager();
        mgr.upsert_entity("A", "topic", &[1.0, 0.0, 0.0], None, 0.9).unwrap();
        mgr.upsert_entity("B", "topic", &[0.0, 1.0, 0.0], None, 0.9).unwrap();
        let results = mgr.search_similar_entities(&[0.9, 0.1, 0.0], 5, 0.0).unwrap();
        assert_eq!(results[0].0.canonical_name, "A");
    }
}
