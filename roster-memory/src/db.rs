use rusqlite::Connection;

use crate::error::Result;

/// Initialise `memory.db`'s tables. Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA foreign_keys=ON;

         CREATE TABLE IF NOT EXISTS events (
            id                TEXT PRIMARY KEY,
            content           TEXT NOT NULL,
            source_bot        TEXT NOT NULL,
            timestamp         TEXT NOT NULL,
            confidence        REAL NOT NULL,
            embedding         BLOB NOT NULL,
            embedding_dim     INTEGER NOT NULL,
            extraction_status TEXT NOT NULL DEFAULT 'pending'
         );
         CREATE INDEX IF NOT EXISTS idx_events_status
            ON events(extraction_status, timestamp);

         CREATE TABLE IF NOT EXISTS entities (
            id             TEXT PRIMARY KEY,
            canonical_name TEXT NOT NULL,
            normalized_name TEXT NOT NULL,
            aliases        TEXT NOT NULL DEFAULT '[]',
            entity_type    TEXT NOT NULL,
            embedding      BLOB NOT NULL,
            embedding_dim  INTEGER NOT NULL,
            last_seen      TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS idx_entities_normalized
            ON entities(normalized_name);

         CREATE TABLE IF NOT EXISTS edges (
            id                TEXT PRIMARY KEY,
            subject_entity    TEXT NOT NULL,
            predicate         TEXT NOT NULL,
            object_entity     TEXT NOT NULL,
            confidence        REAL NOT NULL,
            evidence_event_ids TEXT NOT NULL DEFAULT '[]',
            UNIQUE(subject_entity, predicate, object_entity),
            FOREIGN KEY(subject_entity) REFERENCES entities(id),
            FOREIGN KEY(object_entity) REFERENCES entities(id)
         );

         CREATE TABLE IF NOT EXISTS facts (
            id         TEXT PRIMARY KEY,
            subject    TEXT NOT NULL,
            predicate  TEXT NOT NULL,
            object     TEXT NOT NULL,
            confidence REAL NOT NULL,
            source     TEXT NOT NULL,
            UNIQUE(subject, predicate, object)
         );

         CREATE TABLE IF NOT EXISTS summary_nodes (
            id               TEXT PRIMARY KEY,
            parent_id        TEXT,
            scope            TEXT NOT NULL,
            label            TEXT NOT NULL DEFAULT '',
            content          TEXT NOT NULL DEFAULT '',
            staleness_counter INTEGER NOT NULL DEFAULT 0,
            events_covered   INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY(parent_id) REFERENCES summary_nodes(id)
         );
         CREATE INDEX IF NOT EXISTS idx_summary_scope
            ON summary_nodes(scope, staleness_counter DESC);
         CREATE UNIQUE INDEX IF NOT EXISTS idx_summary_parent_label
            ON summary_nodes(scope, COALESCE(parent_id, ''), label);

         CREATE TABLE IF NOT EXISTS learnings (
            id              TEXT PRIMARY KEY,
            owner_bot       TEXT NOT NULL,
            text            TEXT NOT NULL,
            category        TEXT NOT NULL,
            confidence      REAL NOT NULL,
            relevance_score REAL NOT NULL DEFAULT 1.0,
            source          TEXT NOT NULL,
            created_at      TEXT NOT NULL,
            last_used_at    TEXT
         );
         CREATE INDEX IF NOT EXISTS idx_learnings_owner
            ON learnings(owner_bot, relevance_score DESC);",
    )?;
    Ok(())
}
