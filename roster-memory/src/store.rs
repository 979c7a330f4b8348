use std::path::Path;

use rusqlite::Connection;

use crate::error::Result;
use crate::learning::LearningStore;
use crate::manager::MemoryManager;
use crate::summary::SummaryTree;
use crate::types::RecallResult;

/// Single entry point into `memory.db`: the knowledge graph
/// ([`MemoryManager`]), the hierarchical summary tree ([`SummaryTree`]), and
/// per-bot learnings ([`LearningStore`]). Each sub-store owns its own
/// connection to the same file — safe under WAL — so none contends with the
/// others for its internal lock.
pub struct MemoryStore {
    pub manager: MemoryManager,
    pub summaries: SummaryTree,
    pub learnings: LearningStore,
}

impl MemoryStore {
    pub fn open(path: &Path, embedding_dim: usize) -> Result<Self> {
        let manager_conn = Connection::open(path)?;
        crate::db::init_db(&manager_conn)?;
        let summary_conn = Connection::open(path)?;
        crate::db::init_db(&summary_conn)?;
        let learning_conn = Connection::open(path)?;
        crate::db::init_db(&learning_conn)?;

        Ok(Self {
            manager: MemoryManager::new(manager_conn, embedding_dim),
            summaries: SummaryTree::new(summary_conn),
            learnings: LearningStore::new(learning_conn),
        })
    }

    pub fn open_in_memory(embedding_dim: usize) -> Result<Self> {
        let manager_conn = Connection::open_in_memory()?;
        crate::db::init_db(&manager_conn)?;
        let summary_conn = Connection::open_in_memory()?;
        crate::db::init_db(&summary_conn)?;
        let learning_conn = Connection::open_in_memory()?;
        crate::db::init_db(&learning_conn)?;

        Ok(Self {
            manager: MemoryManager::new(manager_conn, embedding_dim),
            summaries: SummaryTree::new(summary_conn),
            learnings: LearningStore::new(learning_conn),
        })
    }

    /// Assemble a retrieval bundle: the always-on user-preferences summary,
    /// the top-k entities similar to `query_embedding`, the facts touching
    /// those entities, and the channel-scoped summary when `channel_label`
    /// is given (§4.4 Retrieval).
    pub fn recall(
        &self,
        query_embedding: &[f32],
        k: usize,
        similarity_threshold: f32,
        channel_label: Option<&str>,
    ) -> Result<RecallResult> {
        let user_preferences = Some(self.summaries.get_or_create_user_preferences()?);
        let entities = self.manager.search_similar_entities(query_embedding, k, similarity_threshold)?;

        let mut facts = Vec::new();
        for (entity, _) in &entities {
            facts.extend(self.manager.facts_about(&entity.id)?);
        }

        let channel_summary = match channel_label {
            Some(label) => self.summaries.find_channel_node(label)?,
            None => None,
        };

        Ok(RecallResult {
            user_preferences,
            entities,
            facts,
            channel_summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recall_assembles_preferences_entities_and_facts() {
        let store = MemoryStore::open_in_memory(3).unwrap();
        let alice = store
            .manager
            .upsert_entity("Alice", "person", &[1.0, 0.0, 0.0], None, 0.9)
            .unwrap();
        store.manager.upsert_fact(&alice.id, "prefers", "dark_mode", 0.8, "observed").unwrap();

        let result = store.recall(&[0.9, 0.1, 0.0], 5, 0.5, Some("general")).unwrap();
        assert!(result.user_preferences.is_some());
        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.facts.len(), 1);
        assert!(result.channel_summary.is_none());
    }
}
