pub mod db;
pub mod embedding;
pub mod error;
pub mod learning;
pub mod manager;
pub mod store;
pub mod summary;
pub mod types;

pub use error::{MemoryError, Result};
pub use learning::{LearningStore, ACCESS_BOOST, DEFAULT_HALF_LIFE_DAYS};
pub use manager::{MemoryCounts, MemoryManager, DEFAULT_DEDUP_THRESHOLD};
pub use store::MemoryStore;
pub use summary::{SummaryTree, DEFAULT_REFRESH_BATCH_CAP, DEFAULT_STALENESS_THRESHOLD};
pub use types::{
    Edge, Entity, Event, ExtractionStatus, Fact, Learning, LearningSource, RecallResult, SummaryNode, SummaryScope,
};
