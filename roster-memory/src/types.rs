use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Pending,
    Extracted,
    Failed,
}

impl ExtractionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Extracted => "extracted",
            Self::Failed => "failed",
        }
    }
}

impl std::str::FromStr for ExtractionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "extracted" => Ok(Self::Extracted),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown extraction status: {other}")),
        }
    }
}

/// A raw observation fed to the background extractor (§4.4 Ingestion).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub content: String,
    pub source_bot: String,
    pub timestamp: String,
    pub confidence: f64,
    pub embedding: Vec<f32>,
    pub extraction_status: ExtractionStatus,
}

/// A deduplicated named thing extracted from Events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    pub canonical_name: String,
    pub aliases: Vec<String>,
    pub entity_type: String,
    pub embedding: Vec<f32>,
    pub last_seen: String,
}

/// A directed, confidence-weighted relationship between two Entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub subject_entity: String,
    pub predicate: String,
    pub object_entity: String,
    pub confidence: f64,
    pub evidence_event_ids: Vec<String>,
}

/// A standalone subject/predicate/object assertion not necessarily tied to
/// two Entities (e.g. `(user, prefers, dark_mode)`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    pub id: String,
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub confidence: f64,
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryScope {
    Root,
    Channel,
    Entity,
    Topic,
}

impl SummaryScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Channel => "channel",
            Self::Entity => "entity",
            Self::Topic => "topic",
        }
    }
}

impl std::str::FromStr for SummaryScope {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "root" => Ok(Self::Root),
            "channel" => Ok(Self::Channel),
            "entity" => Ok(Self::Entity),
            "topic" => Ok(Self::Topic),
            other => Err(format!("unknown summary scope: {other}")),
        }
    }
}

/// A node in the summary tree: one root, children per channel, grandchildren
/// per active entity/topic (§4.4 Summaries).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryNode {
    pub id: String,
    pub parent_id: Option<String>,
    pub scope: SummaryScope,
    pub content: String,
    pub staleness_counter: u32,
    pub events_covered: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningSource {
    UserFeedback,
    LearningExchange,
}

impl LearningSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserFeedback => "user_feedback",
            Self::LearningExchange => "learning_exchange",
        }
    }
}

impl std::str::FromStr for LearningSource {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user_feedback" => Ok(Self::UserFeedback),
            "learning_exchange" => Ok(Self::LearningExchange),
            other => Err(format!("unknown learning source: {other}")),
        }
    }
}

/// A bot's private-by-default learned fact about how to operate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Learning {
    pub id: String,
    pub owner_bot: String,
    pub text: String,
    pub category: String,
    pub confidence: f64,
    pub relevance_score: f64,
    pub source: LearningSource,
    pub created_at: String,
    pub last_used_at: Option<String>,
}

/// Ranked retrieval bundle returned by `recall()` (§4.4 Retrieval).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecallResult {
    pub user_preferences: Option<SummaryNode>,
    pub entities: Vec<(Entity, f32)>,
    pub facts: Vec<Fact>,
    pub channel_summary: Option<SummaryNode>,
}
