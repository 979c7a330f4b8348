use serde::{Deserialize, Serialize};

/// Where a LearningPackage may apply (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageScope {
    General,
    Project,
    Team,
    BotSpecific,
}

impl PackageScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Project => "project",
            Self::Team => "team",
            Self::BotSpecific => "bot_specific",
        }
    }
}

impl std::str::FromStr for PackageScope {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "general" => Ok(Self::General),
            "project" => Ok(Self::Project),
            "team" => Ok(Self::Team),
            "bot_specific" => Ok(Self::BotSpecific),
            other => Err(format!("unknown package scope: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    Queued,
    Distributed,
    Archived,
}

impl PackageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Distributed => "distributed",
            Self::Archived => "archived",
        }
    }
}

impl std::str::FromStr for PackageStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "distributed" => Ok(Self::Distributed),
            "archived" => Ok(Self::Archived),
            other => Err(format!("unknown package status: {other}")),
        }
    }
}

/// A Learning promoted for cross-bot distribution (§3). Never deleted —
/// terminal state is `Archived`, not row removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningPackage {
    pub id: String,
    pub learning_id: String,
    pub category: String,
    pub title: String,
    pub description: String,
    pub confidence: f64,
    pub scope: PackageScope,
    pub applicable_rooms: Vec<String>,
    pub applicable_bots: Vec<String>,
    pub source_bot: String,
    pub source_room: Option<String>,
    pub evidence: Vec<String>,
    pub status: PackageStatus,
    pub distributed_to: Vec<String>,
    /// Not part of the spec's LearningPackage fields directly, but required to
    /// implement the auto_approve/manual-approval distinction (DESIGN.md open
    /// question 3): a package only enters a distribution cycle once approved.
    pub approved: bool,
    pub created_at: String,
}

/// Input to [`crate::exchange::LearningExchange::promote_learning`] — the
/// caller-supplied half of a LearningPackage, before the exchange assigns an
/// id, status, and approval state.
#[derive(Debug, Clone)]
pub struct NewPackage {
    pub category: String,
    pub title: String,
    pub description: String,
    pub confidence: f64,
    pub scope: PackageScope,
    pub applicable_rooms: Vec<String>,
    pub applicable_bots: Vec<String>,
    pub source_bot: String,
    pub source_room: Option<String>,
    pub evidence: Vec<String>,
}
