use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable name of a bot (leader or specialist), e.g. `"leader"`, `"researcher"`.
///
/// Bot names are configuration, not generated ids — they come from the
/// workspace's bot roster and are compared case-sensitively throughout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BotId(pub String);

impl BotId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BotId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier for a Room (Workspace) — a named scope containing a participant
/// set and a conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The `(channel, chat_id)` pair that keys a Session (§3) and partitions the
/// MessageBus for FIFO-per-conversation delivery (§4.1).
///
/// This is the one true conversation key in the system — two different
/// external channels with the same `chat_id` are still distinct keys because
/// `channel` is part of the tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelKey {
    pub channel: String,
    pub chat_id: String,
}

impl ChannelKey {
    pub fn new(channel: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            chat_id: chat_id.into(),
        }
    }

    /// Canonical string form, used as the SQLite `session_key` column value.
    pub fn format(&self) -> String {
        format!("{}:{}", self.channel, self.chat_id)
    }

    pub fn parse(s: &str) -> Option<Self> {
        let (channel, chat_id) = s.split_once(':')?;
        Some(Self {
            channel: channel.to_string(),
            chat_id: chat_id.to_string(),
        })
    }
}

impl fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

/// Escalation threshold tiers used by Rooms and the RoleCard enforcer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscalationThreshold {
    Low,
    Medium,
    High,
}

impl fmt::Display for EscalationThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for EscalationThreshold {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown escalation threshold: {other}")),
        }
    }
}

/// Kind of a Room (Workspace), §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    Open,
    Project,
    Direct,
    Coordination,
}

impl fmt::Display for RoomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Project => write!(f, "project"),
            Self::Direct => write!(f, "direct"),
            Self::Coordination => write!(f, "coordination"),
        }
    }
}

impl std::str::FromStr for RoomKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "project" => Ok(Self::Project),
            "direct" => Ok(Self::Direct),
            "coordination" => Ok(Self::Coordination),
            other => Err(format!("unknown room kind: {other}")),
        }
    }
}

/// A named context scoping a subset of bots (§3 Room/Workspace).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub kind: RoomKind,
    pub participants: Vec<BotId>,
    pub owner: String,
    pub created_at: String,
    pub coordinator_mode: bool,
    pub escalation_threshold: EscalationThreshold,
}

impl Room {
    pub fn new(kind: RoomKind, owner: impl Into<String>, participants: Vec<BotId>) -> Self {
        Self {
            id: RoomId::new(),
            kind,
            participants,
            owner: owner.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
            coordinator_mode: false,
            escalation_threshold: EscalationThreshold::Medium,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_key_roundtrip() {
        let k = ChannelKey::new("cli", "u1");
        let s = k.format();
        assert_eq!(s, "cli:u1");
        assert_eq!(ChannelKey::parse(&s), Some(k));
    }

    #[test]
    fn channel_key_chat_id_may_contain_colons() {
        // split_once splits on the FIRST colon, so chat_id retains any extra colons.
        let k = ChannelKey::parse("telegram:123:456").unwrap();
        assert_eq!(k.channel, "telegram");
        assert_eq!(k.chat_id, "123:456");
    }
}
