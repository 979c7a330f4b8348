use serde::{Deserialize, Serialize};
use uuid::Uuid;

use roster_core::ChannelKey;

/// Which of the three bus queues an [`Envelope`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeKind {
    Inbound,
    Outbound,
    System,
}

/// Optional reference to an attachment carried alongside an envelope's text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub kind: String,
    pub uri: String,
}

/// The unit of traffic on the [`crate::MessageBus`].
///
/// Immutable once published. Every `system` envelope must reference either a
/// completed bot invocation or a heartbeat tick via `correlation_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub id: String,
    pub channel: String,
    pub chat_id: String,
    pub sender_id: String,
    pub timestamp: String,
    pub content: String,
    pub attachments: Vec<AttachmentRef>,
    pub kind: EnvelopeKind,
    /// For `system` envelopes: the invocation_id or tick_id this result belongs to.
    pub correlation_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl Envelope {
    pub fn new(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        sender_id: impl Into<String>,
        content: impl Into<String>,
        kind: EnvelopeKind,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            channel: channel.into(),
            chat_id: chat_id.into(),
            sender_id: sender_id.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            content: content.into(),
            attachments: Vec::new(),
            kind,
            correlation_id: None,
            metadata: None,
        }
    }

    pub fn system(
        channel: impl Into<String>,
        chat_id: impl Into<String>,
        content: impl Into<String>,
        correlation_id: impl Into<String>,
    ) -> Self {
        let mut env = Self::new(channel, chat_id, "system", content, EnvelopeKind::System);
        env.correlation_id = Some(correlation_id.into());
        env
    }

    pub fn channel_key(&self) -> ChannelKey {
        ChannelKey::new(self.channel.clone(), self.chat_id.clone())
    }
}
