use tokio::sync::watch;

use crate::error::BusError;
use crate::queue::PartitionedQueue;
use crate::types::{Envelope, EnvelopeKind};

/// Default bound on envelopes queued per bus, per queue kind.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Three independent bounded FIFO queues — inbound, outbound, system — each
/// partitioned by `(channel, chat_id)` (§4.1).
///
/// A `MessageBus` is the one hand-off point between channel adapters, the
/// AgentLoop, BotInvoker, and HeartbeatService; none of those components talk
/// to each other directly.
pub struct MessageBus {
    inbound: PartitionedQueue,
    outbound: PartitionedQueue,
    system: PartitionedQueue,
}

impl MessageBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            inbound: PartitionedQueue::new("inbound", capacity),
            outbound: PartitionedQueue::new("outbound", capacity),
            system: PartitionedQueue::new("system", capacity),
        }
    }

    fn queue_for(&self, kind: EnvelopeKind) -> &PartitionedQueue {
        match kind {
            EnvelopeKind::Inbound => &self.inbound,
            EnvelopeKind::Outbound => &self.outbound,
            EnvelopeKind::System => &self.system,
        }
    }

    /// Publish an envelope, blocking if its queue is at capacity. Intended for
    /// channel adapters feeding `inbound`, and for the AgentLoop's `outbound`
    /// emission.
    pub async fn publish(&self, env: Envelope) {
        self.queue_for(env.kind).publish(env).await;
    }

    /// Publish without blocking; sheds and logs a warning if the queue is full.
    /// Intended for internal producers (BotInvoker results, HeartbeatService
    /// findings) per §4.1.
    pub async fn try_publish(&self, env: Envelope) -> Result<(), BusError> {
        self.queue_for(env.kind).try_publish(env).await
    }

    /// Await the next envelope of the given kind, in round-robin partition order.
    pub async fn next(&self, kind: EnvelopeKind) -> Envelope {
        self.queue_for(kind).next().await
    }

    /// Like [`Self::next`] but returns `None` once `shutdown` is signalled.
    pub async fn next_cancellable(
        &self,
        kind: EnvelopeKind,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Option<Envelope> {
        self.queue_for(kind).next_cancellable(shutdown).await
    }

    pub async fn depth(&self, kind: EnvelopeKind) -> usize {
        self.queue_for(kind).len().await
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_then_next_roundtrip() {
        let bus = MessageBus::default();
        let env = Envelope::new("cli", "u1", "user", "hello", EnvelopeKind::Inbound);
        bus.publish(env).await;
        let got = bus.next(EnvelopeKind::Inbound).await;
        assert_eq!(got.content, "hello");
    }

    #[tokio::test]
    async fn kinds_are_independent_queues() {
        let bus = MessageBus::default();
        bus.publish(Envelope::new("cli", "u1", "user", "in", EnvelopeKind::Inbound))
            .await;
        bus.publish(Envelope::new(
            "cli",
            "u1",
            "leader",
            "out",
            EnvelopeKind::Outbound,
        ))
        .await;
        assert_eq!(bus.depth(EnvelopeKind::Inbound).await, 1);
        assert_eq!(bus.depth(EnvelopeKind::Outbound).await, 1);
        assert_eq!(bus.depth(EnvelopeKind::System).await, 0);
    }
}
