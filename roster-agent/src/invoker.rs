//! Fire-and-forget cross-bot invocation (§4.8 BotInvoker).

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use roster_bus::{Envelope, EnvelopeKind, MessageBus};

/// A function that runs a bot's task and returns its result text. Supplied
/// by the caller (the AgentLoop owning the target bot's tool catalog) —
/// `BotInvoker` itself only knows how to spawn it and publish the outcome.
pub type BotTask = Box<dyn FnOnce() -> std::pin::Pin<Box<dyn std::future::Future<Output = String> + Send>> + Send>;

/// Spawns specialist-bot work in the background and announces completion on
/// the MessageBus as a `system` envelope, correlated by `invocation_id`
/// rather than positional order (§4.8 ordering guarantee).
pub struct BotInvoker {
    bus: Arc<MessageBus>,
}

impl BotInvoker {
    pub fn new(bus: Arc<MessageBus>) -> Self {
        Self { bus }
    }

    /// Always returns immediately with a human-readable acknowledgement.
    /// The actual task runs in a spawned background future; its result is
    /// published as a `system` envelope on completion.
    pub async fn invoke(&self, bot: &str, task: BotTask, origin_channel: &str, origin_chat_id: &str) -> String {
        let invocation_id = Uuid::now_v7().to_string();
        let bus = Arc::clone(&self.bus);
        let bot_name = bot.to_string();
        let channel = origin_channel.to_string();
        let chat_id = origin_chat_id.to_string();
        let inv_id = invocation_id.clone();

        tokio::spawn(async move {
            info!(bot = %bot_name, invocation_id = %inv_id, "bot invocation started");
            let result_text = task().await;
            let env = Envelope::system(channel, chat_id, result_text, inv_id.clone());
            if let Err(e) = bus.try_publish(env).await {
                warn!(invocation_id = %inv_id, "failed to publish invocation result: {e}");
            }
        });

        format!("@{bot} is on it…")
    }
}

/// Tags an envelope as a system completion so an AgentLoop can tell
/// invocation results apart from heartbeat findings sharing the same queue.
pub fn is_invocation_result(env: &Envelope) -> bool {
    env.kind == EnvelopeKind::System && env.correlation_id.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invoke_returns_ack_immediately_and_publishes_result_later() {
        let bus = Arc::new(MessageBus::new(8));
        let invoker = BotInvoker::new(Arc::clone(&bus));

        let task: BotTask = Box::new(|| Box::pin(async { "the paper says X".to_string() }));
        let ack = invoker.invoke("researcher", task, "cli", "chat1").await;
        assert_eq!(ack, "@researcher is on it…");

        let env = tokio::time::timeout(std::time::Duration::from_secs(1), bus.next(EnvelopeKind::System))
            .await
            .expect("invocation result should arrive");
        assert!(is_invocation_result(&env));
        assert_eq!(env.content, "the paper says X");
    }
}
