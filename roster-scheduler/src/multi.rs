use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::heartbeat::HeartbeatService;

/// One unit of pending cross-bot work the coordinator tick should dispatch
/// (an insight awaiting distribution, a decision awaiting a vote, ...).
#[async_trait]
pub trait CoordinationWorkSource: Send + Sync {
    /// Look for pending work and act on it. Implementations own their own
    /// idempotency — a tick that finds nothing to do is a no-op.
    async fn coordinator_tick(&self);
}

/// Registers every bot's HeartbeatService, starts/stops them together, and
/// runs one additional coordinator tick at the leader bot's interval looking
/// for cross-bot coordination work (§4.6 MultiHeartbeatManager).
#[derive(Clone)]
pub struct MultiHeartbeatManager {
    services: HashMap<String, Arc<HeartbeatService>>,
    leader: String,
    leader_interval_s: u64,
    coordination: Vec<Arc<dyn CoordinationWorkSource>>,
}

impl MultiHeartbeatManager {
    pub fn new(leader: impl Into<String>, leader_interval_s: u64) -> Self {
        Self { services: HashMap::new(), leader: leader.into(), leader_interval_s, coordination: Vec::new() }
    }

    pub fn register(&mut self, bot_name: impl Into<String>, service: Arc<HeartbeatService>) {
        self.services.insert(bot_name.into(), service);
    }

    pub fn add_coordination_source(&mut self, source: Arc<dyn CoordinationWorkSource>) {
        self.coordination.push(source);
    }

    /// Starts every registered HeartbeatService plus the coordinator-tick
    /// loop, all observing the same shutdown signal. Returns immediately;
    /// callers await the returned handles (or simply drop them and rely on
    /// the shutdown signal to stop them at process exit).
    pub fn start(&self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(self.services.len() + 1);

        for (bot_name, service) in &self.services {
            let service = Arc::clone(service);
            let shutdown = shutdown.clone();
            let bot_name = bot_name.clone();
            handles.push(tokio::spawn(async move {
                info!(bot = %bot_name, "heartbeat task starting");
                service.run(shutdown).await;
            }));
        }

        if !self.coordination.is_empty() {
            let sources = self.coordination.clone();
            let interval_s = self.leader_interval_s;
            let leader = self.leader.clone();
            let mut shutdown = shutdown.clone();
            handles.push(tokio::spawn(async move {
                info!(%leader, interval_s, "coordinator tick loop started");
                let mut interval = tokio::time::interval(StdDuration::from_secs(interval_s));
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            for source in &sources {
                                source.coordinator_tick().await;
                            }
                        }
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() {
                                info!("coordinator tick loop shutting down");
                                break;
                            }
                        }
                    }
                }
            }));
        }

        handles
    }

    pub fn bot_names(&self) -> Vec<String> {
        self.services.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::registry::CheckRegistry;

    fn heartbeat_config() -> roster_core::config::HeartbeatConfig {
        roster_core::config::HeartbeatConfig { interval_s: 1, enabled: false, ..Default::default() }
    }

    struct CountingSource(Arc<AtomicUsize>);
    #[async_trait]
    impl CoordinationWorkSource for CountingSource {
        async fn coordinator_tick(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn register_tracks_bot_names() {
        let mut manager = MultiHeartbeatManager::new("leader", 60);
        let registry = Arc::new(CheckRegistry::new());
        let service = Arc::new(HeartbeatService::new("researcher", registry, heartbeat_config(), 10));
        manager.register("researcher", service);
        assert_eq!(manager.bot_names(), vec!["researcher".to_string()]);
    }

    #[tokio::test]
    async fn coordination_source_is_invoked_directly() {
        let counter = Arc::new(AtomicUsize::new(0));
        let source = Arc::new(CountingSource(Arc::clone(&counter)));
        source.coordinator_tick().await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
