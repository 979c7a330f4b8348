use std::sync::RwLock;

use tracing::debug;

use crate::check::CheckDefinition;
use crate::error::{Result, SchedulerError};

/// A named table of checks, sorted by priority (§4.6 CheckRegistry). Checks
/// are registered once at startup; the registry itself never runs anything —
/// [`crate::heartbeat::HeartbeatService`] dispatches through it.
pub struct CheckRegistry {
    checks: RwLock<Vec<CheckDefinition>>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self { checks: RwLock::new(Vec::new()) }
    }

    pub fn register(&self, check: CheckDefinition) {
        let mut checks = self.checks.write().expect("check registry poisoned");
        checks.push(check);
        checks.sort_by_key(|c| c.priority);
        debug!(name = %checks.last().unwrap().name, "check registered");
    }

    pub fn unregister(&self, name: &str) {
        let mut checks = self.checks.write().expect("check registry poisoned");
        checks.retain(|c| c.name != name);
    }

    /// Checks visible to `bot`, in priority order (§8: `bot_domains=['all']`
    /// is listable from every bot's view; a domain-specific check is not).
    pub fn for_bot(&self, bot: &str) -> Vec<String> {
        self.checks
            .read()
            .expect("check registry poisoned")
            .iter()
            .filter(|c| c.visible_to(bot))
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn with_check<T>(&self, name: &str, f: impl FnOnce(&CheckDefinition) -> T) -> Result<T> {
        let checks = self.checks.read().expect("check registry poisoned");
        let check = checks
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| SchedulerError::CheckNotFound(name.to_string()))?;
        Ok(f(check))
    }

    /// Cloneable handles (Arc handler + metadata) for every check visible to
    /// `bot`, in priority order — what [`crate::heartbeat::HeartbeatService`]
    /// actually iterates over during a tick.
    pub fn snapshot_for_bot(&self, bot: &str) -> Vec<CheckSnapshot> {
        self.checks
            .read()
            .expect("check registry poisoned")
            .iter()
            .filter(|c| c.visible_to(bot))
            .map(|c| CheckSnapshot {
                name: c.name.clone(),
                default_timeout_ms: c.default_timeout_ms,
                config: c.config.clone(),
                handler: std::sync::Arc::clone(&c.handler),
            })
            .collect()
    }
}

/// A snapshot of one check's dispatch-relevant fields, cheap to clone out of
/// the registry's read lock before an async timeout/retry loop runs.
#[derive(Clone)]
pub struct CheckSnapshot {
    pub name: String,
    pub default_timeout_ms: u64,
    pub config: serde_json::Value,
    pub handler: std::sync::Arc<dyn crate::check::CheckHandler>,
}

impl Default for CheckRegistry {
    fn default() -> Self {
        Self::new()
    }
}
