use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use tokio::sync::{watch, Mutex, Semaphore};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use roster_core::config::HeartbeatConfig;

use crate::check::CheckResult;
use crate::check::CheckStatus;
use crate::circuit_breaker::CircuitBreaker;
use crate::registry::CheckRegistry;

/// What caused a HeartbeatTick to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Scheduled,
    Manual,
    Event,
}

/// Overall outcome of one tick across all of its checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickStatus {
    Running,
    Completed,
    CompletedWithFailures,
    Failed,
    Skipped,
}

/// Per-bot execution record (§3 HeartbeatTick). Kept in an in-memory bounded
/// history; nothing here is persisted — a restart loses tick history, which
/// is acceptable since checks are idempotent re-runs, not audit records.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HeartbeatTick {
    pub tick_id: String,
    pub bot_name: String,
    pub trigger: TriggerType,
    pub triggered_by: Option<String>,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub status: TickStatus,
    pub results: Vec<CheckResult>,
}

/// Runs one bot's checks on an interval, serializing ticks and gating
/// execution behind a circuit breaker (§4.6 HeartbeatService).
pub struct HeartbeatService {
    bot_name: String,
    registry: Arc<CheckRegistry>,
    breaker: Mutex<CircuitBreaker>,
    config: HeartbeatConfig,
    history: Mutex<VecDeque<HeartbeatTick>>,
    retain_history_count: usize,
    /// Held for the full duration of `tick()`, so a manual `trigger_now`
    /// and the scheduled `run` loop can never execute a tick for this bot
    /// concurrently (§5: ticks for a single bot are serialized).
    tick_lock: Mutex<()>,
}

impl HeartbeatService {
    pub fn new(bot_name: impl Into<String>, registry: Arc<CheckRegistry>, config: HeartbeatConfig, retain_history_count: usize) -> Self {
        let bot_name = bot_name.into();
        let breaker = CircuitBreaker::new(bot_name.clone(), config.circuit_breaker_threshold, config.circuit_breaker_timeout_s);
        Self {
            bot_name,
            registry,
            breaker: Mutex::new(breaker),
            config,
            history: Mutex::new(VecDeque::new()),
            retain_history_count,
            tick_lock: Mutex::new(()),
        }
    }

    /// Recent ticks, most recent last, bounded to `retain_history_count`.
    pub async fn history(&self) -> Vec<HeartbeatTick> {
        self.history.lock().await.iter().cloned().collect()
    }

    /// Runs a tick immediately with `trigger=manual`. Does not reset the
    /// interval schedule — the caller's own `run` loop keeps ticking on
    /// its normal cadence regardless of this call's outcome.
    pub async fn trigger_now(&self, reason: impl Into<String>) -> HeartbeatTick {
        self.tick(TriggerType::Manual, Some(reason.into())).await
    }

    /// Sleeps for `interval_s`; on every wake runs a tick, until shutdown
    /// fires, using a `tokio::time::interval` paired with a
    /// `watch::Receiver<bool>` shutdown signal.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        if !self.config.enabled {
            info!(bot = %self.bot_name, "heartbeat disabled, not starting");
            return;
        }
        info!(bot = %self.bot_name, interval_s = self.config.interval_s, "heartbeat started");
        let mut interval = tokio::time::interval(StdDuration::from_secs(self.config.interval_s));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick(TriggerType::Scheduled, None).await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(bot = %self.bot_name, "heartbeat shutting down");
                        break;
                    }
                }
            }
        }
    }

    #[instrument(skip(self), fields(bot = %self.bot_name))]
    async fn tick(&self, trigger: TriggerType, triggered_by: Option<String>) -> HeartbeatTick {
        let _serialize = self.tick_lock.lock().await;
        let tick_id = Uuid::now_v7().to_string();
        let started_at = Utc::now();

        let mut breaker = self.breaker.lock().await;
        if breaker.should_skip(started_at) {
            drop(breaker);
            let tick = HeartbeatTick {
                tick_id,
                bot_name: self.bot_name.clone(),
                trigger,
                triggered_by,
                started_at: started_at.to_rfc3339(),
                ended_at: Some(Utc::now().to_rfc3339()),
                status: TickStatus::Skipped,
                results: Vec::new(),
            };
            warn!(bot = %self.bot_name, "circuit breaker open, tick skipped");
            self.push_history(tick.clone()).await;
            return tick;
        }
        drop(breaker);

        let checks = self.registry.snapshot_for_bot(&self.bot_name);
        let exec_timeout = StdDuration::from_secs(self.config.max_execution_time_s.max(1));
        let (results, timed_out) = if self.config.parallel_checks {
            self.run_parallel_bounded(&checks, exec_timeout).await
        } else {
            match tokio::time::timeout(exec_timeout, self.run_sequential(&checks)).await {
                Ok(results) => (results, false),
                Err(_) => (Vec::new(), true),
            }
        };
        if timed_out {
            warn!(bot = %self.bot_name, timeout_s = self.config.max_execution_time_s, "heartbeat tick exceeded max_execution_time_s, outstanding checks cancelled");
        }

        let any_failed = results.iter().any(|r| !r.success);
        let all_failed = !results.is_empty() && results.iter().all(|r| !r.success);

        {
            let mut breaker = self.breaker.lock().await;
            if timed_out || all_failed {
                breaker.record_failure(Utc::now());
            } else if !results.is_empty() {
                breaker.record_success();
            }
        }

        let status = if timed_out {
            TickStatus::Failed
        } else if results.is_empty() {
            TickStatus::Completed
        } else if !any_failed {
            TickStatus::Completed
        } else if any_failed && !all_failed {
            TickStatus::CompletedWithFailures
        } else {
            TickStatus::Failed
        };

        let tick = HeartbeatTick {
            tick_id,
            bot_name: self.bot_name.clone(),
            trigger,
            triggered_by,
            started_at: started_at.to_rfc3339(),
            ended_at: Some(Utc::now().to_rfc3339()),
            status,
            results,
        };
        self.push_history(tick.clone()).await;
        tick
    }

    async fn run_sequential(&self, checks: &[crate::registry::CheckSnapshot]) -> Vec<CheckResult> {
        let mut results = Vec::with_capacity(checks.len());
        for check in checks {
            let result = self.run_one_with_retry(check).await;
            let failed = !result.success;
            results.push(result);
            if failed && self.config.stop_on_first_failure {
                break;
            }
        }
        results
    }

    fn spawn_checks(&self, checks: &[crate::registry::CheckSnapshot]) -> Vec<tokio::task::JoinHandle<CheckResult>> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_checks.max(1)));
        checks
            .iter()
            .cloned()
            .map(|check| {
                let semaphore = Arc::clone(&semaphore);
                let bot_name = self.bot_name.clone();
                let retry_attempts = self.config.retry_attempts;
                let retry_delay_s = self.config.retry_delay_s;
                let retry_backoff = self.config.retry_backoff;
                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                    run_check_with_retry(&bot_name, &check, retry_attempts, retry_delay_s, retry_backoff).await
                })
            })
            .collect()
    }

    /// Runs `checks` concurrently, aborting every still-running task if
    /// `timeout` elapses before they all finish. Returns `(results, true)`
    /// on expiry so the caller marks the tick `Failed` instead of folding
    /// partial results into a normal status.
    async fn run_parallel_bounded(
        &self,
        checks: &[crate::registry::CheckSnapshot],
        timeout: StdDuration,
    ) -> (Vec<CheckResult>, bool) {
        let handles = self.spawn_checks(checks);
        let abort_handles: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();
        let collect = async move {
            let mut results = Vec::with_capacity(handles.len());
            for handle in handles {
                match handle.await {
                    Ok(result) => results.push(result),
                    Err(e) => warn!("heartbeat check task panicked: {e}"),
                }
            }
            results
        };
        match tokio::time::timeout(timeout, collect).await {
            Ok(results) => (results, false),
            Err(_) => {
                for abort_handle in abort_handles {
                    abort_handle.abort();
                }
                (Vec::new(), true)
            }
        }
    }

    async fn run_one_with_retry(&self, check: &crate::registry::CheckSnapshot) -> CheckResult {
        run_check_with_retry(&self.bot_name, check, self.config.retry_attempts, self.config.retry_delay_s, self.config.retry_backoff).await
    }

    async fn push_history(&self, tick: HeartbeatTick) {
        let mut history = self.history.lock().await;
        history.push_back(tick);
        while history.len() > self.retain_history_count {
            history.pop_front();
        }
    }
}

/// Runs a single check under its timeout, retrying on failure with an
/// exponential `retry_delay_s * retry_backoff^attempt` delay between
/// attempts.
async fn run_check_with_retry(
    bot_name: &str,
    check: &crate::registry::CheckSnapshot,
    retry_attempts: u32,
    retry_delay_s: u64,
    retry_backoff: f64,
) -> CheckResult {
    let mut attempt = 0;
    loop {
        let started_at = Utc::now();
        let timeout = StdDuration::from_millis(check.default_timeout_ms);
        let outcome = tokio::time::timeout(timeout, check.handler.run(bot_name, &check.config)).await;
        let ended_at = Utc::now();
        let duration_ms = (ended_at - started_at).num_milliseconds().max(0) as u64;

        let result = match outcome {
            Ok(outcome) => CheckResult {
                check_name: check.name.clone(),
                started_at: started_at.to_rfc3339(),
                ended_at: Some(ended_at.to_rfc3339()),
                status: if outcome.success { CheckStatus::Success } else { CheckStatus::Failed },
                success: outcome.success,
                message: outcome.message,
                data: outcome.data,
                error: None,
                error_type: None,
                action_taken: outcome.action_taken,
                duration_ms,
            },
            Err(_) => CheckResult {
                check_name: check.name.clone(),
                started_at: started_at.to_rfc3339(),
                ended_at: Some(ended_at.to_rfc3339()),
                status: CheckStatus::Timeout,
                success: false,
                message: format!("check '{}' timed out after {}ms", check.name, check.default_timeout_ms),
                data: serde_json::Value::Null,
                error: Some("timeout".to_string()),
                error_type: Some("Timeout".to_string()),
                action_taken: None,
                duration_ms,
            },
        };

        if result.success || attempt >= retry_attempts {
            return result;
        }
        let delay = retry_delay_s as f64 * retry_backoff.powi(attempt as i32);
        tokio::time::sleep(StdDuration::from_secs_f64(delay.max(0.0))).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::check::{CheckDefinition, CheckHandler, CheckOutcome};

    struct AlwaysOk;
    #[async_trait]
    impl CheckHandler for AlwaysOk {
        async fn run(&self, _bot: &str, _config: &serde_json::Value) -> CheckOutcome {
            CheckOutcome::success("ok")
        }
    }

    struct AlwaysFails;
    #[async_trait]
    impl CheckHandler for AlwaysFails {
        async fn run(&self, _bot: &str, _config: &serde_json::Value) -> CheckOutcome {
            CheckOutcome::failure("nope")
        }
    }

    fn heartbeat_config() -> HeartbeatConfig {
        HeartbeatConfig {
            interval_s: 1,
            max_execution_time_s: 10,
            enabled: true,
            checks: Vec::new(),
            parallel_checks: false,
            max_concurrent_checks: 4,
            retry_attempts: 0,
            retry_delay_s: 0,
            retry_backoff: 1.0,
            circuit_breaker_threshold: 3,
            circuit_breaker_timeout_s: 600,
            stop_on_first_failure: false,
        }
    }

    #[tokio::test]
    async fn trigger_now_runs_registered_checks() {
        let registry = Arc::new(CheckRegistry::new());
        registry.register(CheckDefinition {
            name: "ok_check".into(),
            description: "".into(),
            priority: 0,
            default_timeout_ms: 1000,
            bot_domains: vec!["all".into()],
            config: serde_json::Value::Null,
            handler: Arc::new(AlwaysOk),
        });
        let service = HeartbeatService::new("researcher", registry, heartbeat_config(), 10);
        let tick = service.trigger_now("manual test").await;
        assert_eq!(tick.status, TickStatus::Completed);
        assert_eq!(tick.results.len(), 1);
    }

    #[tokio::test]
    async fn three_failing_ticks_open_the_breaker() {
        let registry = Arc::new(CheckRegistry::new());
        registry.register(CheckDefinition {
            name: "flaky".into(),
            description: "".into(),
            priority: 0,
            default_timeout_ms: 1000,
            bot_domains: vec!["all".into()],
            config: serde_json::Value::Null,
            handler: Arc::new(AlwaysFails),
        });
        let service = HeartbeatService::new("researcher", registry, heartbeat_config(), 10);
        service.trigger_now("t1").await;
        service.trigger_now("t2").await;
        let third = service.trigger_now("t3").await;
        assert_eq!(third.status, TickStatus::Failed);

        let fourth = service.trigger_now("t4").await;
        assert_eq!(fourth.status, TickStatus::Skipped);
    }

    #[tokio::test]
    async fn history_is_bounded_by_retain_count() {
        let registry = Arc::new(CheckRegistry::new());
        let service = HeartbeatService::new("researcher", registry, heartbeat_config(), 2);
        service.trigger_now("t1").await;
        service.trigger_now("t2").await;
        service.trigger_now("t3").await;
        assert_eq!(service.history().await.len(), 2);
    }
}
