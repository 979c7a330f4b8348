use chrono::{DateTime, Duration, Utc};

/// Three-state circuit gating a bot's heartbeat execution (§8 scenario S5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Per-bot circuit breaker state, persisted only in memory — a restart
/// resets every bot back to closed.
#[derive(Debug, Clone)]
pub struct CircuitBreakerState {
    pub bot_name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub opened_at: Option<DateTime<Utc>>,
}

impl CircuitBreakerState {
    pub fn new(bot_name: impl Into<String>) -> Self {
        Self { bot_name: bot_name.into(), state: CircuitState::Closed, failure_count: 0, opened_at: None }
    }
}

/// Threshold/timeout-driven breaker. `threshold` consecutive failures trip it
/// open; after `timeout` it allows one half-open probe; a success there
/// closes it, a failure reopens it and restarts the timeout.
pub struct CircuitBreaker {
    threshold: u32,
    timeout: Duration,
    state: CircuitBreakerState,
}

impl CircuitBreaker {
    pub fn new(bot_name: impl Into<String>, threshold: u32, timeout_s: u64) -> Self {
        Self { threshold, timeout: Duration::seconds(timeout_s as i64), state: CircuitBreakerState::new(bot_name) }
    }

    pub fn state(&self) -> &CircuitBreakerState {
        &self.state
    }

    /// Whether the current tick should be skipped without running any checks.
    /// Transitions OPEN -> HALF_OPEN as a side effect once the timeout elapses.
    pub fn should_skip(&mut self, now: DateTime<Utc>) -> bool {
        match self.state.state {
            CircuitState::Closed => false,
            CircuitState::HalfOpen => false,
            CircuitState::Open => {
                let opened_at = self.state.opened_at.unwrap_or(now);
                if now - opened_at >= self.timeout {
                    self.state.state = CircuitState::HalfOpen;
                    false
                } else {
                    true
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        self.state.failure_count = 0;
        self.state.state = CircuitState::Closed;
        self.state.opened_at = None;
    }

    pub fn record_failure(&mut self, now: DateTime<Utc>) {
        match self.state.state {
            CircuitState::HalfOpen => {
                self.state.state = CircuitState::Open;
                self.state.opened_at = Some(now);
            }
            CircuitState::Closed => {
                self.state.failure_count += 1;
                if self.state.failure_count >= self.threshold {
                    self.state.state = CircuitState::Open;
                    self.state.opened_at = Some(now);
                }
            }
            CircuitState::Open => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trips_open_after_threshold_failures() {
        let mut breaker = CircuitBreaker::new("researcher", 3, 600);
        let now = Utc::now();
        breaker.record_failure(now);
        breaker.record_failure(now);
        assert_eq!(breaker.state().state, CircuitState::Closed);
        breaker.record_failure(now);
        assert_eq!(breaker.state().state, CircuitState::Open);
        assert!(breaker.should_skip(now));
    }

    #[test]
    fn half_opens_after_timeout_then_closes_on_success() {
        let mut breaker = CircuitBreaker::new("researcher", 1, 600);
        let now = Utc::now();
        breaker.record_failure(now);
        assert_eq!(breaker.state().state, CircuitState::Open);

        assert!(breaker.should_skip(now + Duration::seconds(100)));

        let later = now + Duration::seconds(601);
        assert!(!breaker.should_skip(later));
        assert_eq!(breaker.state().state, CircuitState::HalfOpen);

        breaker.record_success();
        assert_eq!(breaker.state().state, CircuitState::Closed);
        assert_eq!(breaker.state().failure_count, 0);
    }

    #[test]
    fn half_open_failure_reopens_and_resets_timeout() {
        let mut breaker = CircuitBreaker::new("researcher", 1, 600);
        let now = Utc::now();
        breaker.record_failure(now);
        let probe_time = now + Duration::seconds(601);
        assert!(!breaker.should_skip(probe_time));
        breaker.record_failure(probe_time);
        assert_eq!(breaker.state().state, CircuitState::Open);
        assert!(breaker.should_skip(probe_time + Duration::seconds(1)));
    }
}
