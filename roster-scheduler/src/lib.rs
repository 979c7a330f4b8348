pub mod check;
pub mod circuit_breaker;
pub mod cron_jobs;
pub mod error;
pub mod heartbeat;
pub mod multi;
pub mod registry;
pub mod schedule;

pub use check::{CheckDefinition, CheckHandler, CheckOutcome, CheckResult, CheckStatus};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerState, CircuitState};
pub use cron_jobs::{CronEngine, CronHandle, Job, JobStatus};
pub use error::{Result, SchedulerError};
pub use heartbeat::{HeartbeatService, HeartbeatTick, TickStatus, TriggerType};
pub use multi::{CoordinationWorkSource, MultiHeartbeatManager};
pub use registry::{CheckRegistry, CheckSnapshot};
pub use schedule::{compute_next_run, Schedule};
