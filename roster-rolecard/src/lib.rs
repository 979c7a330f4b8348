pub mod enforcer;
pub mod error;
pub mod registry;
pub mod types;

pub use enforcer::{Enforcer, DEFAULT_MIN_CONFIDENCE};
pub use error::{Result, RoleCardError};
pub use registry::RoleCardRegistry;
pub use types::{EscalationTrigger, HardBan, ProposedChange, RoleCard, RoleCardOverride};
