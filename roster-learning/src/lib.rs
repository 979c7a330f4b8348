pub mod applicability;
pub mod db;
pub mod error;
pub mod exchange;
pub mod types;

pub use applicability::applicable_bots;
pub use error::{LearningExchangeError, Result};
pub use exchange::{DistributionOutcome, LearningExchange, DEFAULT_SHAREABLE_CATEGORIES};
pub use types::{LearningPackage, NewPackage, PackageScope, PackageStatus};
