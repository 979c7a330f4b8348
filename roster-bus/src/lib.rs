pub mod bus;
pub mod error;
pub mod queue;
pub mod types;

pub use bus::{MessageBus, DEFAULT_QUEUE_CAPACITY};
pub use error::BusError;
pub use types::{AttachmentRef, Envelope, EnvelopeKind};
