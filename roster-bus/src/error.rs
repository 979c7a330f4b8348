use thiserror::Error;

/// Errors surfaced by the [`crate::MessageBus`].
#[derive(Debug, Error)]
pub enum BusError {
    /// An internal (never-blocking) producer hit a full queue and shed the envelope.
    #[error("queue '{queue}' full for partition '{partition}', envelope dropped")]
    QueueFull { queue: String, partition: String },

    /// `next()` was cancelled before an envelope became available.
    #[error("bus consumer cancelled")]
    Cancelled,
}
