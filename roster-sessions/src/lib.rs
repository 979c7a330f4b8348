pub mod compactor;
pub mod db;
pub mod error;
pub mod manager;
pub mod types;

pub use compactor::{CompactionReport, Compactor, Summarizer};
pub use error::SessionError;
pub use manager::{NewMessage, SessionManager};
pub use types::{Message, MessageRole, Session};
