pub mod config;
pub mod error;
pub mod rooms;
pub mod types;

pub use config::RosterConfig;
pub use error::{Result, RosterError};
pub use rooms::RoomRegistry;
pub use types::{BotId, ChannelKey, EscalationThreshold, Room, RoomId, RoomKind};
