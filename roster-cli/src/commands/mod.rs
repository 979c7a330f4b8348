pub mod agent;
pub mod cron;
pub mod explain;
pub mod how;
pub mod memory;
pub mod room;
pub mod session;
pub mod workspace_logs;
