//! `clap`-derive CLI surface (§6): `agent`, `explain`, `how`, `workspace-logs`,
//! `session`, `memory`, `room`, `cron`.

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(name = "roster", version, about = "Multi-agent bot orchestrator core")]
pub struct Cli {
    /// Path to the TOML config file. Falls back to `ROSTER_CONFIG_PATH`, then `~/.roster/roster.toml`.
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Send one message through a bot's AgentLoop and print the reply.
    Agent {
        #[arg(long)]
        room: Option<String>,
        #[arg(short = 'm', long = "message")]
        message: String,
        #[arg(short = 's', long = "session")]
        session: Option<String>,
        #[arg(long = "markdown", overrides_with = "no_markdown")]
        markdown: bool,
        #[arg(long = "no-markdown", overrides_with = "markdown")]
        no_markdown: bool,
        /// Also print the WorkLog entries captured during the turn.
        #[arg(long)]
        logs: bool,
    },

    /// Render a WorkLog session's reasoning trail.
    Explain {
        #[arg(long)]
        room: Option<String>,
        #[arg(long)]
        session: Option<String>,
        #[arg(long, value_enum, default_value_t = ExplainMode::Summary)]
        mode: ExplainMode,
        #[arg(long)]
        bot: Option<String>,
    },

    /// Full-text search over WorkLog entries.
    How {
        query: String,
        #[arg(long)]
        room: Option<String>,
    },

    /// List recent WorkLog sessions, optionally scoped to a room.
    WorkspaceLogs {
        #[arg(long)]
        room: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },

    /// Session history maintenance.
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },

    /// Knowledge-graph inspection and maintenance.
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },

    /// Room (Workspace) management.
    Room {
        #[command(subcommand)]
        action: RoomAction,
    },

    /// Scheduled message jobs.
    Cron {
        #[command(subcommand)]
        action: CronAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum SessionAction {
    /// Run compaction now, regardless of the configured threshold.
    Compact {
        #[arg(long)]
        channel: String,
        #[arg(long)]
        chat_id: String,
    },
    /// Print message/token counts for a session.
    Status {
        #[arg(long)]
        channel: String,
        #[arg(long)]
        chat_id: String,
    },
    /// Drop a session's message history (keeps the session row).
    Reset {
        #[arg(long)]
        channel: String,
        #[arg(long)]
        chat_id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum MemoryAction {
    /// Create `memory.db` and its tables if they don't exist yet.
    Init,
    /// Row counts and an integrity check.
    Status,
    /// Search for entities similar to a text query.
    Search {
        query: String,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
    },
    /// List the most recently seen entities.
    Entities {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show one entity and the facts referencing it.
    Entity { name: String },
    /// Delete an entity and its edges.
    Forget { name: String },
    /// Health check: table counts plus `PRAGMA integrity_check`.
    Doctor,
}

#[derive(Debug, Subcommand)]
pub enum RoomAction {
    /// Create a new Room.
    Create {
        id: String,
        #[arg(long, value_delimiter = ',')]
        bots: Vec<String>,
        #[arg(long = "type", value_enum, default_value_t = RoomKindArg::Open)]
        kind: RoomKindArg,
    },
}

#[derive(Debug, Subcommand)]
pub enum CronAction {
    /// Schedule a recurring message.
    Add {
        #[arg(long)]
        name: String,
        #[arg(long = "cron")]
        expression: String,
        #[arg(long)]
        tz: Option<String>,
        #[arg(long)]
        message: String,
    },
    /// List scheduled jobs.
    List,
    /// Remove a scheduled job by id.
    Remove { id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum ExplainMode {
    Summary,
    Detailed,
    Debug,
    Coordination,
    Conversations,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum RoomKindArg {
    Open,
    Project,
    Direct,
    Coordination,
}

impl From<RoomKindArg> for roster_core::RoomKind {
    fn from(value: RoomKindArg) -> Self {
        match value {
            RoomKindArg::Open => roster_core::RoomKind::Open,
            RoomKindArg::Project => roster_core::RoomKind::Project,
            RoomKindArg::Direct => roster_core::RoomKind::Direct,
            RoomKindArg::Coordination => roster_core::RoomKind::Coordination,
        }
    }
}
