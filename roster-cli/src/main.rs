mod cli;
mod commands;
mod error;
mod local_provider;
mod paths;
mod stores;

use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command, CronAction, MemoryAction, RoomAction, SessionAction};
use error::CliError;
use paths::Paths;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "roster_cli=info".into()))
        .init();

    let cli = Cli::parse();
    let config = roster_core::RosterConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "failed to load config, using defaults");
        roster_core::RosterConfig::default()
    });
    let paths = Paths::new(&config);

    let code = match run(cli.command, &config, &paths).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {e}");
            e.exit_code()
        }
    };
    std::process::exit(code);
}

async fn run(command: Command, config: &roster_core::RosterConfig, paths: &Paths) -> Result<(), CliError> {
    match command {
        Command::Agent { room, message, session, markdown: _, no_markdown, logs } => {
            commands::agent::run(config, paths, room, message, session, no_markdown, logs).await
        }

        Command::Explain { room, session, mode, bot } => commands::explain::run(paths, room, session, mode, bot),

        Command::How { query, room } => commands::how::run(paths, query, room),

        Command::WorkspaceLogs { room, limit } => commands::workspace_logs::run(paths, room, limit),

        Command::Session { action } => match action {
            SessionAction::Compact { channel, chat_id } => commands::session::compact(config, paths, channel, chat_id).await,
            SessionAction::Status { channel, chat_id } => commands::session::status(paths, channel, chat_id),
            SessionAction::Reset { channel, chat_id } => commands::session::reset(paths, channel, chat_id),
        },

        Command::Memory { action } => match action {
            MemoryAction::Init => commands::memory::init(paths),
            MemoryAction::Status => commands::memory::status(paths),
            MemoryAction::Search { query, top_k } => commands::memory::search(paths, query, top_k).await,
            MemoryAction::Entities { limit } => commands::memory::entities(paths, limit),
            MemoryAction::Entity { name } => commands::memory::entity(paths, name),
            MemoryAction::Forget { name } => commands::memory::forget(paths, name),
            MemoryAction::Doctor => commands::memory::doctor(paths),
        },

        Command::Room { action } => match action {
            RoomAction::Create { id, bots, kind } => commands::room::create(paths, id, bots, kind),
        },

        Command::Cron { action } => match action {
            CronAction::Add { name, expression, tz, message } => commands::cron::add(paths, name, expression, tz, message),
            CronAction::List => commands::cron::list(paths),
            CronAction::Remove { id } => commands::cron::remove(paths, id),
        },
    }
}
