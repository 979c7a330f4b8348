use std::collections::HashMap;
use std::sync::Arc;

use roster_agent::{AgentLoop, Tier};
use roster_core::RosterConfig;
use roster_rolecard::{Enforcer, RoleCardRegistry};
use roster_sessions::Compactor;
use roster_worklog::WorkLog;

use crate::error::Result;
use crate::local_provider::{ApproxTokenCounter, ConcatSummarizer, LocalEchoProvider, LocalHashEmbedder};
use crate::paths::Paths;
use crate::stores;

const DEFAULT_BOT: &str = "leader";

fn build_agent_loop(config: &RosterConfig, paths: &Paths) -> Result<AgentLoop> {
    paths.ensure_data_dir()?;

    let sessions = stores::open_sessions(paths)?;
    let memory = stores::open_memory(paths)?;
    let worklog = stores::open_worklog(paths)?;
    let tool_outputs = stores::open_tool_outputs(paths)?;

    let workspace_root = std::path::Path::new(&config.workspace);
    let registry = RoleCardRegistry::new(
        paths.workspace_role_cards_dir(workspace_root),
        paths.user_global_role_cards_dir(),
    );
    let enforcer = Arc::new(Enforcer::new(registry, paths.role_card_drafts_dir()));

    let mut providers: HashMap<Tier, Arc<dyn roster_agent::ModelProvider>> = HashMap::new();
    for tier in [Tier::Simple, Tier::Medium, Tier::Coding, Tier::Complex, Tier::Reasoning] {
        providers.insert(tier, Arc::new(LocalEchoProvider::new(format!("{tier:?}").to_lowercase())));
    }

    let compactor = Arc::new(Compactor::new(Arc::new(ConcatSummarizer)));

    Ok(AgentLoop {
        bot_name: DEFAULT_BOT.to_string(),
        sessions,
        memory,
        worklog,
        tool_outputs,
        enforcer,
        embedder: Arc::new(LocalHashEmbedder::new(stores::EMBEDDING_DIM)),
        counter: Arc::new(ApproxTokenCounter),
        providers,
        tools: Vec::new(),
        compactor,
        agent_config: config.agent.clone(),
        context_config: config.enhanced_context.clone(),
        compaction_config: config.session_compaction.clone(),
        tool_output_config: config.tool_output.clone(),
        base_system_prompt: format!("You are the {DEFAULT_BOT} bot: general-purpose coordination and delegation."),
    })
}

pub async fn run(
    config: &RosterConfig,
    paths: &Paths,
    room: Option<String>,
    message: String,
    session: Option<String>,
    no_markdown: bool,
    show_logs: bool,
) -> Result<()> {
    let agent_loop = build_agent_loop(config, paths)?;
    let chat_id = session.or(room).unwrap_or_else(|| "default".to_string());

    let outcome = agent_loop.handle_turn("cli", &chat_id, "user", &message).await?;
    let reply = if no_markdown { strip_markdown(&outcome.reply) } else { outcome.reply };

    println!("{reply}");
    println!("(tier: {:?}, tokens: {}, escalated: {})", outcome.tier, outcome.tokens_used, outcome.escalated);

    if show_logs {
        print_last_session_log(&agent_loop.worklog)?;
    }
    Ok(())
}

/// Drops the handful of inline markers a bot reply might carry, for
/// terminals that don't render markdown (`--no-markdown`).
fn strip_markdown(text: &str) -> String {
    text.replace("**", "").replace('`', "").replace("__", "")
}

fn print_last_session_log(worklog: &WorkLog) -> Result<()> {
    let recent = worklog.get_all_logs(1, None)?;
    let Some(session_log) = recent.into_iter().next() else {
        return Ok(());
    };
    let (_, entries) = worklog.get_log(&session_log.id)?;
    for entry in entries {
        println!("[{}] {} {}: {}", entry.step_no, entry.level, entry.category, entry.message);
    }
    Ok(())
}
