use roster_worklog::{LogEntry, SessionLog};

use crate::cli::ExplainMode;
use crate::error::{CliError, Result};
use crate::paths::Paths;
use crate::stores;

pub fn run(paths: &Paths, room: Option<String>, session: Option<String>, mode: ExplainMode, bot: Option<String>) -> Result<()> {
    let worklog = stores::open_worklog(paths)?;

    let (log, entries) = match session {
        Some(id) => worklog.get_log(&id)?,
        None => {
            let candidates = worklog.get_all_logs(1, room.as_deref())?;
            let log = candidates
                .into_iter()
                .next()
                .ok_or_else(|| CliError::Usage("no sessions logged yet".to_string()))?;
            worklog.get_log(&log.id)?
        }
    };

    let entries: Vec<LogEntry> = match bot {
        Some(name) => entries.into_iter().filter(|e| e.bot_name == name).collect(),
        None => entries,
    };

    match mode {
        ExplainMode::Summary => print_summary(&log),
        ExplainMode::Detailed => print_detailed(&entries),
        ExplainMode::Debug => print_debug(&log, &entries),
        ExplainMode::Coordination => print_filtered(&entries, |e| e.coordinator_mode || e.escalation || e.category == "handoff"),
        ExplainMode::Conversations => print_filtered(&entries, |e| e.category == "message" || e.category == "decision"),
    }
    Ok(())
}

fn print_summary(log: &SessionLog) {
    println!("query: {}", log.query);
    println!("participants: {:?}", log.participants);
    println!("final_output: {}", log.final_output.as_deref().unwrap_or("(none)"));
}

fn print_detailed(entries: &[LogEntry]) {
    for entry in entries {
        println!("[{}] {} {} ({}): {}", entry.step_no, entry.level, entry.category, entry.bot_name, entry.message);
    }
}

fn print_debug(log: &SessionLog, entries: &[LogEntry]) {
    println!("session_key: {}  room: {:?}  coordinator: {}", log.session_key, log.room_id, log.coordinator);
    for entry in entries {
        println!(
            "[{}] {} {} ({}) triggered_by={:?} confidence={:?} duration_ms={:?}: {}",
            entry.step_no, entry.level, entry.category, entry.bot_name, entry.triggered_by, entry.confidence, entry.duration_ms, entry.message
        );
    }
}

fn print_filtered(entries: &[LogEntry], predicate: impl Fn(&LogEntry) -> bool) {
    let matches: Vec<&LogEntry> = entries.iter().filter(|e| predicate(e)).collect();
    if matches.is_empty() {
        println!("no matching entries");
        return;
    }
    for entry in matches {
        println!("[{}] {} ({}): {}", entry.step_no, entry.category, entry.bot_name, entry.message);
    }
}
