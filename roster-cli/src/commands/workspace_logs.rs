use crate::error::Result;
use crate::paths::Paths;
use crate::stores;

pub fn run(paths: &Paths, room: Option<String>, limit: usize) -> Result<()> {
    let worklog = stores::open_worklog(paths)?;
    let logs = worklog.get_all_logs(limit, room.as_deref())?;
    if logs.is_empty() {
        println!("no sessions logged yet");
        return Ok(());
    }
    for log in logs {
        println!(
            "{}  {}  query: {}  ended: {}",
            log.id,
            log.started_at,
            log.query,
            log.ended_at.as_deref().unwrap_or("(in progress)")
        );
    }
    Ok(())
}
