use crate::error::Result;
use crate::paths::Paths;
use crate::stores;

pub fn run(paths: &Paths, query: String, room: Option<String>) -> Result<()> {
    let worklog = stores::open_worklog(paths)?;
    let hits = worklog.search(&query, room.as_deref(), None)?;
    if hits.is_empty() {
        println!("no matches for {query:?}");
        return Ok(());
    }
    for entry in hits {
        println!("[{}] {} ({}): {}", entry.step_no, entry.category, entry.bot_name, entry.message);
    }
    Ok(())
}
