use roster_scheduler::Schedule;
use tracing::warn;

use crate::error::Result;
use crate::paths::Paths;
use crate::stores;

pub fn add(paths: &Paths, name: String, expression: String, tz: Option<String>, message: String) -> Result<()> {
    if let Some(tz) = tz.as_deref() {
        if !tz.eq_ignore_ascii_case("utc") {
            warn!(tz, "cron scheduling runs in UTC; the requested timezone is not applied");
        }
    }
    let cron = stores::open_cron(paths)?;
    let job = cron.add_job(&name, Schedule::Cron { expression }, &message)?;
    println!("created job {} ({})", job.id, job.name);
    Ok(())
}

pub fn list(paths: &Paths) -> Result<()> {
    let cron = stores::open_cron(paths)?;
    let jobs = cron.list_jobs()?;
    if jobs.is_empty() {
        println!("no scheduled jobs");
        return Ok(());
    }
    for job in jobs {
        println!(
            "{}  {}  status={}  next_run={}  runs={}",
            job.id,
            job.name,
            job.status,
            job.next_run.as_deref().unwrap_or("-"),
            job.run_count
        );
    }
    Ok(())
}

pub fn remove(paths: &Paths, id: String) -> Result<()> {
    let cron = stores::open_cron(paths)?;
    cron.remove_job(&id)?;
    println!("removed job {id}");
    Ok(())
}
