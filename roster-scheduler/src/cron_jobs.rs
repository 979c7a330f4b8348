use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{params, Connection};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{Result, SchedulerError};
use crate::schedule::{compute_next_run, Schedule};

/// Lifecycle state of a cron job execution slot.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Completed,
    Missed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Missed => "missed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "missed" => Ok(Self::Missed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// A persisted cron job record (CLI `cron add`, §6 CLI surface).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub schedule: Schedule,
    pub message: String,
    pub status: JobStatus,
    pub last_run: Option<String>,
    pub next_run: Option<String>,
    pub run_count: u32,
    pub created_at: String,
    pub updated_at: String,
}

fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         CREATE TABLE IF NOT EXISTS cron_jobs (
            id         TEXT NOT NULL PRIMARY KEY,
            name       TEXT NOT NULL,
            schedule   TEXT NOT NULL,
            message    TEXT NOT NULL,
            status     TEXT NOT NULL DEFAULT 'pending',
            last_run   TEXT,
            next_run   TEXT,
            run_count  INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS idx_cron_jobs_next_run ON cron_jobs(next_run);",
    )?;
    Ok(())
}

/// Handle for adding/listing/removing cron jobs independent of the running
/// engine loop, for use by the `cron` CLI subcommand.
pub struct CronHandle {
    conn: Arc<Mutex<Connection>>,
}

impl CronHandle {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }

    pub fn add_job(&self, name: &str, schedule: Schedule, message: &str) -> Result<Job> {
        let conn = self.conn.lock().unwrap();
        add_job_on(&conn, name, schedule, message)
    }

    pub fn list_jobs(&self) -> Result<Vec<Job>> {
        let conn = self.conn.lock().unwrap();
        list_jobs_on(&conn)
    }

    pub fn remove_job(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let n = conn.execute("DELETE FROM cron_jobs WHERE id = ?1", params![id])?;
        if n == 0 {
            return Err(SchedulerError::JobNotFound { id: id.to_string() });
        }
        Ok(())
    }
}

fn add_job_on(conn: &Connection, name: &str, schedule: Schedule, message: &str) -> Result<Job> {
    let now = Utc::now();
    let now_str = now.to_rfc3339();
    let next = compute_next_run(&schedule, now).map(|dt| dt.to_rfc3339());
    let id = Uuid::now_v7().to_string();
    let schedule_json = serde_json::to_string(&schedule).map_err(|e| SchedulerError::InvalidSchedule(e.to_string()))?;

    conn.execute(
        "INSERT INTO cron_jobs (id, name, schedule, message, status, last_run, next_run, run_count, created_at, updated_at)
         VALUES (?1,?2,?3,?4,'pending',NULL,?5,0,?6,?6)",
        params![id, name, schedule_json, message, next, now_str],
    )?;
    info!(job_id = %id, name, "cron job added");
    Ok(Job {
        id,
        name: name.to_string(),
        schedule,
        message: message.to_string(),
        status: JobStatus::Pending,
        last_run: None,
        next_run: next,
        run_count: 0,
        created_at: now_str.clone(),
        updated_at: now_str,
    })
}

fn list_jobs_on(conn: &Connection) -> Result<Vec<Job>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, schedule, message, status, last_run, next_run, run_count, created_at, updated_at
         FROM cron_jobs ORDER BY created_at",
    )?;
    let rows = stmt.query_map([], row_to_job)?;
    Ok(rows.filter_map(|r| r.ok()).collect())
}

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
    let sched_json: String = row.get(2)?;
    let status_str: String = row.get(4)?;
    Ok(Job {
        id: row.get(0)?,
        name: row.get(1)?,
        schedule: serde_json::from_str(&sched_json).unwrap_or(Schedule::Interval { every_secs: 3600 }),
        message: row.get(3)?,
        status: status_str.parse().unwrap_or(JobStatus::Pending),
        last_run: row.get(5)?,
        next_run: row.get(6)?,
        run_count: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Polls `cron_jobs` every second and fires due jobs onto `fired_tx`.
pub struct CronEngine {
    conn: Connection,
    fired_tx: Option<mpsc::Sender<Job>>,
}

impl CronEngine {
    pub fn new(conn: Connection, fired_tx: Option<mpsc::Sender<Job>>) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self { conn, fired_tx })
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("cron engine started");
        self.mark_missed_on_startup();
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(1));
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.tick() {
                        error!("cron engine tick error: {e}");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("cron engine shutting down");
                        break;
                    }
                }
            }
        }
    }

    fn mark_missed_on_startup(&mut self) {
        let now = Utc::now().to_rfc3339();
        match self.conn.execute(
            "UPDATE cron_jobs SET status = 'missed', updated_at = ?1
             WHERE status = 'pending' AND next_run IS NOT NULL AND next_run < ?1",
            [&now],
        ) {
            Ok(n) if n > 0 => warn!(count = n, "cron jobs marked missed on startup"),
            Err(e) => error!("missed-on-startup query failed: {e}"),
            _ => {}
        }
    }

    fn tick(&mut self) -> Result<()> {
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        let due: Vec<(String, String, String, String, u32)> = {
            let mut stmt = self.conn.prepare_cached(
                "SELECT id, name, schedule, message, run_count FROM cron_jobs
                 WHERE status = 'pending' AND next_run IS NOT NULL AND next_run <= ?1",
            )?;
            stmt.query_map([&now_str], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })?
            .filter_map(|r| r.ok())
            .collect()
        };

        for (id, name, sched_json, message, run_count) in due {
            let schedule: Schedule = match serde_json::from_str(&sched_json) {
                Ok(s) => s,
                Err(e) => {
                    error!(job_id = %id, "bad schedule json: {e}");
                    continue;
                }
            };
            let new_count = run_count + 1;
            let next = compute_next_run(&schedule, now).map(|dt| dt.to_rfc3339());
            let new_status = if next.is_none() { "completed" } else { "pending" };

            self.conn.execute(
                "UPDATE cron_jobs SET status=?1, last_run=?2, next_run=?3, run_count=?4, updated_at=?2 WHERE id=?5",
                params![new_status, now_str, next, new_count, id],
            )?;

            if let Some(ref tx) = self.fired_tx {
                let job = Job {
                    id: id.clone(),
                    name,
                    schedule,
                    message,
                    status: JobStatus::Pending,
                    last_run: Some(now_str.clone()),
                    next_run: next,
                    run_count: new_count,
                    created_at: String::new(),
                    updated_at: now_str.clone(),
                };
                if tx.try_send(job).is_err() {
                    warn!(job_id = %id, "cron delivery channel full or closed — job dropped");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_list_round_trips() {
        let conn = Connection::open_in_memory().unwrap();
        let handle = CronHandle::new(conn).unwrap();
        handle.add_job("daily-standup", Schedule::Interval { every_secs: 3600 }, "stand up time").unwrap();
        let jobs = handle.list_jobs().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].name, "daily-standup");
    }

    #[test]
    fn remove_missing_job_errors() {
        let conn = Connection::open_in_memory().unwrap();
        let handle = CronHandle::new(conn).unwrap();
        assert!(handle.remove_job("nope").is_err());
    }
}
