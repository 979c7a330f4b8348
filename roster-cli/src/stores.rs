//! Opens each persistent store against the `Paths` layout, running schema
//! init where the crate's constructor doesn't already do it for us.

use std::sync::Arc;

use rusqlite::Connection;

use roster_memory::MemoryStore;
use roster_scheduler::CronHandle;
use roster_sessions::SessionManager;
use roster_worklog::{ToolOutputStore, WorkLog};

use crate::error::Result;
use crate::paths::Paths;

pub const EMBEDDING_DIM: usize = 32;

pub fn open_sessions(paths: &Paths) -> Result<Arc<SessionManager>> {
    paths.ensure_data_dir()?;
    let conn = Connection::open(paths.sessions_db())?;
    roster_sessions::db::init_db(&conn)?;
    Ok(Arc::new(SessionManager::new(conn)))
}

pub fn open_worklog(paths: &Paths) -> Result<Arc<WorkLog>> {
    paths.ensure_data_dir()?;
    let conn = Connection::open(paths.work_logs_db())?;
    roster_worklog::db::init_worklog_db(&conn)?;
    Ok(Arc::new(WorkLog::new(conn)))
}

pub fn open_memory(paths: &Paths) -> Result<Arc<MemoryStore>> {
    paths.ensure_data_dir()?;
    Ok(Arc::new(MemoryStore::open(&paths.memory_db(), EMBEDDING_DIM)?))
}

pub fn open_cron(paths: &Paths) -> Result<CronHandle> {
    paths.ensure_data_dir()?;
    let conn = Connection::open(paths.cron_db())?;
    Ok(CronHandle::new(conn)?)
}

pub fn open_tool_outputs(paths: &Paths) -> Result<Arc<ToolOutputStore>> {
    paths.ensure_data_dir()?;
    let conn = Connection::open(paths.tool_outputs_db())?;
    roster_worklog::db::init_tool_outputs_db(&conn)?;
    Ok(Arc::new(ToolOutputStore::new(conn)))
}
