use std::sync::Arc;

use roster_core::ChannelKey;
use roster_core::RosterConfig;
use roster_sessions::Compactor;

use crate::error::{CliError, Result};
use crate::local_provider::ConcatSummarizer;
use crate::paths::Paths;
use crate::stores;

pub async fn compact(config: &RosterConfig, paths: &Paths, channel: String, chat_id: String) -> Result<()> {
    let sessions = stores::open_sessions(paths)?;
    let key = ChannelKey::new(channel, chat_id);
    sessions.get(&key)?.ok_or_else(|| CliError::Usage(format!("no session for {key}")))?;

    let compactor = Compactor::new(Arc::new(ConcatSummarizer));
    let report = compactor.compact(&sessions, &key, &config.session_compaction).await?;
    if report.ran {
        println!("compacted, dropped {} messages", report.messages_dropped);
    } else {
        println!("nothing to compact");
    }
    Ok(())
}

pub fn status(paths: &Paths, channel: String, chat_id: String) -> Result<()> {
    let sessions = stores::open_sessions(paths)?;
    let key = ChannelKey::new(channel, chat_id);
    let session = sessions.get(&key)?.ok_or_else(|| CliError::Usage(format!("no session for {key}")))?;
    println!(
        "messages: {}  tokens: {}  last_model: {}  updated_at: {}",
        session.message_count,
        session.total_tokens,
        session.last_model.as_deref().unwrap_or("-"),
        session.updated_at
    );
    Ok(())
}

pub fn reset(paths: &Paths, channel: String, chat_id: String) -> Result<()> {
    let sessions = stores::open_sessions(paths)?;
    let key = ChannelKey::new(channel, chat_id);
    sessions.reset(&key)?;
    println!("reset session {key}");
    Ok(())
}
