//! Resolves the `~/.<app>/` store file layout (§6) against a loaded config.

use std::path::{Path, PathBuf};

use roster_core::RosterConfig;

pub struct Paths {
    data_dir: PathBuf,
}

impl Paths {
    pub fn new(config: &RosterConfig) -> Self {
        Self { data_dir: PathBuf::from(&config.database.data_dir) }
    }

    pub fn ensure_data_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }

    pub fn memory_db(&self) -> PathBuf {
        self.data_dir.join("memory.db")
    }

    pub fn work_logs_db(&self) -> PathBuf {
        self.data_dir.join("work_logs.db")
    }

    pub fn learning_exchange_db(&self) -> PathBuf {
        self.data_dir.join("learning_exchange.db")
    }

    pub fn sessions_db(&self) -> PathBuf {
        self.data_dir.join("sessions.db")
    }

    pub fn tool_outputs_db(&self) -> PathBuf {
        self.data_dir.join("tool_outputs.db")
    }

    pub fn cron_db(&self) -> PathBuf {
        self.data_dir.join("cron.db")
    }

    pub fn role_card_drafts_dir(&self) -> PathBuf {
        self.data_dir.join("role_card_drafts")
    }

    /// `.<app>/role_cards/` in the current workspace directory.
    pub fn workspace_role_cards_dir(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(".roster").join("role_cards")
    }

    /// `~/.config/<app>/role_cards/`.
    pub fn user_global_role_cards_dir(&self) -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".config").join("roster").join("role_cards")
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
