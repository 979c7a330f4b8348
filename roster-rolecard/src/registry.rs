use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;
use crate::types::{RoleCard, RoleCardOverride};

/// Loads and saves RoleCards through the three-tier override chain:
/// workspace override → user-global override → compiled-in default
/// (§4.5, §6 file layout).
pub struct RoleCardRegistry {
    workspace_dir: PathBuf,
    user_global_dir: PathBuf,
    defaults: HashMap<String, RoleCard>,
}

impl RoleCardRegistry {
    pub fn new(workspace_dir: impl Into<PathBuf>, user_global_dir: impl Into<PathBuf>) -> Self {
        Self {
            workspace_dir: workspace_dir.into(),
            user_global_dir: user_global_dir.into(),
            defaults: built_in_defaults(),
        }
    }

    /// Resolve a bot's effective RoleCard by merging all three tiers.
    pub fn load(&self, bot_name: &str) -> Result<RoleCard> {
        let mut card = self
            .defaults
            .get(bot_name)
            .cloned()
            .unwrap_or_else(|| RoleCard::empty(bot_name));

        if let Some(global_override) = read_override(&self.user_global_dir, bot_name)? {
            card = global_override.apply_over(card);
        }
        if let Some(workspace_override) = read_override(&self.workspace_dir, bot_name)? {
            card = workspace_override.apply_over(card);
        }
        Ok(card)
    }

    /// Persist `card` as the workspace override for `bot_name`. Saving a card
    /// that was just loaded unchanged is a no-op on disk content (§8
    /// round-trip property): the override file always carries the full
    /// resolved card, so re-loading yields byte-identical YAML.
    pub fn save_workspace_override(&self, card: &RoleCard) -> Result<()> {
        write_override(&self.workspace_dir, &card.bot_name, &RoleCardOverride::from_card(card))
    }

    pub fn user_global_path(&self, bot_name: &str) -> PathBuf {
        override_path(&self.user_global_dir, bot_name)
    }

    pub fn workspace_path(&self, bot_name: &str) -> PathBuf {
        override_path(&self.workspace_dir, bot_name)
    }
}

fn override_path(dir: &Path, bot_name: &str) -> PathBuf {
    dir.join(format!("{bot_name}.yaml"))
}

fn read_override(dir: &Path, bot_name: &str) -> Result<Option<RoleCardOverride>> {
    let path = override_path(dir, bot_name);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path)?;
    let parsed: RoleCardOverride = serde_yaml::from_str(&contents)?;
    debug!(bot = bot_name, path = %path.display(), "loaded role card override");
    Ok(Some(parsed))
}

fn write_override(dir: &Path, bot_name: &str, overlay: &RoleCardOverride) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let path = override_path(dir, bot_name);
    let yaml = serde_yaml::to_string(overlay)?;
    std::fs::write(path, yaml)?;
    Ok(())
}

/// Compiled-in defaults. Deliberately minimal — real bots ship their own
/// workspace overrides; this floor exists so `load` never errors.
fn built_in_defaults() -> HashMap<String, RoleCard> {
    let mut map = HashMap::new();
    map.insert(
        "leader".to_string(),
        RoleCard {
            bot_name: "leader".to_string(),
            domain: "coordination and delegation".to_string(),
            inputs: vec!["user message".to_string()],
            outputs: vec!["delegated task".to_string(), "final response".to_string()],
            definition_of_done: vec!["user request is answered or delegated".to_string()],
            hard_bans: Vec::new(),
            escalation_triggers: Vec::new(),
            metrics: vec!["handoff_latency_ms".to_string()],
        },
    );
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_falls_back_to_builtin_default() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = RoleCardRegistry::new(tmp.path().join("workspace"), tmp.path().join("global"));
        let card = registry.load("leader").unwrap();
        assert_eq!(card.domain, "coordination and delegation");
    }

    #[test]
    fn workspace_override_wins_over_user_global_and_default() {
        let tmp = tempfile::tempdir().unwrap();
        let workspace_dir = tmp.path().join("workspace");
        let global_dir = tmp.path().join("global");
        std::fs::create_dir_all(&global_dir).unwrap();
        std::fs::write(global_dir.join("leader.yaml"), "domain: global-domain\n").unwrap();
        std::fs::create_dir_all(&workspace_dir).unwrap();
        std::fs::write(workspace_dir.join("leader.yaml"), "domain: workspace-domain\n").unwrap();

        let registry = RoleCardRegistry::new(workspace_dir, global_dir);
        let card = registry.load("leader").unwrap();
        assert_eq!(card.domain, "workspace-domain");
    }

    #[test]
    fn save_then_load_round_trips_with_no_diff() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = RoleCardRegistry::new(tmp.path().join("workspace"), tmp.path().join("global"));
        let card = registry.load("researcher").unwrap();
        registry.save_workspace_override(&card).unwrap();
        let reloaded = registry.load("researcher").unwrap();
        assert_eq!(card, reloaded);
    }
}
