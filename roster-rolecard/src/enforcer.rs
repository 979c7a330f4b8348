use std::path::PathBuf;

use tracing::warn;

use crate::error::Result;
use crate::registry::RoleCardRegistry;
use crate::types::{ProposedChange, RoleCardOverride};

/// Escalate whenever a model's stated confidence falls below this, absent
/// any matching escalation trigger (§4.5 `should_escalate` default).
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.5;

/// Validates actions and escalation decisions against a bot's RoleCard
/// (§4.5). Deterministic and side-effect-free except for `propose_change`,
/// which persists a draft for later human review.
pub struct Enforcer {
    registry: RoleCardRegistry,
    drafts_dir: PathBuf,
}

impl Enforcer {
    pub fn new(registry: RoleCardRegistry, drafts_dir: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            drafts_dir: drafts_dir.into(),
        }
    }

    /// Keyword/substring match of `action_description` against the bot's
    /// hard bans. Returns the violated rule's text when blocked.
    pub fn check_action(&self, bot: &str, action_description: &str) -> Result<(bool, Option<String>)> {
        let card = self.registry.load(bot)?;
        let needle = action_description.to_lowercase();
        for ban in &card.hard_bans {
            if needle.contains(&ban.rule.to_lowercase()) {
                warn!(bot, rule = %ban.rule, "action blocked by role card hard ban");
                return Ok((false, Some(ban.rule.clone())));
            }
        }
        Ok((true, None))
    }

    /// True if any escalation trigger's pattern matches `situation_description`,
    /// or if `confidence` is below the matching trigger's threshold (or the
    /// default minimum when no trigger matches but confidence is still low).
    pub fn should_escalate(&self, bot: &str, situation_description: &str, confidence: f64) -> Result<(bool, String)> {
        let card = self.registry.load(bot)?;
        let needle = situation_description.to_lowercase();
        for trigger in &card.escalation_triggers {
            if needle.contains(&trigger.pattern.to_lowercase()) {
                return Ok((true, format!("matched escalation trigger: {}", trigger.pattern)));
            }
            if confidence < trigger.threshold {
                return Ok((
                    true,
                    format!("confidence {confidence:.2} below trigger threshold {:.2}", trigger.threshold),
                ));
            }
        }
        if confidence < DEFAULT_MIN_CONFIDENCE {
            return Ok((true, format!("confidence {confidence:.2} below default minimum {DEFAULT_MIN_CONFIDENCE:.2}")));
        }
        Ok((false, String::new()))
    }

    /// Persist a draft change for `bot`. Never applied automatically — a
    /// human must call [`RoleCardRegistry::save_workspace_override`]
    /// explicitly after reviewing it.
    pub fn propose_change(&self, bot: &str, diff: RoleCardOverride, rationale: impl Into<String>) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.drafts_dir)?;
        let change = ProposedChange {
            bot_name: bot.to_string(),
            diff,
            rationale: rationale.into(),
            proposed_at: chrono::Utc::now().to_rfc3339(),
        };
        let path = self.drafts_dir.join(format!("{bot}.proposed.yaml"));
        let yaml = serde_yaml::to_string(&change).map_err(crate::error::RoleCardError::Yaml)?;
        std::fs::write(&path, yaml)?;
        Ok(path)
    }

    pub fn registry(&self) -> &RoleCardRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HardBan;

    fn enforcer(tmp: &tempfile::TempDir) -> Enforcer {
        let registry = RoleCardRegistry::new(tmp.path().join("workspace"), tmp.path().join("global"));
        std::fs::create_dir_all(tmp.path().join("workspace")).unwrap();
        std::fs::write(
            tmp.path().join("workspace").join("social.yaml"),
            serde_yaml::to_string(&crate::types::RoleCardOverride {
                hard_bans: Some(vec![HardBan {
                    rule: "direct posting".to_string(),
                    severity: "high".to_string(),
                    consequence: "drafts only".to_string(),
                }]),
                ..Default::default()
            })
            .unwrap(),
        )
        .unwrap();
        Enforcer::new(registry, tmp.path().join("drafts"))
    }

    #[test]
    fn check_action_blocks_on_hard_ban_match() {
        let tmp = tempfile::tempdir().unwrap();
        let enf = enforcer(&tmp);
        let (allowed, violation) = enf.check_action("social", "attempt direct posting of announcement").unwrap();
        assert!(!allowed);
        assert_eq!(violation.unwrap(), "direct posting");
    }

    #[test]
    fn check_action_allows_unrelated_action() {
        let tmp = tempfile::tempdir().unwrap();
        let enf = enforcer(&tmp);
        let (allowed, violation) = enf.check_action("social", "draft a post for review").unwrap();
        assert!(allowed);
        assert!(violation.is_none());
    }

    #[test]
    fn should_escalate_on_low_confidence_default() {
        let tmp = tempfile::tempdir().unwrap();
        let enf = enforcer(&tmp);
        let (escalate, _) = enf.should_escalate("social", "routine update", 0.3).unwrap();
        assert!(escalate);
    }

    #[test]
    fn propose_change_never_applies_automatically() {
        let tmp = tempfile::tempdir().unwrap();
        let enf = enforcer(&tmp);
        let registry = RoleCardRegistry::new(tmp.path().join("workspace"), tmp.path().join("global"));
        let before = registry.load("social").unwrap();
        enf.propose_change(
            "social",
            RoleCardOverride {
                domain: Some("new domain".to_string()),
                ..Default::default()
            },
            "testing",
        )
        .unwrap();
        let after = registry.load("social").unwrap();
        assert_eq!(before, after);
    }
}
