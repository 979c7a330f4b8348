use serde::{Deserialize, Serialize};

/// One hard-ban rule (§3 RoleCard): an action matching `rule` must never run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardBan {
    pub rule: String,
    pub severity: String,
    pub consequence: String,
}

/// A situation pattern that, when matched (or when confidence drops below
/// `threshold`), requires human escalation before the bot proceeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationTrigger {
    pub pattern: String,
    pub threshold: f64,
}

/// Per-bot contract: the six layers of §3 RoleCard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleCard {
    pub bot_name: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub definition_of_done: Vec<String>,
    #[serde(default)]
    pub hard_bans: Vec<HardBan>,
    #[serde(default)]
    pub escalation_triggers: Vec<EscalationTrigger>,
    #[serde(default)]
    pub metrics: Vec<String>,
}

impl RoleCard {
    pub fn empty(bot_name: impl Into<String>) -> Self {
        Self {
            bot_name: bot_name.into(),
            domain: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            definition_of_done: Vec::new(),
            hard_bans: Vec::new(),
            escalation_triggers: Vec::new(),
            metrics: Vec::new(),
        }
    }
}

/// A sparse per-field override layer, used for both the user-global and
/// workspace override files — unset fields fall through to the next tier
/// (§6 "missing fields fall back to the next override tier").
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleCardOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_of_done: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hard_bans: Option<Vec<HardBan>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_triggers: Option<Vec<EscalationTrigger>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Vec<String>>,
}

impl RoleCardOverride {
    /// Apply this override's set fields on top of `base`, field by field.
    pub fn apply_over(&self, mut base: RoleCard) -> RoleCard {
        if let Some(v) = &self.domain {
            base.domain = v.clone();
        }
        if let Some(v) = &self.inputs {
            base.inputs = v.clone();
        }
        if let Some(v) = &self.outputs {
            base.outputs = v.clone();
        }
        if let Some(v) = &self.definition_of_done {
            base.definition_of_done = v.clone();
        }
        if let Some(v) = &self.hard_bans {
            base.hard_bans = v.clone();
        }
        if let Some(v) = &self.escalation_triggers {
            base.escalation_triggers = v.clone();
        }
        if let Some(v) = &self.metrics {
            base.metrics = v.clone();
        }
        base
    }

    pub fn from_card(card: &RoleCard) -> Self {
        Self {
            domain: Some(card.domain.clone()),
            inputs: Some(card.inputs.clone()),
            outputs: Some(card.outputs.clone()),
            definition_of_done: Some(card.definition_of_done.clone()),
            hard_bans: Some(card.hard_bans.clone()),
            escalation_triggers: Some(card.escalation_triggers.clone()),
            metrics: Some(card.metrics.clone()),
        }
    }
}

/// A bot-proposed (or user-drafted) change to a role card, held until the
/// user explicitly accepts it — never auto-applied (§4.5 `propose_change`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedChange {
    pub bot_name: String,
    pub diff: RoleCardOverride,
    pub rationale: String,
    pub proposed_at: String,
}
