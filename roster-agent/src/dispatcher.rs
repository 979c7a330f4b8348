//! Pure target-resolution for an inbound message (§4.8 Dispatcher).

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

/// Where a message should be routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Dm,
    DirectBot,
    LeaderFirst,
}

/// Result of [`dispatch`] — who handles an inbound message and why.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub target: TargetKind,
    pub primary_bot: String,
    pub secondary_bots: Vec<String>,
    pub reason: String,
}

static MENTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@([\w-]+)").unwrap());

/// Parses `@<name>` mentions from `content`. Deduplicates while preserving
/// first-seen order; unknown mentions are dropped by the caller, not here —
/// this function only knows about syntax.
pub fn parse_mentions(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for cap in MENTION_RE.captures_iter(content) {
        let name = cap[1].to_string();
        if seen.insert(name.clone()) {
            out.push(name);
        }
    }
    out
}

/// Decide the handler(s) for an inbound message (§4.8 rules 1-3).
///
/// `registered_bots` and `room_participants` are both checked against parsed
/// mentions — an unknown mention is ignored per rule 2.
pub fn dispatch(
    content: &str,
    is_dm: bool,
    dm_target: Option<&str>,
    leader: &str,
    room_participants: &[String],
    registered_bots: &[String],
) -> Dispatch {
    if is_dm {
        if let Some(target) = dm_target {
            return Dispatch {
                target: TargetKind::Dm,
                primary_bot: target.to_string(),
                secondary_bots: Vec::new(),
                reason: "direct message with explicit target".to_string(),
            };
        }
    }

    let mentions = parse_mentions(content);
    let has_broadcast = mentions.iter().any(|m| m == "all" || m == "team");

    if has_broadcast {
        let secondaries: Vec<String> = room_participants.iter().filter(|p| p.as_str() != leader).cloned().collect();
        return Dispatch {
            target: TargetKind::LeaderFirst,
            primary_bot: leader.to_string(),
            secondary_bots: secondaries,
            reason: "broadcast mention (@all/@team)".to_string(),
        };
    }

    let known_mentions: Vec<&String> = mentions.iter().filter(|m| registered_bots.contains(m)).collect();
    if known_mentions.len() == 1 {
        return Dispatch {
            target: TargetKind::DirectBot,
            primary_bot: known_mentions[0].clone(),
            secondary_bots: Vec::new(),
            reason: format!("single resolved mention @{}", known_mentions[0]),
        };
    }

    let secondaries: Vec<String> = room_participants.iter().filter(|p| p.as_str() != leader).cloned().collect();
    Dispatch {
        target: TargetKind::LeaderFirst,
        primary_bot: leader.to_string(),
        secondary_bots: secondaries,
        reason: "no resolvable mention — leader-first default".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dm_with_target_wins() {
        let d = dispatch("hello", true, Some("researcher"), "leader", &[], &[]);
        assert_eq!(d.target, TargetKind::Dm);
        assert_eq!(d.primary_bot, "researcher");
    }

    #[test]
    fn single_known_mention_is_direct_bot() {
        let bots = vec!["leader".to_string(), "researcher".to_string(), "coder".to_string()];
        let participants = bots.clone();
        let d = dispatch("@researcher can you check this", false, None, "leader", &participants, &bots);
        assert_eq!(d.target, TargetKind::DirectBot);
        assert_eq!(d.primary_bot, "researcher");
    }

    #[test]
    fn broadcast_mention_is_leader_first_with_all_secondaries() {
        let bots = vec!["leader".to_string(), "researcher".to_string(), "coder".to_string()];
        let d = dispatch("@all look at this", false, None, "leader", &bots, &bots);
        assert_eq!(d.target, TargetKind::LeaderFirst);
        assert_eq!(d.primary_bot, "leader");
        assert_eq!(d.secondary_bots, vec!["researcher".to_string(), "coder".to_string()]);
    }

    #[test]
    fn unknown_mention_falls_back_to_leader_first() {
        let bots = vec!["leader".to_string(), "researcher".to_string()];
        let d = dispatch("@ghostwriter help", false, None, "leader", &bots, &bots);
        assert_eq!(d.target, TargetKind::LeaderFirst);
        assert_eq!(d.primary_bot, "leader");
    }

    #[test]
    fn duplicate_mentions_are_deduplicated() {
        let mentions = parse_mentions("@researcher ping @researcher again @coder");
        assert_eq!(mentions, vec!["researcher".to_string(), "coder".to_string()]);
    }

    #[test]
    fn no_mention_defaults_to_leader_first() {
        let bots = vec!["leader".to_string(), "researcher".to_string(), "coder".to_string()];
        let d = dispatch("summarize the paper", false, None, "leader", &bots, &bots);
        assert_eq!(d.target, TargetKind::LeaderFirst);
        assert_eq!(d.secondary_bots, vec!["researcher".to_string(), "coder".to_string()]);
    }
}
