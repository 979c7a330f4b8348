use std::collections::HashSet;

use crate::types::{LearningPackage, PackageScope};

/// Compute the applicable-bot set for `package` given the full registered-bot
/// roster and a room-membership lookup, per the `ApplicabilityRule` in §4.7:
///
/// - `general` → all registered bots
/// - `project` → bots that participate in any of `applicable_rooms`
/// - `team` → `applicable_bots` ∩ participants of `applicable_rooms`
/// - `bot_specific` → `applicable_bots` only
///
/// The source bot is always excluded from the result.
pub fn applicable_bots(package: &LearningPackage, all_bots: &[String], room_members: impl Fn(&str) -> Vec<String>) -> Vec<String> {
    let raw: Vec<String> = match package.scope {
        PackageScope::General => all_bots.to_vec(),
        PackageScope::Project => {
            let mut set = HashSet::new();
            for room in &package.applicable_rooms {
                set.extend(room_members(room));
            }
            set.into_iter().collect()
        }
        PackageScope::Team => {
            let room_bots: HashSet<String> = package
                .applicable_rooms
                .iter()
                .flat_map(|room| room_members(room))
                .collect();
            package
                .applicable_bots
                .iter()
                .filter(|b| room_bots.contains(*b))
                .cloned()
                .collect()
        }
        PackageScope::BotSpecific => package.applicable_bots.clone(),
    };

    raw.into_iter().filter(|b| b != &package.source_bot).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PackageStatus;

    fn package(scope: PackageScope, rooms: &[&str], bots: &[&str]) -> LearningPackage {
        LearningPackage {
            id: "pkg1".into(),
            learning_id: "l1".into(),
            category: "user_preference".into(),
            title: "t".into(),
            description: "d".into(),
            confidence: 0.9,
            scope,
            applicable_rooms: rooms.iter().map(|s| s.to_string()).collect(),
            applicable_bots: bots.iter().map(|s| s.to_string()).collect(),
            source_bot: "researcher".into(),
            source_room: Some("room1".into()),
            evidence: vec![],
            status: PackageStatus::Queued,
            distributed_to: vec![],
            approved: true,
            created_at: "now".into(),
        }
    }

    #[test]
    fn general_scope_is_all_bots_minus_source() {
        let pkg = package(PackageScope::General, &[], &[]);
        let all = vec!["leader".to_string(), "researcher".to_string(), "coder".to_string()];
        let result = applicable_bots(&pkg, &all, |_| vec![]);
        assert_eq!(result.len(), 2);
        assert!(!result.contains(&"researcher".to_string()));
    }

    #[test]
    fn bot_specific_scope_ignores_room_membership() {
        let pkg = package(PackageScope::BotSpecific, &[], &["leader"]);
        let result = applicable_bots(&pkg, &[], |_| vec![]);
        assert_eq!(result, vec!["leader".to_string()]);
    }

    #[test]
    fn team_scope_intersects_bots_and_room_members() {
        let pkg = package(PackageScope::Team, &["room1"], &["leader", "coder"]);
        let result = applicable_bots(&pkg, &[], |room| {
            if room == "room1" {
                vec!["leader".to_string(), "researcher".to_string()]
            } else {
                vec![]
            }
        });
        assert_eq!(result, vec!["leader".to_string()]);
    }
}
