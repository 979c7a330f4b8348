use roster_core::{BotId, EscalationThreshold, Room, RoomId, RoomKind, RoomRegistry};

use crate::cli::RoomKindArg;
use crate::error::Result;
use crate::paths::Paths;

pub fn create(paths: &Paths, id: String, bots: Vec<String>, kind: RoomKindArg) -> Result<()> {
    let registry = RoomRegistry::new(paths.data_dir());
    let room = Room {
        id: RoomId::from(id.as_str()),
        kind: RoomKind::from(kind),
        participants: bots.iter().map(|b| BotId::from(b.as_str())).collect(),
        owner: "cli".to_string(),
        created_at: chrono::Utc::now().to_rfc3339(),
        coordinator_mode: false,
        escalation_threshold: EscalationThreshold::Medium,
    };
    let created = registry.create(room)?;
    println!("created room {} ({}), participants: {:?}", created.id, created.kind, created.participants);
    Ok(())
}
