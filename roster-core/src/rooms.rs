//! Room (Workspace) persistence, §3 and §6 file layout.
//!
//! Rooms are metadata, not message history — a Room's Envelope history lives
//! in the Session keyed by its `ChannelKey` (§4.1/§4.2). What needs a durable
//! home of its own is the Room's participant list, kind, and escalation
//! threshold, so `room create`/lookups survive process restarts. There is no
//! `rooms.db` in §6's persistent-store list, so this follows the same
//! per-entity YAML file convention the RoleCard overrides use rather than
//! inventing a new SQLite schema for a handful of fields per room.

use std::path::PathBuf;

use tracing::debug;

use crate::error::{Result, RosterError};
use crate::types::{Room, RoomId};

/// Reads and writes Room metadata as one YAML file per room under
/// `<workspace_dir>/rooms/<id>.yaml`.
pub struct RoomRegistry {
    rooms_dir: PathBuf,
}

impl RoomRegistry {
    pub fn new(workspace_dir: impl Into<PathBuf>) -> Self {
        Self { rooms_dir: workspace_dir.into().join("rooms") }
    }

    pub fn create(&self, room: Room) -> Result<Room> {
        let path = self.path_for(&room.id);
        if path.exists() {
            return Err(RosterError::InputValidation(format!("room {} already exists", room.id)));
        }
        self.write(&room)?;
        Ok(room)
    }

    pub fn get(&self, id: &RoomId) -> Result<Option<Room>> {
        let path = self.path_for(id);
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| RosterError::Other(e.to_string()))?;
        let room: Room = serde_yaml::from_str(&contents).map_err(|e| RosterError::Other(e.to_string()))?;
        Ok(Some(room))
    }

    pub fn list(&self) -> Result<Vec<Room>> {
        if !self.rooms_dir.exists() {
            return Ok(Vec::new());
        }
        let mut rooms = Vec::new();
        let entries = std::fs::read_dir(&self.rooms_dir).map_err(|e| RosterError::Other(e.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|e| RosterError::Other(e.to_string()))?;
            if entry.path().extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            let contents = std::fs::read_to_string(entry.path()).map_err(|e| RosterError::Other(e.to_string()))?;
            if let Ok(room) = serde_yaml::from_str(&contents) {
                rooms.push(room);
            }
        }
        rooms.sort_by(|a: &Room, b: &Room| a.created_at.cmp(&b.created_at));
        Ok(rooms)
    }

    fn write(&self, room: &Room) -> Result<()> {
        std::fs::create_dir_all(&self.rooms_dir).map_err(|e| RosterError::Other(e.to_string()))?;
        let path = self.path_for(&room.id);
        let yaml = serde_yaml::to_string(room).map_err(|e| RosterError::Other(e.to_string()))?;
        std::fs::write(&path, yaml).map_err(|e| RosterError::Other(e.to_string()))?;
        debug!(room = %room.id, path = %path.display(), "wrote room metadata");
        Ok(())
    }

    fn path_for(&self, id: &RoomId) -> PathBuf {
        self.rooms_dir.join(format!("{}.yaml", id.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BotId, RoomKind};

    #[test]
    fn create_then_get_roundtrips() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = RoomRegistry::new(tmp.path());
        let room = Room::new(RoomKind::Project, "alice", vec![BotId::new("leader")]);
        let id = room.id.clone();
        registry.create(room).unwrap();

        let fetched = registry.get(&id).unwrap().unwrap();
        assert_eq!(fetched.kind, RoomKind::Project);
        assert_eq!(fetched.participants, vec![BotId::new("leader")]);
    }

    #[test]
    fn create_rejects_duplicate_id() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = RoomRegistry::new(tmp.path());
        let room = Room::new(RoomKind::Open, "alice", vec![]);
        let dup = Room { id: room.id.clone(), ..Room::new(RoomKind::Open, "bob", vec![]) };
        registry.create(room).unwrap();
        assert!(registry.create(dup).is_err());
    }

    #[test]
    fn list_is_empty_when_no_rooms_created() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = RoomRegistry::new(tmp.path());
        assert!(registry.list().unwrap().is_empty());
    }
}
