//! Snapshot record types
//!
//! A `WorldSnapshot` is the on-disk record of one capture: every live
//! entity's identity and transform, ordered by label, plus capture
//! metadata. Snapshots are immutable once written.

pub mod capture;
pub mod diff;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use safehold_core::{Entity, World};

/// One entity's identity and transform as captured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub label: String,
    pub kind: String,
    pub path: String,
    pub position: [f64; 3],
    pub orientation: [f64; 3],
}

impl From<&Entity> for EntityRecord {
    fn from(entity: &Entity) -> Self {
        Self {
            label: entity.label.clone(),
            kind: entity.kind.clone(),
            path: entity.path.clone(),
            position: entity.position,
            orientation: entity.orientation,
        }
    }
}

/// Versioned, timestamped record of world state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Name the capture was requested under
    pub snapshot_name: String,
    /// RFC3339 capture timestamp
    pub timestamp: String,
    /// Number of entities at capture time
    pub entity_count: usize,
    /// Entity records, ordered by label
    pub entities: Vec<EntityRecord>,
}

impl WorldSnapshot {
    /// Build a snapshot from the current world state
    pub fn from_world(world: &World, name: &str, timestamp: String) -> Self {
        let entities: Vec<EntityRecord> = world.entities().map(EntityRecord::from).collect();
        Self {
            snapshot_name: name.to_string(),
            timestamp,
            entity_count: entities.len(),
            entities,
        }
    }

    /// Set of entity labels in this snapshot (diffs compare only labels)
    pub fn label_set(&self) -> BTreeSet<String> {
        self.entities.iter().map(|e| e.label.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo_world() -> World {
        let mut world = World::new();
        world
            .spawn(Entity::new("Crate_01", "StaticProp", "/props/crate").at([1.0, 2.0, 3.0]))
            .unwrap();
        world
            .spawn(Entity::new("Lamp_01", "PointLight", "/lights/lamp"))
            .unwrap();
        world
    }

    #[test]
    fn test_from_world_captures_all_entities() {
        let world = demo_world();
        let snap = WorldSnapshot::from_world(&world, "test", "2026-01-01T00:00:00Z".to_string());

        assert_eq!(snap.entity_count, 2);
        assert_eq!(snap.entities.len(), 2);
        // Label order mirrors the world's deterministic order
        assert_eq!(snap.entities[0].label, "Crate_01");
        assert_eq!(snap.entities[1].label, "Lamp_01");
        assert_eq!(snap.entities[0].position, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_label_set() {
        let world = demo_world();
        let snap = WorldSnapshot::from_world(&world, "test", "t".to_string());
        let labels = snap.label_set();
        assert!(labels.contains("Crate_01"));
        assert!(labels.contains("Lamp_01"));
        assert_eq!(labels.len(), 2);
    }

    #[test]
    fn test_snapshot_serde_round_trip() {
        let world = demo_world();
        let snap = WorldSnapshot::from_world(&world, "test", "t".to_string());
        let json = serde_json::to_string_pretty(&snap).unwrap();
        let back: WorldSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snap, back);
    }
}
