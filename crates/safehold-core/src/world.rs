//! In-memory world model
//!
//! A simple BTreeMap-based world keyed by entity label. Not thread-safe
//! (no Arc/RwLock) - designed for single-threaded use, which is what the
//! safety pipeline assumes. Iteration order is deterministic (sorted by
//! label), so snapshots and diffs are reproducible.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SafeholdError};
use crate::model::Entity;

/// The live, stateful world model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct World {
    /// Map of entity label to entity
    entities: BTreeMap<String, Entity>,
}

impl World {
    /// Create a new empty world
    pub fn new() -> Self {
        Self {
            entities: BTreeMap::new(),
        }
    }

    /// Number of live entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Sorted labels of all live entities
    pub fn labels(&self) -> Vec<String> {
        self.entities.keys().cloned().collect()
    }

    /// Iterate over all live entities in label order
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Get an entity by label
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the entity doesn't exist.
    pub fn get(&self, label: &str) -> Result<&Entity> {
        self.entities
            .get(label)
            .ok_or_else(|| SafeholdError::Internal {
                message: format!("Entity not found: {}", label),
            })
    }

    /// Get a mutable reference to an entity by label
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the entity doesn't exist.
    pub fn get_mut(&mut self, label: &str) -> Result<&mut Entity> {
        self.entities
            .get_mut(label)
            .ok_or_else(|| SafeholdError::Internal {
                message: format!("Entity not found: {}", label),
            })
    }

    /// True if an entity with this label exists
    pub fn contains(&self, label: &str) -> bool {
        self.entities.contains_key(label)
    }

    /// Spawn a new entity
    ///
    /// # Errors
    ///
    /// Returns `Internal` if an entity with the same label already exists.
    pub fn spawn(&mut self, entity: Entity) -> Result<()> {
        if self.entities.contains_key(&entity.label) {
            return Err(SafeholdError::Internal {
                message: format!("Entity already exists: {}", entity.label),
            });
        }
        self.entities.insert(entity.label.clone(), entity);
        Ok(())
    }

    /// Remove an entity by label, returning it
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the entity doesn't exist.
    pub fn remove(&mut self, label: &str) -> Result<Entity> {
        self.entities
            .remove(label)
            .ok_or_else(|| SafeholdError::Internal {
                message: format!("Entity not found: {}", label),
            })
    }

    /// Rename an entity, re-keying it under the new label
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the source doesn't exist or the target label
    /// is already taken.
    pub fn rename(&mut self, label: &str, new_label: &str) -> Result<()> {
        if self.entities.contains_key(new_label) {
            return Err(SafeholdError::Internal {
                message: format!("Entity already exists: {}", new_label),
            });
        }
        let mut entity = self.remove(label)?;
        entity.label = new_label.to_string();
        self.entities.insert(entity.label.clone(), entity);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crate_at(label: &str, x: f64) -> Entity {
        Entity::new(label, "StaticProp", "/props/crate").at([x, 0.0, 0.0])
    }

    #[test]
    fn test_spawn_and_count() {
        let mut world = World::new();
        assert_eq!(world.entity_count(), 0);

        world.spawn(crate_at("Crate_01", 1.0)).unwrap();
        world.spawn(crate_at("Crate_02", 2.0)).unwrap();
        assert_eq!(world.entity_count(), 2);
        assert_eq!(world.labels(), vec!["Crate_01", "Crate_02"]);
    }

    #[test]
    fn test_spawn_duplicate_label_fails() {
        let mut world = World::new();
        world.spawn(crate_at("Crate_01", 1.0)).unwrap();
        let result = world.spawn(crate_at("Crate_01", 9.0));
        assert!(result.is_err());
        assert_eq!(world.entity_count(), 1);
    }

    #[test]
    fn test_remove() {
        let mut world = World::new();
        world.spawn(crate_at("Crate_01", 1.0)).unwrap();
        let removed = world.remove("Crate_01").unwrap();
        assert_eq!(removed.label, "Crate_01");
        assert_eq!(world.entity_count(), 0);
        assert!(world.remove("Crate_01").is_err());
    }

    #[test]
    fn test_rename_rekeys() {
        let mut world = World::new();
        world.spawn(crate_at("Old", 1.0)).unwrap();
        world.rename("Old", "New").unwrap();

        assert!(!world.contains("Old"));
        assert_eq!(world.get("New").unwrap().label, "New");
    }

    #[test]
    fn test_rename_collision_fails() {
        let mut world = World::new();
        world.spawn(crate_at("A", 1.0)).unwrap();
        world.spawn(crate_at("B", 2.0)).unwrap();
        assert!(world.rename("A", "B").is_err());
        // Source untouched on failure
        assert!(world.contains("A"));
    }

    #[test]
    fn test_labels_are_sorted() {
        let mut world = World::new();
        world.spawn(crate_at("Zulu", 1.0)).unwrap();
        world.spawn(crate_at("Alpha", 2.0)).unwrap();
        world.spawn(crate_at("Mike", 3.0)).unwrap();
        assert_eq!(world.labels(), vec!["Alpha", "Mike", "Zulu"]);
    }

    #[test]
    fn test_world_serde_round_trip() {
        let mut world = World::new();
        world.spawn(crate_at("Crate_01", 1.0)).unwrap();
        let json = serde_json::to_string(&world).unwrap();
        let back: World = serde_json::from_str(&json).unwrap();
        assert_eq!(world, back);
    }
}
