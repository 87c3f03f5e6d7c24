//! Entity model for the live world
//!
//! An entity is an addressable object with identity (label), a type name,
//! an asset path and a spatial transform. The transform is intentionally
//! minimal: position and orientation triples, no scale or hierarchy.

use serde::{Deserialize, Serialize};

/// An addressable object in the live world model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Unique human-readable label (world-wide identity)
    pub label: String,
    /// Type name of the entity (e.g. "StaticProp", "PointLight")
    pub kind: String,
    /// Asset path backing this entity. Protected: ordinary handlers must
    /// not change it; only the `write_protected` bypass command may.
    pub path: String,
    /// Position as [x, y, z]
    pub position: [f64; 3],
    /// Orientation as [pitch, yaw, roll] degrees
    pub orientation: [f64; 3],
}

impl Entity {
    /// Create an entity at the origin with a neutral orientation
    pub fn new(label: impl Into<String>, kind: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            kind: kind.into(),
            path: path.into(),
            position: [0.0, 0.0, 0.0],
            orientation: [0.0, 0.0, 0.0],
        }
    }

    /// Set the position, builder-style
    pub fn at(mut self, position: [f64; 3]) -> Self {
        self.position = position;
        self
    }

    /// Set the orientation, builder-style
    pub fn oriented(mut self, orientation: [f64; 3]) -> Self {
        self.orientation = orientation;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_builder() {
        let e = Entity::new("Crate_01", "StaticProp", "/props/crate")
            .at([100.0, 200.0, 0.0])
            .oriented([0.0, 90.0, 0.0]);

        assert_eq!(e.label, "Crate_01");
        assert_eq!(e.kind, "StaticProp");
        assert_eq!(e.position, [100.0, 200.0, 0.0]);
        assert_eq!(e.orientation, [0.0, 90.0, 0.0]);
    }

    #[test]
    fn test_entity_serde_round_trip() {
        let e = Entity::new("Lamp_02", "PointLight", "/lights/lamp").at([1.0, 2.0, 3.0]);
        let json = serde_json::to_string(&e).unwrap();
        let back: Entity = serde_json::from_str(&json).unwrap();
        assert_eq!(e, back);
    }
}
