//! Plain descriptors for rigid bodies and colliders.
//!
//! Descriptors are engine-agnostic value types: collider inference produces
//! them, the registry snapshots them, and [`crate::physics::PhysicsWorld`]
//! turns them into rapier bodies.

use glam::{Quat, Vec3};
use rapier3d::prelude::{Group, InteractionGroups};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ShapeError {
    #[error("unknown collider shape prefix: {name}")]
    UnknownShape { name: String },

    #[error("collider node '{name}' has no baked geometry")]
    MissingGeometry { name: String },
}

pub type ShapeResult<T> = Result<T, ShapeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyType {
    Fixed,
    Dynamic,
    KinematicPositionBased,
}

/// Shape tag parsed from authored node names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Trimesh,
    Hull,
    Cuboid,
    Cylinder,
    Ball,
}

impl ShapeKind {
    /// Parse an authored node name into a shape tag by case-insensitive
    /// prefix. Unrecognized names are a construction error, never a silent
    /// fallback shape.
    pub fn parse(name: &str) -> ShapeResult<Self> {
        let lowered = name.to_ascii_lowercase();
        if lowered.starts_with("trimesh") {
            Ok(Self::Trimesh)
        } else if lowered.starts_with("hull") {
            Ok(Self::Hull)
        } else if lowered.starts_with("cub") {
            Ok(Self::Cuboid)
        } else if lowered.starts_with("cylinder") || lowered.starts_with("tube") {
            Ok(Self::Cylinder)
        } else if lowered.starts_with("ball") || lowered.starts_with("sphere") {
            Ok(Self::Ball)
        } else {
            Err(ShapeError::UnknownShape {
                name: name.to_string(),
            })
        }
    }
}

/// Collision geometry plus its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ColliderShape {
    Trimesh {
        vertices: Vec<Vec3>,
        indices: Vec<[u32; 3]>,
    },
    Hull {
        points: Vec<Vec3>,
    },
    Cuboid {
        half_extents: Vec3,
    },
    Cylinder {
        half_height: f32,
        radius: f32,
    },
    Ball {
        radius: f32,
    },
}

impl ColliderShape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            ColliderShape::Trimesh { .. } => ShapeKind::Trimesh,
            ColliderShape::Hull { .. } => ShapeKind::Hull,
            ColliderShape::Cuboid { .. } => ShapeKind::Cuboid,
            ColliderShape::Cylinder { .. } => ShapeKind::Cylinder,
            ColliderShape::Ball { .. } => ShapeKind::Ball,
        }
    }
}

/// Broad interaction class used for collision-group memberships.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionCategory {
    Default,
    Terrain,
    Object,
    Vehicle,
}

impl CollisionCategory {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "default" => Some(Self::Default),
            "terrain" => Some(Self::Terrain),
            "object" => Some(Self::Object),
            "vehicle" => Some(Self::Vehicle),
            _ => None,
        }
    }

    /// Membership bits for the rapier collider. Every category currently
    /// interacts with every other; the memberships keep categories
    /// distinguishable for future filtering and for queries.
    pub fn interaction_groups(self) -> InteractionGroups {
        let membership = match self {
            CollisionCategory::Default => Group::GROUP_1,
            CollisionCategory::Terrain => Group::GROUP_2,
            CollisionCategory::Object => Group::GROUP_3,
            CollisionCategory::Vehicle => Group::GROUP_4,
        };
        InteractionGroups::new(membership, Group::ALL)
    }
}

/// One collider attached to a body, in body-local space. Immutable once
/// constructed.
#[derive(Debug, Clone, PartialEq)]
pub struct ColliderDesc {
    pub shape: ColliderShape,
    pub position: Vec3,
    pub rotation: Quat,
    pub friction: Option<f32>,
    pub restitution: Option<f32>,
    pub mass: Option<f32>,
    pub category: Option<CollisionCategory>,
}

impl ColliderDesc {
    pub fn new(shape: ColliderShape) -> Self {
        Self {
            shape,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            friction: None,
            restitution: None,
            mass: None,
            category: None,
        }
    }

    pub fn cuboid(half_extents: Vec3) -> Self {
        Self::new(ColliderShape::Cuboid { half_extents })
    }

    pub fn ball(radius: f32) -> Self {
        Self::new(ColliderShape::Ball { radius })
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = Some(friction);
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = Some(restitution);
        self
    }

    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = Some(mass);
        self
    }

    pub fn with_category(mut self, category: CollisionCategory) -> Self {
        self.category = Some(category);
        self
    }
}

/// Everything needed to create one rigid body with its colliders.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyDesc {
    pub body_type: BodyType,
    pub position: Vec3,
    pub rotation: Quat,
    pub can_sleep: bool,
    pub sleeping: bool,
    pub enabled: bool,
    pub colliders: Vec<ColliderDesc>,
}

impl BodyDesc {
    pub fn new(body_type: BodyType) -> Self {
        Self {
            body_type,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            can_sleep: true,
            sleeping: false,
            enabled: true,
            colliders: Vec::new(),
        }
    }

    pub fn fixed() -> Self {
        Self::new(BodyType::Fixed)
    }

    pub fn dynamic() -> Self {
        Self::new(BodyType::Dynamic)
    }

    pub fn kinematic() -> Self {
        Self::new(BodyType::KinematicPositionBased)
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_can_sleep(mut self, can_sleep: bool) -> Self {
        self.can_sleep = can_sleep;
        self
    }

    pub fn with_sleeping(mut self, sleeping: bool) -> Self {
        self.sleeping = sleeping;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_collider(mut self, collider: ColliderDesc) -> Self {
        self.colliders.push(collider);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_prefixes_parse_case_insensitively() {
        assert_eq!(ShapeKind::parse("trimeshFloor").unwrap(), ShapeKind::Trimesh);
        assert_eq!(ShapeKind::parse("HullRock003").unwrap(), ShapeKind::Hull);
        assert_eq!(ShapeKind::parse("cubCrate").unwrap(), ShapeKind::Cuboid);
        assert_eq!(ShapeKind::parse("Cuboid").unwrap(), ShapeKind::Cuboid);
        assert_eq!(ShapeKind::parse("cube").unwrap(), ShapeKind::Cuboid);
        assert_eq!(ShapeKind::parse("cylinderPole").unwrap(), ShapeKind::Cylinder);
        assert_eq!(ShapeKind::parse("TubeBumper").unwrap(), ShapeKind::Cylinder);
        assert_eq!(ShapeKind::parse("ballLamp").unwrap(), ShapeKind::Ball);
        assert_eq!(ShapeKind::parse("SphereBuoy").unwrap(), ShapeKind::Ball);
    }

    #[test]
    fn unknown_shape_prefix_is_fatal() {
        let err = ShapeKind::parse("dodecahedron").unwrap_err();
        assert!(matches!(err, ShapeError::UnknownShape { name } if name == "dodecahedron"));
    }

    #[test]
    fn category_parse_is_lenient_about_case_only() {
        assert_eq!(CollisionCategory::parse("Object"), Some(CollisionCategory::Object));
        assert_eq!(CollisionCategory::parse("TERRAIN"), Some(CollisionCategory::Terrain));
        assert_eq!(CollisionCategory::parse("lava"), None);
    }

    #[test]
    fn body_desc_builders_accumulate() {
        let desc = BodyDesc::dynamic()
            .with_position(Vec3::new(1.0, 2.0, 3.0))
            .with_sleeping(true)
            .with_collider(ColliderDesc::cuboid(Vec3::splat(0.5)).with_mass(12.0));

        assert_eq!(desc.body_type, BodyType::Dynamic);
        assert!(desc.sleeping);
        assert_eq!(desc.colliders.len(), 1);
        assert_eq!(desc.colliders[0].mass, Some(12.0));
    }
}
