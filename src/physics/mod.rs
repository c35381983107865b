//! Rigid-body simulation built on rapier, plus the descriptor types and
//! name-based collider inference that feed it.

pub mod body;
pub mod inference;

pub use body::{
    BodyDesc, BodyType, ColliderDesc, ColliderShape, CollisionCategory, ShapeError, ShapeKind,
    ShapeResult,
};
pub use inference::{infer_colliders, InferenceError, InferenceResult, InferredPhysics};

use glam::Vec3;
use rapier3d::control::DynamicRayCastVehicleController;
use rapier3d::prelude::*;
use thiserror::Error;

use crate::utils::math::{from_na_vector, to_na_isometry, to_na_point, to_na_vector};

#[derive(Debug, Clone, Error)]
pub enum PhysicsError {
    #[error("convex hull computation failed for {points} points")]
    InvalidHull { points: usize },
}

pub type PhysicsResult<T> = Result<T, PhysicsError>;

/// Owns the rapier sets and pipelines and steps them as one unit.
///
/// At most one raycast vehicle controller rides along with the world; it is
/// advanced right before each pipeline step so wheel forces land in the same
/// frame.
pub struct PhysicsWorld {
    bodies: RigidBodySet,
    colliders: ColliderSet,
    integration: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
    queries: QueryPipeline,
    gravity: Vector<Real>,
    vehicle: Option<DynamicRayCastVehicleController>,
}

impl PhysicsWorld {
    pub fn new(gravity: Vec3) -> Self {
        Self {
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            integration: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            queries: QueryPipeline::new(),
            gravity: to_na_vector(gravity),
            vehicle: None,
        }
    }

    pub fn gravity(&self) -> Vec3 {
        from_na_vector(&self.gravity)
    }

    /// Create a rigid body and all of its colliders from a descriptor.
    pub fn create_body(
        &mut self,
        desc: &BodyDesc,
    ) -> PhysicsResult<(RigidBodyHandle, Vec<ColliderHandle>)> {
        let builder = match desc.body_type {
            BodyType::Fixed => RigidBodyBuilder::fixed(),
            BodyType::Dynamic => RigidBodyBuilder::dynamic(),
            BodyType::KinematicPositionBased => RigidBodyBuilder::kinematic_position_based(),
        };
        let rigid_body = builder
            .position(to_na_isometry(desc.position, desc.rotation))
            .can_sleep(desc.can_sleep)
            .sleeping(desc.sleeping)
            .enabled(desc.enabled)
            .build();
        let handle = self.bodies.insert(rigid_body);

        let mut attached = Vec::with_capacity(desc.colliders.len());
        for collider in &desc.colliders {
            attached.push(self.create_collider(collider, handle)?);
        }
        tracing::debug!(
            body = ?handle,
            kind = ?desc.body_type,
            colliders = attached.len(),
            "created rigid body"
        );
        Ok((handle, attached))
    }

    /// Attach one collider to an existing body.
    pub fn create_collider(
        &mut self,
        desc: &ColliderDesc,
        parent: RigidBodyHandle,
    ) -> PhysicsResult<ColliderHandle> {
        let shape = Self::shared_shape(&desc.shape)?;
        let mut builder =
            ColliderBuilder::new(shape).position(to_na_isometry(desc.position, desc.rotation));
        if let Some(friction) = desc.friction {
            builder = builder.friction(friction);
        }
        if let Some(restitution) = desc.restitution {
            builder = builder.restitution(restitution);
        }
        if let Some(mass) = desc.mass {
            builder = builder.mass(mass);
        }
        if let Some(category) = desc.category {
            builder = builder.collision_groups(category.interaction_groups());
        }
        Ok(self
            .colliders
            .insert_with_parent(builder.build(), parent, &mut self.bodies))
    }

    fn shared_shape(shape: &ColliderShape) -> PhysicsResult<SharedShape> {
        match shape {
            ColliderShape::Trimesh { vertices, indices } => {
                let points: Vec<_> = vertices.iter().map(|v| to_na_point(*v)).collect();
                Ok(SharedShape::trimesh(points, indices.clone()))
            }
            ColliderShape::Hull { points } => {
                let points: Vec<_> = points.iter().map(|p| to_na_point(*p)).collect();
                SharedShape::convex_hull(&points).ok_or(PhysicsError::InvalidHull {
                    points: points.len(),
                })
            }
            ColliderShape::Cuboid { half_extents } => Ok(SharedShape::cuboid(
                half_extents.x,
                half_extents.y,
                half_extents.z,
            )),
            ColliderShape::Cylinder {
                half_height,
                radius,
            } => Ok(SharedShape::cylinder(*half_height, *radius)),
            ColliderShape::Ball { radius } => Ok(SharedShape::ball(*radius)),
        }
    }

    pub fn body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    pub fn body_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle)
    }

    pub fn collider(&self, handle: ColliderHandle) -> Option<&Collider> {
        self.colliders.get(handle)
    }

    pub fn contains_body(&self, handle: RigidBodyHandle) -> bool {
        self.bodies.contains(handle)
    }

    pub fn set_collider_friction(&mut self, handle: ColliderHandle, friction: f32) {
        if let Some(collider) = self.colliders.get_mut(handle) {
            collider.set_friction(friction);
        }
    }

    pub fn set_collider_restitution(&mut self, handle: ColliderHandle, restitution: f32) {
        if let Some(collider) = self.colliders.get_mut(handle) {
            collider.set_restitution(restitution);
        }
    }

    /// Remove a body together with its attached colliders.
    pub fn remove_body(&mut self, handle: RigidBodyHandle) {
        self.bodies.remove(
            handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }

    /// Install the raycast vehicle controller for `chassis`, replacing any
    /// previous one.
    pub fn create_vehicle(&mut self, chassis: RigidBodyHandle) {
        self.vehicle = Some(DynamicRayCastVehicleController::new(chassis));
    }

    pub fn vehicle(&self) -> Option<&DynamicRayCastVehicleController> {
        self.vehicle.as_ref()
    }

    pub fn vehicle_mut(&mut self) -> Option<&mut DynamicRayCastVehicleController> {
        self.vehicle.as_mut()
    }

    /// Advance the simulation by `dt` seconds. Zero-length frames happen on
    /// the first scheduler update and are skipped.
    pub fn step(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        self.integration.dt = dt;
        self.queries.update(&self.colliders);
        if let Some(vehicle) = self.vehicle.as_mut() {
            // Suspension rays must ignore the chassis itself and every other
            // dynamic body, otherwise the vehicle rides its own colliders.
            let filter = QueryFilter::exclude_dynamic().exclude_rigid_body(vehicle.chassis);
            vehicle.update_vehicle(
                dt,
                &mut self.bodies,
                &self.colliders,
                &self.queries,
                filter,
            );
        }
        self.pipeline.step(
            &self.gravity,
            &self.integration,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.queries),
            &(),
            &(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_world() -> PhysicsWorld {
        let mut world = PhysicsWorld::new(Vec3::new(0.0, -9.81, 0.0));
        world
            .create_body(
                &BodyDesc::fixed()
                    .with_collider(ColliderDesc::cuboid(Vec3::new(20.0, 0.1, 20.0))),
            )
            .unwrap();
        world
    }

    #[test]
    fn dynamic_body_falls_and_rests_on_the_ground() {
        let mut world = flat_world();
        let (ball, _) = world
            .create_body(
                &BodyDesc::dynamic()
                    .with_position(Vec3::new(0.0, 3.0, 0.0))
                    .with_collider(ColliderDesc::ball(0.5)),
            )
            .unwrap();

        for _ in 0..300 {
            world.step(1.0 / 60.0);
        }

        let y = world.body(ball).unwrap().translation().y;
        assert!(y > 0.3 && y < 1.0, "ball should rest on the slab, y = {y}");
    }

    #[test]
    fn body_created_sleeping_stays_asleep_and_in_place() {
        let mut world = flat_world();
        let (crate_body, _) = world
            .create_body(
                &BodyDesc::dynamic()
                    .with_position(Vec3::new(0.0, 5.0, 0.0))
                    .with_sleeping(true)
                    .with_collider(ColliderDesc::cuboid(Vec3::splat(0.5))),
            )
            .unwrap();

        for _ in 0..60 {
            world.step(1.0 / 60.0);
        }

        let body = world.body(crate_body).unwrap();
        assert!(body.is_sleeping());
        assert!((body.translation().y - 5.0).abs() < 1e-4);
    }

    #[test]
    fn disabled_body_does_not_simulate() {
        let mut world = flat_world();
        let (ball, _) = world
            .create_body(
                &BodyDesc::dynamic()
                    .with_position(Vec3::new(0.0, 5.0, 0.0))
                    .with_enabled(false)
                    .with_collider(ColliderDesc::ball(0.5)),
            )
            .unwrap();

        for _ in 0..60 {
            world.step(1.0 / 60.0);
        }

        let body = world.body(ball).unwrap();
        assert!(!body.is_enabled());
        assert!((body.translation().y - 5.0).abs() < 1e-4);
    }

    #[test]
    fn kinematic_body_moves_to_its_next_position() {
        let mut world = PhysicsWorld::new(Vec3::new(0.0, -9.81, 0.0));
        let (platform, _) = world
            .create_body(
                &BodyDesc::kinematic().with_collider(ColliderDesc::cuboid(Vec3::new(2.0, 0.2, 2.0))),
            )
            .unwrap();

        world
            .body_mut(platform)
            .unwrap()
            .set_next_kinematic_translation(vector![0.0, 2.0, 0.0]);
        world.step(1.0 / 60.0);

        let y = world.body(platform).unwrap().translation().y;
        assert!((y - 2.0).abs() < 1e-4, "platform should track its target, y = {y}");
    }

    #[test]
    fn convex_hull_builds_from_a_tetrahedron() {
        let mut world = PhysicsWorld::new(Vec3::ZERO);
        let desc = BodyDesc::dynamic().with_collider(ColliderDesc::new(ColliderShape::Hull {
            points: vec![
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(1.0, 0.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
                Vec3::new(0.0, 0.0, 1.0),
            ],
        }));
        let (_, colliders) = world.create_body(&desc).unwrap();
        assert_eq!(colliders.len(), 1);
    }

    #[test]
    fn removing_a_body_removes_its_colliders() {
        let mut world = flat_world();
        let (ball, colliders) = world
            .create_body(
                &BodyDesc::dynamic()
                    .with_position(Vec3::new(0.0, 2.0, 0.0))
                    .with_collider(ColliderDesc::ball(0.5)),
            )
            .unwrap();

        world.remove_body(ball);

        assert!(!world.contains_body(ball));
        assert!(world.collider(colliders[0]).is_none());
    }

    #[test]
    fn collider_material_setters_apply() {
        let mut world = flat_world();
        let (_, colliders) = world
            .create_body(
                &BodyDesc::dynamic()
                    .with_position(Vec3::new(0.0, 2.0, 0.0))
                    .with_collider(ColliderDesc::ball(0.5)),
            )
            .unwrap();

        world.set_collider_friction(colliders[0], 0.9);
        world.set_collider_restitution(colliders[0], 0.4);

        let collider = world.collider(colliders[0]).unwrap();
        assert_eq!(collider.friction(), 0.9);
        assert_eq!(collider.restitution(), 0.4);
    }

    #[test]
    fn category_groups_are_written_to_the_collider() {
        let mut world = flat_world();
        let (_, colliders) = world
            .create_body(
                &BodyDesc::dynamic()
                    .with_position(Vec3::new(0.0, 2.0, 0.0))
                    .with_collider(
                        ColliderDesc::ball(0.5).with_category(CollisionCategory::Vehicle),
                    ),
            )
            .unwrap();

        let groups = world.collider(colliders[0]).unwrap().collision_groups();
        assert_eq!(groups, CollisionCategory::Vehicle.interaction_groups());
    }
}
