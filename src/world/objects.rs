//! Registry pairing scene nodes with rigid bodies.
//!
//! A registered object carries a visual node, a rigid body, or both. After
//! every physics step [`Objects::update`] copies body poses onto the nodes
//! of fully paired objects; the copy is an exact transfer, never an
//! interpolation. Sleeping and disabled bodies are skipped unless a forced
//! sync is pending, which is how kinematic movers and freshly reset objects
//! publish their poses.
//!
//! Resetting never re-enables a body in the same tick. The body is switched
//! off, moved home, and a deferred entry re-enables it on the next registry
//! update, so the solver never sees the teleport.

use std::collections::BTreeMap;
use std::fmt;

use glam::{Quat, Vec3};
use rapier3d::na;
use rapier3d::prelude::{ColliderHandle, RigidBodyHandle};

use crate::physics::{
    infer_colliders, BodyDesc, BodyType, ColliderDesc, CollisionCategory, PhysicsWorld,
};
use crate::scene::{NodeId, Scene};
use crate::ticker::Frame;
use crate::utils::math::{from_na_quat, from_na_vector, to_na_quat, to_na_vector};
use crate::world::{WorldError, WorldResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(u64);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Visual half of a registration. A `None` parent keeps an attached node
/// where it is and puts a detached one under the scene root.
#[derive(Debug, Clone, Copy)]
pub struct VisualDesc {
    pub node: NodeId,
    pub parent: Option<NodeId>,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
}

impl VisualDesc {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            parent: None,
            cast_shadow: true,
            receive_shadow: true,
        }
    }

    pub fn with_parent(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_shadows(mut self, cast: bool, receive: bool) -> Self {
        self.cast_shadow = cast;
        self.receive_shadow = receive;
        self
    }
}

/// Call-site adjustments applied on top of what a model's markers infer.
#[derive(Debug, Clone)]
pub struct ModelOverrides {
    pub parent: Option<NodeId>,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    pub position: Option<Vec3>,
    pub rotation: Option<Quat>,
    pub body_type: Option<BodyType>,
    pub sleeping: bool,
    pub mass: Option<f32>,
    pub friction: Option<f32>,
    pub restitution: Option<f32>,
    pub category: Option<CollisionCategory>,
    pub extra_colliders: Vec<ColliderDesc>,
}

impl Default for ModelOverrides {
    fn default() -> Self {
        Self {
            parent: None,
            cast_shadow: true,
            receive_shadow: true,
            position: None,
            rotation: None,
            body_type: None,
            sleeping: false,
            mass: None,
            friction: None,
            restitution: None,
            category: None,
            extra_colliders: Vec::new(),
        }
    }
}

/// Read-only snapshot of an object's physical bookkeeping, mostly for
/// diagnostics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityState {
    pub body_type: BodyType,
    pub enabled: bool,
    pub sleeping: bool,
    pub needs_forced_sync: bool,
}

#[derive(Debug, Clone, Copy)]
struct InitialPose {
    position: Vec3,
    rotation: Quat,
    sleeping: bool,
}

struct VisualPart {
    node: NodeId,
    home_parent: NodeId,
}

struct PhysicalPart {
    body: RigidBodyHandle,
    colliders: Vec<ColliderHandle>,
    body_type: BodyType,
    initial: InitialPose,
}

struct Entity {
    visual: Option<VisualPart>,
    physical: Option<PhysicalPart>,
    enabled: bool,
    needs_forced_sync: bool,
}

#[derive(Debug, Clone, Copy)]
struct DeferredEnable {
    id: ObjectId,
    run_at: u64,
    sleep: bool,
}

/// The registry itself. One per running world.
#[derive(Default)]
pub struct Objects {
    entities: BTreeMap<ObjectId, Entity>,
    next_id: u64,
    deferred: Vec<DeferredEnable>,
    respawn_rule: Option<Box<dyn Fn(ObjectId, Vec3) -> bool>>,
}

impl Objects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the rule that decides when a synced dynamic object should be
    /// sent back to its spawn pose, e.g. after falling off the level.
    pub fn set_respawn_rule(&mut self, rule: impl Fn(ObjectId, Vec3) -> bool + 'static) {
        self.respawn_rule = Some(Box::new(rule));
    }

    /// Register a visual node, a freshly created rigid body, or both.
    ///
    /// The visual always ends up in the graph. An explicit
    /// [`VisualDesc::parent`] wins; otherwise an attached node keeps its
    /// place and a detached one goes under the scene root. Passing neither
    /// descriptor is tolerated and yields an inert id nothing ever touches
    /// again.
    pub fn add(
        &mut self,
        scene: &mut Scene,
        physics: &mut PhysicsWorld,
        visual: Option<VisualDesc>,
        desc: Option<&BodyDesc>,
    ) -> WorldResult<ObjectId> {
        let visual = match visual {
            Some(v) => {
                let parent = v
                    .parent
                    .or_else(|| scene.parent(v.node))
                    .unwrap_or_else(|| scene.root());
                if scene.parent(v.node) != Some(parent) {
                    scene.attach(v.node, parent)?;
                }
                apply_shadow_flags(scene, v.node, v.cast_shadow, v.receive_shadow);
                Some(VisualPart {
                    node: v.node,
                    home_parent: parent,
                })
            }
            None => None,
        };
        let physical = match desc {
            Some(desc) => {
                let (body, colliders) = physics.create_body(desc)?;
                Some(PhysicalPart {
                    body,
                    colliders,
                    body_type: desc.body_type,
                    initial: InitialPose {
                        position: desc.position,
                        rotation: desc.rotation,
                        sleeping: desc.sleeping,
                    },
                })
            }
            None => None,
        };

        // Bodies the sync loop will never visit still need their visual
        // placed once, now.
        if let (Some(v), Some(desc)) = (&visual, desc) {
            if desc.sleeping || !desc.enabled || desc.body_type == BodyType::Fixed {
                if let Some(node) = scene.get_mut(v.node) {
                    node.position = desc.position;
                    node.rotation = desc.rotation;
                }
            }
        }

        let id = ObjectId(self.next_id);
        self.next_id += 1;
        tracing::debug!(
            object = %id,
            node = ?visual.as_ref().map(|v| v.node),
            kind = ?desc.map(|d| d.body_type),
            "object registered"
        );
        self.entities.insert(
            id,
            Entity {
                visual,
                physical,
                enabled: desc.map(|d| d.enabled).unwrap_or(true),
                needs_forced_sync: false,
            },
        );
        Ok(id)
    }

    /// Build a body descriptor for a model by consuming its `physical*`
    /// markers, then layering the overrides on top. `None` means the model
    /// carries no physics at all.
    pub fn describe_from_model(
        scene: &mut Scene,
        model: NodeId,
        overrides: &ModelOverrides,
    ) -> WorldResult<Option<BodyDesc>> {
        let inferred = infer_colliders(scene, model)?;
        let Some(body_type) = overrides.body_type.or(inferred.body_type) else {
            return Ok(None);
        };

        let node = scene.node(model)?;
        let position = overrides.position.unwrap_or(node.position);
        let rotation = overrides.rotation.unwrap_or(node.rotation);

        let mut colliders = inferred.colliders;
        for collider in &mut colliders {
            if overrides.friction.is_some() {
                collider.friction = overrides.friction;
            }
            if overrides.restitution.is_some() {
                collider.restitution = overrides.restitution;
            }
            if overrides.category.is_some() {
                collider.category = overrides.category;
            }
        }
        // An override mass is the whole model's mass, spread across the
        // inferred colliders.
        if let Some(mass) = overrides.mass {
            let share = mass / colliders.len().max(1) as f32;
            for collider in &mut colliders {
                collider.mass = Some(share);
            }
        }
        colliders.extend(overrides.extra_colliders.iter().cloned());

        let mut desc = BodyDesc::new(body_type)
            .with_position(position)
            .with_rotation(rotation)
            .with_sleeping(overrides.sleeping);
        desc.colliders = colliders;
        Ok(Some(desc))
    }

    /// Infer physics from a model's markers and register it. Purely visual
    /// models are registered without a body and never synced.
    pub fn add_from_model(
        &mut self,
        scene: &mut Scene,
        physics: &mut PhysicsWorld,
        model: NodeId,
        overrides: &ModelOverrides,
    ) -> WorldResult<ObjectId> {
        if let Some(parent) = overrides.parent {
            scene.attach(model, parent)?;
        }
        let desc = Self::describe_from_model(scene, model, overrides)?;
        let visual = VisualDesc::new(model)
            .with_shadows(overrides.cast_shadow, overrides.receive_shadow);
        self.add(scene, physics, Some(visual), desc.as_ref())
    }

    /// Send one object back to its spawn pose.
    ///
    /// The body is disabled for the rest of the tick and re-enabled (and
    /// re-slept, if it spawned asleep) by the next [`Objects::update`].
    /// Fixed and body-less objects never move, so resetting them is a no-op,
    /// and so is resetting a disabled object: only [`Objects::enable`] brings
    /// one back.
    pub fn reset_object(
        &mut self,
        scene: &mut Scene,
        physics: &mut PhysicsWorld,
        id: ObjectId,
        now_tick: u64,
    ) -> WorldResult<()> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(WorldError::UnknownObject { id })?;
        if !entity.enabled {
            tracing::debug!(object = %id, "reset ignored, object is disabled");
            return Ok(());
        }
        let (handle, body_type, initial) = match &entity.physical {
            Some(p) => (p.body, p.body_type, p.initial),
            None => {
                tracing::debug!(object = %id, "reset ignored, object has no body");
                return Ok(());
            }
        };
        if body_type == BodyType::Fixed {
            tracing::debug!(object = %id, "reset ignored for fixed body");
            return Ok(());
        }
        let body = physics
            .body_mut(handle)
            .ok_or(WorldError::MissingBody { id })?;

        body.set_enabled(false);
        body.set_translation(to_na_vector(initial.position), false);
        body.set_rotation(to_na_quat(initial.rotation), false);
        body.set_linvel(na::Vector3::zeros(), false);
        body.set_angvel(na::Vector3::zeros(), false);
        body.reset_forces(false);
        body.reset_torques(false);

        if let Some(visual) = &entity.visual {
            if let Some(node) = scene.get_mut(visual.node) {
                node.position = initial.position;
                node.rotation = initial.rotation;
            }
        }
        entity.needs_forced_sync = true;

        // One pending re-enable per object, whichever reset came last.
        self.deferred.retain(|d| d.id != id);
        self.deferred.push(DeferredEnable {
            id,
            run_at: now_tick + 1,
            sleep: initial.sleeping,
        });
        tracing::debug!(object = %id, tick = now_tick, "object reset, re-enable deferred");
        Ok(())
    }

    /// Reset every registered object that can move.
    pub fn reset_all(
        &mut self,
        scene: &mut Scene,
        physics: &mut PhysicsWorld,
        now_tick: u64,
    ) -> WorldResult<()> {
        let ids: Vec<_> = self.entities.keys().copied().collect();
        tracing::info!(count = ids.len(), "resetting all objects");
        for id in ids {
            self.reset_object(scene, physics, id, now_tick)?;
        }
        Ok(())
    }

    /// Take an object out of the world: body switched off, velocities
    /// cleared, visual detached from the graph.
    pub fn disable(
        &mut self,
        scene: &mut Scene,
        physics: &mut PhysicsWorld,
        id: ObjectId,
    ) -> WorldResult<()> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(WorldError::UnknownObject { id })?;
        if !entity.enabled {
            tracing::debug!(object = %id, "disable ignored, already disabled");
            return Ok(());
        }
        if let Some(physical) = &entity.physical {
            let body = physics
                .body_mut(physical.body)
                .ok_or(WorldError::MissingBody { id })?;
            body.set_enabled(false);
            body.set_linvel(na::Vector3::zeros(), false);
            body.set_angvel(na::Vector3::zeros(), false);
            body.reset_forces(false);
            body.reset_torques(false);
        }
        if let Some(visual) = &mut entity.visual {
            if let Some(parent) = scene.parent(visual.node) {
                visual.home_parent = parent;
            }
            scene.detach(visual.node)?;
        }
        self.deferred.retain(|d| d.id != id);
        entity.enabled = false;
        tracing::debug!(object = %id, "object disabled");
        Ok(())
    }

    /// Put a disabled object back: body switched on, visual re-attached to
    /// the parent it had when disabled.
    pub fn enable(
        &mut self,
        scene: &mut Scene,
        physics: &mut PhysicsWorld,
        id: ObjectId,
    ) -> WorldResult<()> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(WorldError::UnknownObject { id })?;
        if entity.enabled {
            tracing::debug!(object = %id, "enable ignored, already enabled");
            return Ok(());
        }
        if let Some(physical) = &entity.physical {
            let body = physics
                .body_mut(physical.body)
                .ok_or(WorldError::MissingBody { id })?;
            body.set_enabled(true);
        }
        if let Some(visual) = &entity.visual {
            let parent = if scene.get(visual.home_parent).is_some() {
                visual.home_parent
            } else {
                scene.root()
            };
            scene.attach(visual.node, parent)?;
        }
        entity.enabled = true;
        if entity.physical.is_some() {
            entity.needs_forced_sync = true;
        }
        tracing::debug!(object = %id, "object enabled");
        Ok(())
    }

    /// Per-frame registry work: run due re-enables, then copy body poses
    /// onto visual nodes and apply the respawn rule.
    pub fn update(&mut self, scene: &mut Scene, physics: &mut PhysicsWorld, frame: &Frame) {
        let due: Vec<DeferredEnable> = {
            let (ready, pending) = self
                .deferred
                .drain(..)
                .partition(|d| d.run_at <= frame.tick);
            self.deferred = pending;
            ready
        };
        for deferred in due {
            let Some(handle) = self
                .entities
                .get(&deferred.id)
                .and_then(|e| e.physical.as_ref())
                .map(|p| p.body)
            else {
                continue;
            };
            if let Some(body) = physics.body_mut(handle) {
                body.set_enabled(true);
                if deferred.sleep {
                    body.sleep();
                }
                tracing::debug!(object = %deferred.id, sleep = deferred.sleep, "deferred re-enable ran");
            }
        }

        let mut respawns = Vec::new();
        for (&id, entity) in self.entities.iter_mut() {
            let Some(physical) = &entity.physical else {
                continue;
            };
            let Some(body) = physics.body(physical.body) else {
                tracing::warn!(object = %id, "rigid body missing during sync");
                continue;
            };
            if (!body.is_enabled() || body.is_sleeping()) && !entity.needs_forced_sync {
                continue;
            }
            let position = from_na_vector(body.translation());
            let rotation = from_na_quat(body.rotation());
            if let Some(visual) = &entity.visual {
                if let Some(node) = scene.get_mut(visual.node) {
                    node.position = position;
                    node.rotation = rotation;
                }
            }
            entity.needs_forced_sync = false;

            if physical.body_type == BodyType::Dynamic {
                if let Some(rule) = &self.respawn_rule {
                    if rule(id, position) {
                        respawns.push(id);
                    }
                }
            }
        }

        for id in respawns {
            tracing::info!(object = %id, "respawn rule fired");
            if let Err(error) = self.reset_object(scene, physics, id, frame.tick) {
                tracing::warn!(object = %id, %error, "respawn reset failed");
            }
        }
    }

    /// Make the next update copy this object's pose even if the body is
    /// asleep or disabled.
    pub fn force_sync(&mut self, id: ObjectId) -> WorldResult<()> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(WorldError::UnknownObject { id })?;
        entity.needs_forced_sync = true;
        Ok(())
    }

    /// Snapshot an object's physical bookkeeping. Errors for ids without a
    /// body, since there is nothing to report.
    pub fn state(&self, physics: &PhysicsWorld, id: ObjectId) -> WorldResult<EntityState> {
        let entity = self.entities.get(&id).ok_or(WorldError::UnknownObject { id })?;
        let physical = entity
            .physical
            .as_ref()
            .ok_or(WorldError::MissingBody { id })?;
        let body = physics
            .body(physical.body)
            .ok_or(WorldError::MissingBody { id })?;
        Ok(EntityState {
            body_type: physical.body_type,
            enabled: entity.enabled,
            sleeping: body.is_sleeping(),
            needs_forced_sync: entity.needs_forced_sync,
        })
    }

    pub fn is_enabled(&self, id: ObjectId) -> bool {
        self.entities.get(&id).map(|e| e.enabled).unwrap_or(false)
    }

    pub fn body_of(&self, id: ObjectId) -> Option<RigidBodyHandle> {
        self.entities
            .get(&id)
            .and_then(|e| e.physical.as_ref())
            .map(|p| p.body)
    }

    pub fn colliders_of(&self, id: ObjectId) -> &[ColliderHandle] {
        self.entities
            .get(&id)
            .and_then(|e| e.physical.as_ref())
            .map(|p| p.colliders.as_slice())
            .unwrap_or(&[])
    }

    pub fn node_of(&self, id: ObjectId) -> Option<NodeId> {
        self.entities
            .get(&id)
            .and_then(|e| e.visual.as_ref())
            .map(|v| v.node)
    }

    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.entities.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

fn apply_shadow_flags(scene: &mut Scene, node: NodeId, cast: bool, receive: bool) {
    let mut targets = scene.descendants(node);
    targets.push(node);
    for id in targets {
        if let Some(n) = scene.get_mut(id) {
            n.cast_shadow = cast;
            n.receive_shadow = receive;
        }
    }
}
