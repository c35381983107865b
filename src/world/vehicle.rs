//! The player vehicle: a raycast car driven by named input actions.
//!
//! Frame work is split in two. Before the physics step the vehicle turns
//! input state into engine force, brake and steering on the controller's
//! wheels, plus the occasional jump impulse. After the step it reads the
//! solved chassis and suspension state back and poses the wheel nodes, so
//! visuals always trail the simulation by exactly zero frames.

use glam::{Quat, Vec3};
use rapier3d::control::WheelTuning;
use rapier3d::na;
use rapier3d::prelude::RigidBodyHandle;

use crate::config::VehicleSettings;
use crate::inputs::{actions, Inputs};
use crate::physics::{BodyDesc, ColliderDesc, CollisionCategory, PhysicsWorld};
use crate::scene::{NodeId, Scene};
use crate::ticker::Frame;
use crate::utils::math::{exp_approach, from_na_quat, to_na_point, to_na_vector};
use crate::world::{ObjectId, Objects, VisualDesc, WorldError, WorldResult};

struct WheelVisual {
    node: NodeId,
    base: Vec3,
    steered: bool,
    suspension: f32,
}

pub struct Vehicle {
    object: ObjectId,
    chassis: RigidBodyHandle,
    chassis_node: NodeId,
    wheels: Vec<WheelVisual>,
    tuning: VehicleSettings,
    engine_force: f32,
    steering: f32,
    visual_steering: f32,
    roll: f32,
    up: Vec3,
    contact_count: usize,
}

impl Vehicle {
    /// Build the chassis entity, install the raycast controller and hang
    /// four wheels off it. Wheel anchors mirror the configured offset to the
    /// four corners; the pair on the positive-z side steers.
    pub fn new(
        scene: &mut Scene,
        physics: &mut PhysicsWorld,
        objects: &mut Objects,
        settings: &VehicleSettings,
    ) -> WorldResult<Self> {
        let chassis_node = scene.spawn("vehicleChassis", scene.root())?;
        let desc = BodyDesc::dynamic()
            .with_position(settings.spawn())
            .with_can_sleep(false)
            .with_collider(
                ColliderDesc::cuboid(settings.chassis_half())
                    .with_category(CollisionCategory::Vehicle),
            );
        let object = objects.add(scene, physics, Some(VisualDesc::new(chassis_node)), Some(&desc))?;
        let chassis = objects
            .body_of(object)
            .ok_or(WorldError::MissingBody { id: object })?;
        physics.create_vehicle(chassis);

        let anchor = settings.wheel_anchor();
        let offsets = [
            Vec3::new(anchor.x, anchor.y, anchor.z),
            Vec3::new(anchor.x, anchor.y, -anchor.z),
            Vec3::new(-anchor.x, anchor.y, anchor.z),
            Vec3::new(-anchor.x, anchor.y, -anchor.z),
        ];

        {
            let controller = physics
                .vehicle_mut()
                .ok_or(WorldError::MissingBody { id: object })?;
            for offset in offsets {
                let wheel = controller.add_wheel(
                    to_na_point(offset),
                    -na::Vector3::y(),
                    -na::Vector3::x(),
                    settings.suspension_rest_length,
                    settings.wheel_radius,
                    &WheelTuning::default(),
                );
                wheel.suspension_stiffness = settings.suspension_stiffness;
                wheel.damping_compression = settings.damping_compression;
                wheel.damping_relaxation = settings.damping_relaxation;
                wheel.max_suspension_travel = settings.max_suspension_travel;
                wheel.max_suspension_force = settings.max_suspension_force;
                wheel.friction_slip = settings.friction_slip;
                wheel.side_friction_stiffness = settings.side_friction_stiffness;
            }
        }

        let mut wheels = Vec::with_capacity(offsets.len());
        for (index, offset) in offsets.iter().enumerate() {
            let node = scene.spawn(&format!("vehicleWheel{index}"), chassis_node)?;
            scene.node_mut(node)?.position = *offset;
            wheels.push(WheelVisual {
                node,
                base: *offset,
                steered: offset.z > 0.0,
                suspension: settings.suspension_rest_length,
            });
        }

        tracing::info!(object = %object, "vehicle assembled");
        Ok(Self {
            object,
            chassis,
            chassis_node,
            wheels,
            tuning: settings.clone(),
            engine_force: 0.0,
            steering: 0.0,
            visual_steering: 0.0,
            roll: 0.0,
            up: Vec3::Y,
            contact_count: 0,
        })
    }

    /// Pre-physics phase: push input state into the wheel controller.
    ///
    /// Holding brake halves the engine force and swaps the light rolling
    /// brake for the real one. The jump fires only on the frame the action
    /// is first pressed, and only while at least one wheel touched ground on
    /// the previous step.
    pub fn update_pre(&mut self, inputs: &Inputs, physics: &mut PhysicsWorld) -> WorldResult<()> {
        let throttle = (inputs.is_held(actions::FORWARD) as i32
            - inputs.is_held(actions::BACKWARD) as i32) as f32;
        let steer_input = (inputs.is_held(actions::LEFT) as i32
            - inputs.is_held(actions::RIGHT) as i32) as f32;

        let mut engine = self.tuning.engine_force * throttle;
        if inputs.is_held(actions::BOOST) {
            engine *= self.tuning.boost_multiplier;
        }
        let brake = if inputs.is_held(actions::BRAKE) {
            engine *= 0.5;
            self.tuning.brake_strength
        } else {
            self.tuning.idle_brake
        };
        let steering = self.tuning.max_steering * steer_input;

        let controller = physics
            .vehicle_mut()
            .ok_or(WorldError::MissingBody { id: self.object })?;
        for (index, wheel) in controller.wheels_mut().iter_mut().enumerate() {
            wheel.engine_force = engine;
            wheel.brake = brake;
            if self.wheels.get(index).map(|w| w.steered).unwrap_or(false) {
                wheel.steering = steering;
            }
        }
        self.engine_force = engine;
        self.steering = steering;

        if inputs.just_pressed(actions::JUMP) && self.contact_count > 0 {
            let body = physics
                .body_mut(self.chassis)
                .ok_or(WorldError::MissingBody { id: self.object })?;
            let mass = body.mass();
            body.apply_impulse(to_na_vector(self.up * self.tuning.jump_force * mass), true);
            if steer_input != 0.0 {
                body.apply_torque_impulse(
                    to_na_vector(self.up * (self.tuning.jump_spin * mass * steer_input)),
                    true,
                );
            }
            tracing::debug!(contacts = self.contact_count, "vehicle jump");
        }
        Ok(())
    }

    /// Post-physics phase: read the solved state back and pose the wheels.
    pub fn update_post(
        &mut self,
        scene: &mut Scene,
        physics: &PhysicsWorld,
        frame: &Frame,
    ) -> WorldResult<()> {
        let body = physics
            .body(self.chassis)
            .ok_or(WorldError::MissingBody { id: self.object })?;
        self.up = from_na_quat(body.rotation()) * Vec3::Y;

        if let Some(controller) = physics.vehicle() {
            let mut contacts = 0;
            for (index, wheel) in controller.wheels().iter().enumerate() {
                let info = wheel.raycast_info();
                if info.is_in_contact {
                    contacts += 1;
                }
                if let Some(visual) = self.wheels.get_mut(index) {
                    visual.suspension = info.suspension_length;
                }
            }
            self.contact_count = contacts;
        }

        self.visual_steering = exp_approach(
            self.visual_steering,
            self.steering,
            self.tuning.steering_smoothing * frame.delta_scaled,
        );
        self.roll += self.engine_force * self.tuning.roll_rate * frame.delta_scaled;

        for visual in &self.wheels {
            let yaw = if visual.steered {
                self.visual_steering
            } else {
                0.0
            };
            if let Some(node) = scene.get_mut(visual.node) {
                node.rotation = Quat::from_rotation_y(yaw) * Quat::from_rotation_x(-self.roll);
                node.position = Vec3::new(
                    visual.base.x,
                    visual.base.y - visual.suspension,
                    visual.base.z,
                );
            }
        }

        tracing::trace!(
            speed = body.linvel().norm(),
            contacts = self.contact_count,
            engine = self.engine_force,
            "vehicle frame"
        );
        Ok(())
    }

    pub fn object(&self) -> ObjectId {
        self.object
    }

    pub fn chassis(&self) -> RigidBodyHandle {
        self.chassis
    }

    pub fn chassis_node(&self) -> NodeId {
        self.chassis_node
    }

    pub fn wheel_nodes(&self) -> Vec<NodeId> {
        self.wheels.iter().map(|w| w.node).collect()
    }

    pub fn contact_count(&self) -> usize {
        self.contact_count
    }

    pub fn is_grounded(&self) -> bool {
        self.contact_count > 0
    }

    pub fn engine_force(&self) -> f32 {
        self.engine_force
    }

    pub fn steering(&self) -> f32 {
        self.steering
    }

    pub fn speed(&self, physics: &PhysicsWorld) -> f32 {
        physics
            .body(self.chassis)
            .map(|b| b.linvel().norm())
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn frame(tick: u64) -> Frame {
        Frame {
            tick,
            delta: DT,
            elapsed: tick as f32 * DT,
            delta_scaled: DT,
            elapsed_scaled: tick as f32 * DT,
        }
    }

    fn test_inputs() -> Inputs {
        let mut inputs = Inputs::new();
        for action in [
            actions::FORWARD,
            actions::BACKWARD,
            actions::LEFT,
            actions::RIGHT,
            actions::BOOST,
            actions::BRAKE,
            actions::JUMP,
        ] {
            // Key codes named after the actions keep the tests terse.
            inputs.add_map(action, Vec::new(), vec![action.to_string()]);
        }
        inputs
    }

    struct Rig {
        scene: Scene,
        physics: PhysicsWorld,
        objects: Objects,
        vehicle: Vehicle,
        inputs: Inputs,
        tick: u64,
    }

    impl Rig {
        fn new() -> Self {
            let mut scene = Scene::new();
            let mut physics = PhysicsWorld::new(Vec3::new(0.0, -9.81, 0.0));
            let mut objects = Objects::new();
            physics
                .create_body(
                    &BodyDesc::fixed()
                        .with_collider(ColliderDesc::cuboid(Vec3::new(100.0, 0.1, 100.0))),
                )
                .unwrap();
            let vehicle =
                Vehicle::new(&mut scene, &mut physics, &mut objects, &VehicleSettings::default())
                    .unwrap();
            Self {
                scene,
                physics,
                objects,
                vehicle,
                inputs: test_inputs(),
                tick: 0,
            }
        }

        fn advance(&mut self) {
            let f = frame(self.tick);
            self.inputs.latch();
            self.vehicle.update_pre(&self.inputs, &mut self.physics).unwrap();
            self.physics.step(DT);
            self.objects.update(&mut self.scene, &mut self.physics, &f);
            self.vehicle.update_post(&mut self.scene, &self.physics, &f).unwrap();
            self.tick += 1;
        }

        fn settle(&mut self) {
            for _ in 0..240 {
                self.advance();
            }
        }

        fn chassis_position(&self) -> Vec3 {
            crate::utils::math::from_na_vector(
                self.physics.body(self.vehicle.chassis()).unwrap().translation(),
            )
        }
    }

    #[test]
    fn vehicle_settles_on_all_four_wheels() {
        let mut rig = Rig::new();
        rig.settle();

        assert_eq!(rig.vehicle.contact_count(), 4);
        let position = rig.chassis_position();
        assert!(
            position.y > 0.4 && position.y < 1.3,
            "chassis should hang on its suspension, y = {}",
            position.y
        );
        assert!(rig.vehicle.speed(&rig.physics) < 0.5);
    }

    #[test]
    fn engine_force_table_follows_the_held_actions() {
        let mut rig = Rig::new();
        let base = VehicleSettings::default().engine_force;

        let engine_and_brake = |rig: &Rig| {
            let wheel = &rig.physics.vehicle().unwrap().wheels()[0];
            (wheel.engine_force, wheel.brake)
        };

        rig.inputs.key_down(actions::FORWARD);
        rig.inputs.latch();
        rig.vehicle.update_pre(&rig.inputs, &mut rig.physics).unwrap();
        assert_eq!(engine_and_brake(&rig), (base, 0.04));

        rig.inputs.key_down(actions::BOOST);
        rig.inputs.latch();
        rig.vehicle.update_pre(&rig.inputs, &mut rig.physics).unwrap();
        assert_eq!(engine_and_brake(&rig), (base * 2.5, 0.04));

        rig.inputs.key_up(actions::BOOST);
        rig.inputs.key_down(actions::BRAKE);
        rig.inputs.latch();
        rig.vehicle.update_pre(&rig.inputs, &mut rig.physics).unwrap();
        assert_eq!(engine_and_brake(&rig), (base * 0.5, 0.5));

        rig.inputs.key_up(actions::FORWARD);
        rig.inputs.key_up(actions::BRAKE);
        rig.inputs.latch();
        rig.vehicle.update_pre(&rig.inputs, &mut rig.physics).unwrap();
        assert_eq!(engine_and_brake(&rig), (0.0, 0.04));
    }

    #[test]
    fn reverse_throttle_is_negative_engine_force() {
        let mut rig = Rig::new();
        rig.inputs.key_down(actions::BACKWARD);
        rig.inputs.latch();
        rig.vehicle.update_pre(&rig.inputs, &mut rig.physics).unwrap();
        assert_eq!(rig.vehicle.engine_force(), -VehicleSettings::default().engine_force);
    }

    #[test]
    fn steering_reaches_only_the_front_wheel_pair() {
        let mut rig = Rig::new();
        rig.inputs.key_down(actions::LEFT);
        rig.inputs.latch();
        rig.vehicle.update_pre(&rig.inputs, &mut rig.physics).unwrap();

        let max = VehicleSettings::default().max_steering;
        let wheels = rig.physics.vehicle().unwrap().wheels();
        assert_eq!(wheels[0].steering, max);
        assert_eq!(wheels[1].steering, 0.0);
        assert_eq!(wheels[2].steering, max);
        assert_eq!(wheels[3].steering, 0.0);
    }

    #[test]
    fn holding_forward_drives_the_chassis_along_z() {
        let mut rig = Rig::new();
        rig.settle();
        let start = rig.chassis_position();

        rig.inputs.key_down(actions::FORWARD);
        for _ in 0..120 {
            rig.advance();
        }
        let end = rig.chassis_position();

        assert!(
            (end.z - start.z).abs() > 1.0,
            "vehicle barely moved: {start:?} -> {end:?}"
        );
        assert!(
            (end.x - start.x).abs() < (end.z - start.z).abs() / 2.0,
            "vehicle should drive roughly straight"
        );
    }

    #[test]
    fn boost_covers_more_ground_than_plain_throttle() {
        let run = |boost: bool| {
            let mut rig = Rig::new();
            rig.settle();
            let start = rig.chassis_position();
            rig.inputs.key_down(actions::FORWARD);
            if boost {
                rig.inputs.key_down(actions::BOOST);
            }
            for _ in 0..90 {
                rig.advance();
            }
            (rig.chassis_position().z - start.z).abs()
        };

        let plain = run(false);
        let boosted = run(true);
        assert!(
            boosted > plain * 1.3,
            "boost should clearly outrun plain throttle: {boosted} vs {plain}"
        );
    }

    #[test]
    fn jump_needs_ground_contact() {
        let mut rig = Rig::new();
        // Never settled: contact state is still empty.
        assert_eq!(rig.vehicle.contact_count(), 0);

        rig.inputs.key_down(actions::JUMP);
        rig.inputs.latch();
        rig.vehicle.update_pre(&rig.inputs, &mut rig.physics).unwrap();

        let vy = rig.physics.body(rig.vehicle.chassis()).unwrap().linvel().y;
        assert_eq!(vy, 0.0, "airborne jump must not apply an impulse");
    }

    #[test]
    fn jump_fires_once_per_press() {
        let mut rig = Rig::new();
        rig.settle();

        rig.inputs.key_down(actions::JUMP);
        rig.inputs.latch();
        rig.vehicle.update_pre(&rig.inputs, &mut rig.physics).unwrap();
        let after_first = rig.physics.body(rig.vehicle.chassis()).unwrap().linvel().y;
        assert!(
            after_first > 2.0,
            "grounded jump should kick upward, vy = {after_first}"
        );

        // Still held on the next frame: no second impulse.
        rig.inputs.latch();
        rig.vehicle.update_pre(&rig.inputs, &mut rig.physics).unwrap();
        let after_second = rig.physics.body(rig.vehicle.chassis()).unwrap().linvel().y;
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn jump_spin_follows_the_held_steering_side() {
        let mut rig = Rig::new();
        rig.settle();

        rig.inputs.key_down(actions::JUMP);
        rig.inputs.key_down(actions::LEFT);
        rig.inputs.latch();
        rig.vehicle.update_pre(&rig.inputs, &mut rig.physics).unwrap();

        let spin = rig.physics.body(rig.vehicle.chassis()).unwrap().angvel().y;
        assert!(spin > 0.0, "left jump should spin counter-clockwise, got {spin}");
    }

    #[test]
    fn wheel_visuals_track_suspension_and_steering() {
        let mut rig = Rig::new();
        rig.settle();
        rig.inputs.key_down(actions::LEFT);
        for _ in 0..60 {
            rig.advance();
        }

        let nodes = rig.vehicle.wheel_nodes();
        let steered = rig.scene.get(nodes[0]).unwrap();
        let trailing = rig.scene.get(nodes[1]).unwrap();

        // Yaw shows up as a z component of the rotated x axis; the rear pair
        // only rolls, which leaves its x axis alone.
        assert!((steered.rotation * Vec3::X).z.abs() > 0.3);
        assert!((trailing.rotation * Vec3::X).z.abs() < 1e-4);

        // Wheels hang below their anchors by the solved suspension length.
        let anchor_y = VehicleSettings::default().wheel_offset[1];
        assert!(steered.position.y < anchor_y);
    }

    #[test]
    fn registry_reset_returns_the_vehicle_to_spawn() {
        let mut rig = Rig::new();
        rig.settle();
        rig.inputs.key_down(actions::FORWARD);
        for _ in 0..120 {
            rig.advance();
        }
        assert!((rig.chassis_position().z).abs() > 1.0);

        let id = rig.vehicle.object();
        let tick = rig.tick;
        rig.objects
            .reset_object(&mut rig.scene, &mut rig.physics, id, tick)
            .unwrap();
        rig.inputs.key_up(actions::FORWARD);
        rig.advance();
        rig.advance();

        let spawn = VehicleSettings::default().spawn();
        let position = rig.chassis_position();
        assert!((position.x - spawn.x).abs() < 0.2);
        assert!((position.z - spawn.z).abs() < 0.2);
        assert!(rig
            .physics
            .body(rig.vehicle.chassis())
            .unwrap()
            .is_enabled());
    }
}
