//! Runtime assembly: the scene, physics world, registry, inputs and vehicle
//! wired into one frame loop.

use glam::Vec3;
use rand::Rng;

use crate::config::Settings;
use crate::inputs::{actions, Inputs};
use crate::physics::{BodyDesc, ColliderDesc, PhysicsWorld};
use crate::scene::{MeshData, NodeId, Scene};
use crate::ticker::{Frame, TickPhase, Ticker};
use crate::utils::math::to_na_vector;
use crate::world::{ModelOverrides, ObjectId, Objects, Vehicle, VisualDesc, WorldResult};

/// Kinematic mover that sways sideways on a sine path.
pub struct Platform {
    object: ObjectId,
    origin: Vec3,
    amplitude: f32,
    rate: f32,
}

/// Everything a frame touches. The ticker context type.
pub struct Runtime {
    pub settings: Settings,
    pub scene: Scene,
    pub physics: PhysicsWorld,
    pub objects: Objects,
    pub inputs: Inputs,
    pub vehicle: Vehicle,
    pub platform: Option<Platform>,
}

impl Runtime {
    pub fn new(settings: Settings) -> WorldResult<Self> {
        let mut scene = Scene::new();
        let mut physics = PhysicsWorld::new(settings.physics.gravity());
        let mut objects = Objects::new();

        let respawn_height = settings.world.respawn_height;
        objects.set_respawn_rule(move |_, position| position.y < respawn_height);

        let mut inputs = Inputs::new();
        for binding in &settings.bindings {
            inputs.add_map(&binding.action, binding.categories.clone(), binding.keys.clone());
        }
        inputs.set_filters(vec!["vehicle".to_string()]);

        let vehicle = Vehicle::new(&mut scene, &mut physics, &mut objects, &settings.vehicle)?;

        Ok(Self {
            settings,
            scene,
            physics,
            objects,
            inputs,
            vehicle,
            platform: None,
        })
    }

    /// Populate the world: an inferred trimesh floor, scattered sleeping
    /// crates, a couple of fixed props, one hull rock and a kinematic
    /// platform.
    pub fn build_playground(&mut self) -> WorldResult<()> {
        let floor = self.authored_floor(40.0)?;
        self.objects
            .add_from_model(&mut self.scene, &mut self.physics, floor, &ModelOverrides::default())?;

        let pillar = self.authored_pillar()?;
        self.objects.add_from_model(
            &mut self.scene,
            &mut self.physics,
            pillar,
            &ModelOverrides {
                position: Some(Vec3::new(-6.0, 1.5, -6.0)),
                ..Default::default()
            },
        )?;

        let rock = self.authored_rock()?;
        self.objects.add_from_model(
            &mut self.scene,
            &mut self.physics,
            rock,
            &ModelOverrides {
                position: Some(Vec3::new(5.0, 1.0, -4.0)),
                sleeping: true,
                ..Default::default()
            },
        )?;

        let mut rng = rand::rng();
        let radius = self.settings.world.scatter_radius;
        for index in 0..self.settings.world.crate_count {
            let model = self.authored_crate(index)?;
            let position = Vec3::new(
                rng.random_range(-radius..radius),
                0.5,
                rng.random_range(-radius..radius),
            );
            self.objects.add_from_model(
                &mut self.scene,
                &mut self.physics,
                model,
                &ModelOverrides {
                    position: Some(position),
                    sleeping: true,
                    ..Default::default()
                },
            )?;
        }

        self.spawn_platform(Vec3::new(0.0, 0.4, -10.0), 3.0, 0.8)?;

        tracing::info!(objects = self.objects.len(), "playground built");
        Ok(())
    }

    /// Floor authored the way level models arrive: a visual mesh plus a
    /// `physical` marker whose `trimesh*` child carries the baked geometry.
    fn authored_floor(&mut self, half: f32) -> WorldResult<NodeId> {
        let model = self.scene.spawn("ground", self.scene.root())?;
        let visual = self.scene.spawn("groundMesh", model)?;
        self.scene.node_mut(visual)?.mesh = Some(plate_mesh(half));
        let marker = self.scene.spawn("physical", model)?;
        let shape = self.scene.spawn("trimeshGround", marker)?;
        self.scene.node_mut(shape)?.mesh = Some(plate_mesh(half));
        Ok(model)
    }

    fn authored_pillar(&mut self) -> WorldResult<NodeId> {
        let model = self.scene.spawn("pillar", self.scene.root())?;
        self.scene.spawn("pillarMesh", model)?;
        let marker = self.scene.spawn("physical", model)?;
        let shape = self.scene.spawn("cylinderPillar", marker)?;
        self.scene.node_mut(shape)?.scale = Vec3::new(0.8, 3.0, 0.8);
        Ok(model)
    }

    fn authored_rock(&mut self) -> WorldResult<NodeId> {
        let model = self.scene.spawn("rock", self.scene.root())?;
        let visual = self.scene.spawn("rockMesh", model)?;
        self.scene.node_mut(visual)?.mesh = Some(rock_mesh());
        let marker = self.scene.spawn("physicalDynamic", model)?;
        let shape = self.scene.spawn("hullRock", marker)?;
        self.scene.node_mut(shape)?.mesh = Some(rock_mesh());
        Ok(model)
    }

    fn authored_crate(&mut self, index: u32) -> WorldResult<NodeId> {
        let model = self.scene.spawn(&format!("crate{index}"), self.scene.root())?;
        self.scene.spawn("crateMesh", model)?;
        let marker = self.scene.spawn("physicalDynamic", model)?;
        let shape = self.scene.spawn("cubCrate", marker)?;
        self.scene.node_mut(shape)?.scale = Vec3::ONE;
        Ok(model)
    }

    fn spawn_platform(&mut self, origin: Vec3, amplitude: f32, rate: f32) -> WorldResult<()> {
        let node = self.scene.spawn("platform", self.scene.root())?;
        let desc = BodyDesc::kinematic()
            .with_position(origin)
            .with_collider(ColliderDesc::cuboid(Vec3::new(2.0, 0.2, 2.0)));
        let object = self.objects.add(
            &mut self.scene,
            &mut self.physics,
            Some(VisualDesc::new(node)),
            Some(&desc),
        )?;
        self.platform = Some(Platform {
            object,
            origin,
            amplitude,
            rate,
        });
        Ok(())
    }

    fn drive_platform(&mut self, frame: &Frame) {
        let Some(platform) = &self.platform else {
            return;
        };
        let sway = (frame.elapsed_scaled * platform.rate).sin() * platform.amplitude;
        let target = platform.origin + Vec3::X * sway;
        let object = platform.object;
        if let Some(body) = self.objects.body_of(object).and_then(|h| self.physics.body_mut(h)) {
            body.set_next_kinematic_translation(to_na_vector(target));
        }
        // Kinematic bodies sidestep the sleep bookkeeping, so publish the
        // pose explicitly.
        let _ = self.objects.force_sync(object);
    }

    /// Build the frame schedule. Phases run input latching, then gameplay,
    /// then the physics step, then pose sync, with diagnostics trailing
    /// everything else.
    pub fn wire_ticker(settings: &Settings) -> Ticker<Runtime> {
        let mut ticker = Ticker::new(settings.ticker.max_delta, settings.ticker.time_scale);

        ticker.on_tick(TickPhase::Input, |rt: &mut Runtime, _frame| {
            rt.inputs.latch();
        });

        ticker.on_tick(TickPhase::PrePhysics, |rt: &mut Runtime, frame| {
            if rt.inputs.just_pressed(actions::RESET) {
                if let Err(error) =
                    rt.objects.reset_all(&mut rt.scene, &mut rt.physics, frame.tick)
                {
                    tracing::warn!(%error, "world reset failed");
                }
            }
            rt.drive_platform(frame);
            if let Err(error) = rt.vehicle.update_pre(&rt.inputs, &mut rt.physics) {
                tracing::warn!(%error, "vehicle pre-step failed");
            }
        });

        ticker.on_tick(TickPhase::Physics, |rt: &mut Runtime, frame| {
            rt.physics.step(frame.delta_scaled);
        });

        ticker.on_tick(TickPhase::PostPhysics, |rt: &mut Runtime, frame| {
            rt.objects.update(&mut rt.scene, &mut rt.physics, frame);
            if let Err(error) = rt.vehicle.update_post(&mut rt.scene, &rt.physics, frame) {
                tracing::warn!(%error, "vehicle post-step failed");
            }
        });

        ticker.on_tick(TickPhase::Diagnostics, |rt: &mut Runtime, frame| {
            tracing::trace!(
                tick = frame.tick,
                speed = rt.vehicle.speed(&rt.physics),
                grounded = rt.vehicle.is_grounded(),
                objects = rt.objects.len(),
                "frame"
            );
        });

        ticker
    }
}

fn plate_mesh(half: f32) -> MeshData {
    MeshData {
        positions: vec![
            Vec3::new(-half, 0.0, -half),
            Vec3::new(half, 0.0, -half),
            Vec3::new(half, 0.0, half),
            Vec3::new(-half, 0.0, half),
        ],
        indices: vec![[0, 1, 2], [0, 2, 3]],
    }
}

fn rock_mesh() -> MeshData {
    MeshData {
        positions: vec![
            Vec3::new(0.0, 0.6, 0.0),
            Vec3::new(0.5, 0.0, 0.4),
            Vec3::new(-0.5, 0.0, 0.4),
            Vec3::new(0.4, 0.0, -0.5),
            Vec3::new(-0.4, 0.0, -0.5),
            Vec3::new(0.0, -0.5, 0.0),
        ],
        indices: vec![
            [0, 1, 2],
            [0, 3, 1],
            [0, 4, 3],
            [0, 2, 4],
            [5, 2, 1],
            [5, 1, 3],
            [5, 3, 4],
            [5, 4, 2],
        ],
    }
}
