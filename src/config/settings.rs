use std::fs;
use std::path::PathBuf;
use directories::ProjectDirs;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use toml;

use crate::inputs::actions;

const CONFIG_FILE: &str = "playrig.toml";

// =============================================================================
// Runtime Configuration
// =============================================================================

/// Frame scheduler tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TickerSettings {
    /// Longest frame delta fed to the simulation, in seconds. Frames longer
    /// than this (debugger pauses, window drags) are clamped.
    pub max_delta: f32,
    pub time_scale: f32,
}

impl Default for TickerSettings {
    fn default() -> Self {
        Self {
            max_delta: 1.0 / 15.0,
            time_scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsSettings {
    pub gravity: [f32; 3],
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            gravity: [0.0, -9.81, 0.0],
        }
    }
}

impl PhysicsSettings {
    pub fn gravity(&self) -> Vec3 {
        Vec3::from_array(self.gravity)
    }
}

/// Raycast vehicle tuning. The suspension values are deliberately stiff; the
/// car is arcade-flavored, not a rig simulation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleSettings {
    pub spawn_position: [f32; 3],
    pub chassis_half_extents: [f32; 3],
    pub engine_force: f32,
    pub boost_multiplier: f32,
    pub brake_strength: f32,
    pub idle_brake: f32,
    pub max_steering: f32,
    pub steering_smoothing: f32,
    pub roll_rate: f32,
    pub jump_force: f32,
    pub jump_spin: f32,
    pub wheel_offset: [f32; 3],
    pub wheel_radius: f32,
    pub suspension_rest_length: f32,
    pub suspension_stiffness: f32,
    pub damping_compression: f32,
    pub damping_relaxation: f32,
    pub max_suspension_force: f32,
    pub max_suspension_travel: f32,
    pub friction_slip: f32,
    pub side_friction_stiffness: f32,
}

impl Default for VehicleSettings {
    fn default() -> Self {
        Self {
            spawn_position: [0.0, 1.0, 0.0],
            chassis_half_extents: [1.0, 0.5, 2.0],
            engine_force: 30.0,
            boost_multiplier: 2.5,
            brake_strength: 0.5,
            idle_brake: 0.04,
            max_steering: 0.5,
            steering_smoothing: 10.0,
            roll_rate: 0.6,
            jump_force: 4.0,
            jump_spin: 1.5,
            wheel_offset: [0.65, -0.2, 0.75],
            wheel_radius: 0.5,
            suspension_rest_length: 0.125,
            suspension_stiffness: 24.0,
            damping_compression: 0.83,
            damping_relaxation: 0.88,
            max_suspension_force: 6000.0,
            max_suspension_travel: 5.0,
            friction_slip: 10.5,
            side_friction_stiffness: 1.0,
        }
    }
}

impl VehicleSettings {
    pub fn spawn(&self) -> Vec3 {
        Vec3::from_array(self.spawn_position)
    }

    pub fn chassis_half(&self) -> Vec3 {
        Vec3::from_array(self.chassis_half_extents)
    }

    pub fn wheel_anchor(&self) -> Vec3 {
        Vec3::from_array(self.wheel_offset)
    }
}

/// Playground composition and the out-of-bounds rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSettings {
    /// Dynamic objects below this height are sent back to their spawn pose.
    pub respawn_height: f32,
    pub crate_count: u32,
    pub scatter_radius: f32,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            respawn_height: -4.0,
            crate_count: 8,
            scatter_radius: 6.0,
        }
    }
}

/// One action binding row, as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingEntry {
    pub action: String,
    pub categories: Vec<String>,
    pub keys: Vec<String>,
}

impl BindingEntry {
    fn new(action: &str, categories: &[&str], keys: &[&str]) -> Self {
        Self {
            action: action.to_string(),
            categories: categories.iter().map(|c| c.to_string()).collect(),
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }
}

pub fn default_bindings() -> Vec<BindingEntry> {
    vec![
        BindingEntry::new(actions::FORWARD, &["vehicle"], &["ArrowUp", "KeyW"]),
        BindingEntry::new(actions::BACKWARD, &["vehicle"], &["ArrowDown", "KeyS"]),
        BindingEntry::new(actions::LEFT, &["vehicle"], &["ArrowLeft", "KeyA"]),
        BindingEntry::new(actions::RIGHT, &["vehicle"], &["ArrowRight", "KeyD"]),
        BindingEntry::new(actions::BOOST, &["vehicle"], &["ShiftLeft", "ShiftRight"]),
        BindingEntry::new(actions::BRAKE, &["vehicle"], &["KeyB"]),
        BindingEntry::new(actions::JUMP, &["vehicle"], &["Space"]),
        BindingEntry::new(actions::RESET, &["vehicle"], &["KeyR"]),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub ticker: TickerSettings,
    #[serde(default)]
    pub physics: PhysicsSettings,
    #[serde(default)]
    pub vehicle: VehicleSettings,
    #[serde(default)]
    pub world: WorldSettings,
    #[serde(default = "default_bindings")]
    pub bindings: Vec<BindingEntry>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ticker: TickerSettings::default(),
            physics: PhysicsSettings::default(),
            vehicle: VehicleSettings::default(),
            world: WorldSettings::default(),
            bindings: default_bindings(),
        }
    }
}

fn config_path() -> Option<PathBuf> {
    ProjectDirs::from("com", "playrig", "playrig")
        .map(|proj| proj.config_dir().join(CONFIG_FILE))
}

pub fn save_settings(settings: &Settings) -> std::io::Result<()> {
    if let Some(path) = config_path() {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let toml = toml::to_string_pretty(settings)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, toml)?;
    }
    Ok(())
}

pub fn load_settings() -> Option<Settings> {
    if let Some(path) = config_path() {
        if let Ok(data) = fs::read_to_string(path) {
            match toml::from_str::<Settings>(&data) {
                Ok(settings) => return Some(settings),
                Err(error) => {
                    tracing::warn!(%error, "settings file malformed, using defaults");
                }
            }
        }
    }
    None
}
