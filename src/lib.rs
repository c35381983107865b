// Playrig: entity/physics synchronization runtime for an interactive 3D playground
// One simulation thread, phase-ordered ticks, rapier-backed bodies

#![allow(warnings)]

pub mod utils;
pub mod scene;
pub mod ticker;
pub mod physics;
pub mod inputs;
pub mod world;
pub mod config;
pub mod app;

// Re-export commonly used types for convenience
pub use scene::{NodeId, Scene};
pub use ticker::{Frame, TickPhase, Ticker};
pub use world::{ObjectId, Objects, Vehicle};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
