//! Gameplay layer: the entity registry that pairs scene nodes with rigid
//! bodies, and the player vehicle built on top of it.

pub mod objects;
pub mod vehicle;

pub use objects::{EntityState, ModelOverrides, ObjectId, Objects, VisualDesc};
pub use vehicle::Vehicle;

use thiserror::Error;

use crate::physics::{InferenceError, PhysicsError};
use crate::scene::SceneError;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Physics(#[from] PhysicsError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error("object {id} is not registered")]
    UnknownObject { id: ObjectId },

    #[error("object {id} has lost its rigid body")]
    MissingBody { id: ObjectId },
}

pub type WorldResult<T> = Result<T, WorldError>;
