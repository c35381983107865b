//! Collider inference from authored naming conventions.
//!
//! Artists tag a model with marker nodes named `physical*`; each marker's
//! children describe one collider whose shape is parsed from the node name
//! prefix and whose dimensions come from the node's local scale. Markers are
//! detached from the graph once consumed so they never reach rendering.

use glam::Vec3;
use thiserror::Error;

use crate::physics::body::{
    BodyType, ColliderDesc, ColliderShape, CollisionCategory, ShapeError, ShapeKind,
};
use crate::scene::{Node, NodeId, Scene, SceneError};

#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error(transparent)]
    Scene(#[from] SceneError),
}

pub type InferenceResult<T> = Result<T, InferenceError>;

/// Physics description extracted from a model's marker nodes.
///
/// `body_type` is `None` when the model carries no `physical*` marker at all,
/// which means the model is purely visual.
#[derive(Debug, Clone, Default)]
pub struct InferredPhysics {
    pub body_type: Option<BodyType>,
    pub colliders: Vec<ColliderDesc>,
}

/// Scan the direct children of `model` for `physical*` markers and build
/// collider descriptors from their children. Consumed markers are detached
/// from the scene graph.
///
/// The first marker decides the body type: a name containing `dynamic` means
/// a dynamic body, anything else a fixed one.
pub fn infer_colliders(scene: &mut Scene, model: NodeId) -> InferenceResult<InferredPhysics> {
    let mut markers = Vec::new();
    for &child in scene.children(model)? {
        let name = &scene.node(child)?.name;
        if name.to_ascii_lowercase().starts_with("physical") {
            markers.push(child);
        }
    }

    let mut inferred = InferredPhysics::default();
    for &marker in &markers {
        let marker_name = scene.node(marker)?.name.to_ascii_lowercase();
        if inferred.body_type.is_none() {
            inferred.body_type = Some(if marker_name.contains("dynamic") {
                BodyType::Dynamic
            } else {
                BodyType::Fixed
            });
        }

        let shape_nodes = scene.children(marker)?.to_vec();
        for shape_node in shape_nodes {
            inferred.colliders.push(collider_from_node(scene.node(shape_node)?)?);
        }
    }

    for marker in markers {
        scene.detach(marker)?;
        tracing::debug!(model = %model, marker = %marker, "consumed physical marker");
    }

    Ok(inferred)
}

/// Build one collider descriptor from an authored shape node.
fn collider_from_node(node: &Node) -> InferenceResult<ColliderDesc> {
    let shape = match ShapeKind::parse(&node.name)? {
        ShapeKind::Trimesh => {
            let mesh = baked_mesh(node)?;
            if mesh.indices.is_empty() {
                return Err(ShapeError::MissingGeometry {
                    name: node.name.clone(),
                }
                .into());
            }
            ColliderShape::Trimesh {
                vertices: scaled_positions(node),
                indices: mesh.indices.clone(),
            }
        }
        ShapeKind::Hull => {
            baked_mesh(node)?;
            ColliderShape::Hull {
                points: scaled_positions(node),
            }
        }
        ShapeKind::Cuboid => ColliderShape::Cuboid {
            half_extents: node.scale * 0.5,
        },
        ShapeKind::Cylinder => ColliderShape::Cylinder {
            half_height: node.scale.y * 0.5,
            radius: node.scale.x * 0.5,
        },
        ShapeKind::Ball => ColliderShape::Ball {
            radius: node.scale.y * 0.5,
        },
    };

    let mut desc = ColliderDesc::new(shape)
        .with_position(node.position)
        .with_rotation(node.rotation);
    desc.friction = node.meta.friction;
    desc.restitution = node.meta.restitution;
    desc.mass = node.meta.mass;
    if let Some(raw) = &node.meta.category {
        match CollisionCategory::parse(raw) {
            Some(category) => desc.category = Some(category),
            None => {
                tracing::warn!(node = %node.name, category = %raw, "unknown collision category ignored")
            }
        }
    }
    Ok(desc)
}

fn baked_mesh(node: &Node) -> Result<&crate::scene::MeshData, ShapeError> {
    match &node.mesh {
        Some(mesh) if !mesh.positions.is_empty() => Ok(mesh),
        _ => Err(ShapeError::MissingGeometry {
            name: node.name.clone(),
        }),
    }
}

/// Mesh-backed shapes bake the node scale into the vertices, since rapier
/// shapes carry no scale of their own.
fn scaled_positions(node: &Node) -> Vec<Vec3> {
    let mesh = node.mesh.as_ref().map(|m| m.positions.as_slice()).unwrap_or(&[]);
    mesh.iter().map(|p| *p * node.scale).collect()
}
