//! Transform-node scene graph.
//!
//! This is the render-facing side of the simulation: an arena of named
//! transform nodes with parent/child links, optional baked mesh payloads and
//! authored metadata. The registry copies physics poses into these nodes
//! every frame; rendering itself lives outside this crate.

use std::collections::HashMap;
use std::fmt;

use glam::{Quat, Vec3};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Error)]
pub enum SceneError {
    #[error("scene node {id} not found")]
    NodeNotFound { id: NodeId },

    #[error("cannot attach node {id} to itself")]
    SelfAttach { id: NodeId },

    #[error("attaching node {id} under its own descendant would create a cycle")]
    WouldCycle { id: NodeId },
}

pub type SceneResult<T> = Result<T, SceneError>;

/// Baked triangle geometry carried by authored nodes
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub positions: Vec<Vec3>,
    pub indices: Vec<[u32; 3]>,
}

/// Authored per-node metadata copied through to inferred colliders
#[derive(Debug, Clone, Default)]
pub struct NodeMeta {
    pub friction: Option<f32>,
    pub restitution: Option<f32>,
    pub mass: Option<f32>,
    pub category: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    pub mesh: Option<MeshData>,
    pub meta: NodeMeta,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            cast_shadow: false,
            receive_shadow: false,
            mesh: None,
            meta: NodeMeta::default(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

pub struct Scene {
    nodes: HashMap<NodeId, Node>,
    next_id: u32,
    root: NodeId,
}

impl Scene {
    pub fn new() -> Self {
        let root = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(root, Node::new("root"));
        Scene { nodes, next_id: 1, root }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Create a detached node. Attach it with [`Scene::attach`].
    pub fn create(&mut self, name: &str) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, Node::new(name));
        id
    }

    /// Create a node already attached to `parent`.
    pub fn spawn(&mut self, name: &str, parent: NodeId) -> SceneResult<NodeId> {
        let id = self.create(name);
        self.attach(id, parent)?;
        Ok(id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn node(&self, id: NodeId) -> SceneResult<&Node> {
        self.nodes.get(&id).ok_or(SceneError::NodeNotFound { id })
    }

    pub fn node_mut(&mut self, id: NodeId) -> SceneResult<&mut Node> {
        self.nodes.get_mut(&id).ok_or(SceneError::NodeNotFound { id })
    }

    pub fn children(&self, id: NodeId) -> SceneResult<&[NodeId]> {
        Ok(self.node(id)?.children())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    /// Attach `child` under `parent`, detaching it from its current parent
    /// first.
    pub fn attach(&mut self, child: NodeId, parent: NodeId) -> SceneResult<()> {
        if child == parent {
            return Err(SceneError::SelfAttach { id: child });
        }
        if !self.nodes.contains_key(&parent) {
            return Err(SceneError::NodeNotFound { id: parent });
        }
        if self.descendants(child).contains(&parent) {
            return Err(SceneError::WouldCycle { id: child });
        }
        self.detach(child)?;
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(&parent) {
            node.children.push(child);
        }
        Ok(())
    }

    /// Remove `child` from its parent. The node stays in the arena and can be
    /// reattached later.
    pub fn detach(&mut self, child: NodeId) -> SceneResult<()> {
        let old_parent = self.node(child)?.parent;
        if let Some(parent) = old_parent {
            if let Some(node) = self.nodes.get_mut(&parent) {
                node.children.retain(|c| *c != child);
            }
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = None;
        }
        Ok(())
    }

    /// Pre-order walk of everything below `id`, excluding `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match self.nodes.get(&id) {
            Some(node) => node.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Some(node) = self.nodes.get(&current) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// Compose the world-space pose of `id` from the root down.
    pub fn world_transform(&self, id: NodeId) -> SceneResult<(Vec3, Quat, Vec3)> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = self.node(node_id)?;
            chain.push(node_id);
            current = node.parent;
        }

        let mut position = Vec3::ZERO;
        let mut rotation = Quat::IDENTITY;
        let mut scale = Vec3::ONE;
        for node_id in chain.iter().rev() {
            let node = self.node(*node_id)?;
            position += rotation * (scale * node.position);
            rotation *= node.rotation;
            scale *= node.scale;
        }
        Ok((position, rotation, scale))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attach_and_detach_restore_parent_links() {
        let mut scene = Scene::new();
        let root = scene.root();
        let group = scene.spawn("group", root).unwrap();
        let child = scene.spawn("child", group).unwrap();

        assert_eq!(scene.parent(child), Some(group));
        assert_eq!(scene.children(group).unwrap(), &[child]);

        scene.detach(child).unwrap();
        assert_eq!(scene.parent(child), None);
        assert!(scene.children(group).unwrap().is_empty());

        scene.attach(child, group).unwrap();
        assert_eq!(scene.parent(child), Some(group));
    }

    #[test]
    fn reattach_moves_between_parents() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.spawn("a", root).unwrap();
        let b = scene.spawn("b", root).unwrap();
        let child = scene.spawn("child", a).unwrap();

        scene.attach(child, b).unwrap();
        assert!(scene.children(a).unwrap().is_empty());
        assert_eq!(scene.children(b).unwrap(), &[child]);
    }

    #[test]
    fn self_attach_is_rejected() {
        let mut scene = Scene::new();
        let node = scene.create("lonely");
        assert!(matches!(
            scene.attach(node, node),
            Err(SceneError::SelfAttach { .. })
        ));
    }

    #[test]
    fn cyclic_attach_is_rejected() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.spawn("a", root).unwrap();
        let b = scene.spawn("b", a).unwrap();

        assert!(matches!(
            scene.attach(a, b),
            Err(SceneError::WouldCycle { .. })
        ));
        // The hierarchy is untouched
        assert_eq!(scene.parent(a), Some(root));
        assert_eq!(scene.parent(b), Some(a));
    }

    #[test]
    fn descendants_walk_in_child_order() {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.spawn("a", root).unwrap();
        let a1 = scene.spawn("a1", a).unwrap();
        let a2 = scene.spawn("a2", a).unwrap();
        let b = scene.spawn("b", root).unwrap();

        assert_eq!(scene.descendants(root), vec![a, a1, a2, b]);
        assert_eq!(scene.descendants(a), vec![a1, a2]);
        assert!(scene.descendants(b).is_empty());
    }

    #[test]
    fn world_transform_composes_parent_pose() {
        let mut scene = Scene::new();
        let root = scene.root();
        let parent = scene.spawn("parent", root).unwrap();
        let child = scene.spawn("child", parent).unwrap();

        {
            let node = scene.node_mut(parent).unwrap();
            node.position = Vec3::new(0.0, 2.0, 0.0);
            node.rotation = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        }
        scene.node_mut(child).unwrap().position = Vec3::new(1.0, 0.0, 0.0);

        let (position, _, _) = scene.world_transform(child).unwrap();
        // A quarter turn about Y maps +X onto -Z
        assert!((position - Vec3::new(0.0, 2.0, -1.0)).length() < 1e-5);
    }

    #[test]
    fn missing_node_is_an_error() {
        let mut scene = Scene::new();
        let node = scene.create("a");
        scene.nodes.remove(&node);
        assert!(matches!(
            scene.node(node),
            Err(SceneError::NodeNotFound { .. })
        ));
    }
}
