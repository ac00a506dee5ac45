//! Scene graph - a hierarchy of renderable nodes
//!
//! Nodes store transforms relative to their parent. World matrices are
//! computed on demand by walking up to the root, so they are always current.

use crate::node::{DirtyFlags, Node, NodeKey};
use crate::Transform3D;
use nalgebra::{Isometry3, Matrix4, UnitQuaternion, Vector3};
use physync_math::{decode_isometry, InstanceBuffer};
use physync_physics::{Geometry, SceneAccess};
use slotmap::SlotMap;
use std::collections::HashMap;

/// Container for all renderable nodes
#[derive(Default)]
pub struct SceneGraph {
    nodes: SlotMap<NodeKey, Node>,
    roots: Vec<NodeKey>,
    name_index: HashMap<String, NodeKey>,
}

impl SceneGraph {
    /// Create an empty scene graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root node and return its key
    pub fn add_node(&mut self, mut node: Node) -> NodeKey {
        node.parent = None;
        let key = self.insert(node);
        self.roots.push(key);
        key
    }

    /// Add a node under a parent
    ///
    /// Returns None (and drops the node) if the parent doesn't exist.
    pub fn add_child(&mut self, parent: NodeKey, mut node: Node) -> Option<NodeKey> {
        if !self.nodes.contains_key(parent) {
            log::warn!("Cannot add child: parent {:?} not in scene", parent);
            return None;
        }
        node.parent = Some(parent);
        let key = self.insert(node);
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.push(key);
        }
        Some(key)
    }

    fn insert(&mut self, mut node: Node) -> NodeKey {
        node.children.clear();
        let name = node.name.clone();
        let key = self.nodes.insert(node);
        if let Some(name) = name {
            self.name_index.insert(name, key);
        }
        key
    }

    /// Remove a node and everything below it
    ///
    /// Returns the removed node itself (its children are dropped).
    pub fn remove_node(&mut self, key: NodeKey) -> Option<Node> {
        let node = self.nodes.remove(key)?;
        if let Some(name) = &node.name {
            if self.name_index.get(name) == Some(&key) {
                self.name_index.remove(name);
            }
        }
        match node.parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(parent) => parent.children.retain(|c| *c != key),
            None => self.roots.retain(|r| *r != key),
        }
        for child in node.children.clone() {
            self.remove_node(child);
        }
        Some(node)
    }

    /// Get a node by key
    pub fn get(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    /// Get a mutable node by key
    pub fn get_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.nodes.get_mut(key)
    }

    /// Look up a node by name
    pub fn get_by_name(&self, name: &str) -> Option<NodeKey> {
        self.name_index.get(name).copied().filter(|k| self.nodes.contains_key(*k))
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the scene has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Top-level nodes in insertion order
    pub fn roots(&self) -> &[NodeKey] {
        &self.roots
    }

    /// Iterate over all nodes with their keys
    pub fn iter(&self) -> impl Iterator<Item = (NodeKey, &Node)> {
        self.nodes.iter()
    }

    /// Iterate over nodes carrying a tag
    pub fn with_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = NodeKey> + 'a {
        self.nodes.iter().filter(move |(_, n)| n.has_tag(tag)).map(|(k, _)| k)
    }

    /// Replace a node's local transform
    pub fn set_transform(&mut self, key: NodeKey, transform: Transform3D) -> bool {
        match self.nodes.get_mut(key) {
            Some(node) => {
                node.set_transform(transform);
                true
            }
            None => false,
        }
    }

    /// Matrix from the node's local space to world space
    pub fn world_matrix(&self, key: NodeKey) -> Option<Matrix4<f32>> {
        let node = self.nodes.get(key)?;
        let local = node.transform.to_matrix();
        match node.parent {
            Some(parent) => Some(self.world_matrix(parent)? * local),
            None => Some(local),
        }
    }

    /// World matrix of the node's parent (identity for roots)
    pub fn parent_world(&self, key: NodeKey) -> Option<Matrix4<f32>> {
        let node = self.nodes.get(key)?;
        match node.parent {
            Some(parent) => self.world_matrix(parent),
            None => Some(Matrix4::identity()),
        }
    }

    /// Length of each world basis axis
    pub fn world_scale_of(&self, key: NodeKey) -> Option<Vector3<f32>> {
        let m = self.world_matrix(key)?;
        Some(Vector3::new(
            m.fixed_view::<3, 1>(0, 0).norm(),
            m.fixed_view::<3, 1>(0, 1).norm(),
            m.fixed_view::<3, 1>(0, 2).norm(),
        ))
    }

    /// World position and rotation, with scale removed
    pub fn world_isometry(&self, key: NodeKey) -> Option<Isometry3<f32>> {
        let m = self.world_matrix(key)?;
        let mut slot = [0.0; 16];
        slot.copy_from_slice(m.as_slice());
        Some(decode_isometry(&slot))
    }

    /// Keys of nodes with pending changes
    pub fn dirty_nodes(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.nodes.iter().filter(|(_, n)| n.is_dirty()).map(|(k, _)| k)
    }

    /// Clear dirty flags on every node
    pub fn clear_all_dirty(&mut self) {
        for (_, node) in self.nodes.iter_mut() {
            node.clear_dirty();
        }
    }

    /// Remove every node
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
        self.name_index.clear();
    }
}

impl SceneAccess for SceneGraph {
    type Key = NodeKey;

    fn geometry(&self, key: NodeKey) -> Option<&Geometry> {
        self.nodes.get(key).map(|n| &n.geometry)
    }

    fn world_scale(&self, key: NodeKey) -> Option<Vector3<f32>> {
        self.world_scale_of(key)
    }

    fn world_pose(&self, key: NodeKey) -> Option<Isometry3<f32>> {
        self.world_isometry(key)
    }

    fn parent_world_matrix(&self, key: NodeKey) -> Option<Matrix4<f32>> {
        self.parent_world(key)
    }

    fn instances(&self, key: NodeKey) -> Option<&InstanceBuffer> {
        self.nodes.get(key).and_then(|n| n.instances.as_ref())
    }

    fn instances_mut(&mut self, key: NodeKey) -> Option<&mut InstanceBuffer> {
        self.nodes.get_mut(key).and_then(|n| n.instances.as_mut())
    }

    fn set_local_pose(&mut self, key: NodeKey, position: Vector3<f32>, rotation: UnitQuaternion<f32>) -> bool {
        match self.nodes.get_mut(key) {
            Some(node) => {
                node.transform.position = position;
                node.transform.rotation = rotation;
                node.mark_dirty(DirtyFlags::TRANSFORM);
                true
            }
            None => false,
        }
    }
}
