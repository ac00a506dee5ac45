//! Scene nodes
//!
//! A Node is one renderable object: a local transform, the geometry it draws,
//! and optionally a buffer of per-instance transforms.

use crate::Transform3D;
use bitflags::bitflags;
use physync_math::InstanceBuffer;
use physync_physics::Geometry;
use slotmap::new_key_type;
use std::collections::HashSet;

new_key_type! {
    /// Key to a node in the scene graph
    ///
    /// Keys are generational: once a node is removed, old keys to its slot
    /// return None instead of pointing at whatever reuses the slot.
    pub struct NodeKey;
}

bitflags! {
    /// Flags indicating which parts of a node changed since the renderer last looked
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct DirtyFlags: u8 {
        /// No changes
        const NONE = 0;
        /// Local transform changed
        const TRANSFORM = 1 << 0;
        /// Geometry changed
        const GEOMETRY = 1 << 1;
        /// Instance buffer replaced
        const INSTANCES = 1 << 2;
        /// Everything needs rebuilding
        const ALL = Self::TRANSFORM.bits() | Self::GEOMETRY.bits() | Self::INSTANCES.bits();
    }
}

/// A renderable object in the scene graph
///
/// Each node has:
/// - An optional name (for lookup by name)
/// - Tags (for categorization and filtering)
/// - A transform relative to its parent
/// - Geometry (what the physics layer turns into a collision shape)
/// - An optional instance buffer (one transform per drawn copy)
/// - Dirty flags (for change tracking)
#[derive(Clone, Debug)]
pub struct Node {
    /// Optional name for this node (for lookup)
    pub name: Option<String>,
    /// Tags for categorization (e.g., "dynamic", "static")
    pub tags: HashSet<String>,
    /// The node's transform relative to its parent
    pub transform: Transform3D,
    /// The node's geometry
    pub geometry: Geometry,
    /// Per-instance transforms, for instanced nodes
    pub instances: Option<InstanceBuffer>,
    pub(crate) parent: Option<NodeKey>,
    pub(crate) children: Vec<NodeKey>,
    dirty: DirtyFlags,
}

impl Node {
    /// Create a new node drawing the given geometry
    pub fn new(geometry: Geometry) -> Self {
        Self {
            name: None,
            tags: HashSet::new(),
            transform: Transform3D::identity(),
            geometry,
            instances: None,
            parent: None,
            children: Vec::new(),
            dirty: DirtyFlags::ALL, // New nodes are dirty
        }
    }

    /// A node with no drawable geometry (a pure grouping node)
    pub fn group() -> Self {
        Self::new(Geometry::Unsupported)
    }

    /// Set the name of this node (for lookup)
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a tag to this node
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// Set the transform relative to the parent
    pub fn with_transform(mut self, transform: Transform3D) -> Self {
        self.transform = transform;
        self
    }

    /// Draw the geometry once per instance transform
    pub fn with_instances(mut self, instances: InstanceBuffer) -> Self {
        self.instances = Some(instances);
        self
    }

    /// Check if this node has a specific tag
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Parent node, if any
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    /// Child nodes in insertion order
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    /// Whether the node draws several instances
    pub fn is_instanced(&self) -> bool {
        self.instances.is_some()
    }

    /// Replace the local transform
    pub fn set_transform(&mut self, transform: Transform3D) {
        self.transform = transform;
        self.mark_dirty(DirtyFlags::TRANSFORM);
    }

    /// Replace the geometry
    pub fn set_geometry(&mut self, geometry: Geometry) {
        self.geometry = geometry;
        self.mark_dirty(DirtyFlags::GEOMETRY);
    }

    /// Replace the instance buffer
    pub fn set_instances(&mut self, instances: Option<InstanceBuffer>) {
        self.instances = instances;
        self.mark_dirty(DirtyFlags::INSTANCES);
    }

    /// Current dirty flags
    pub fn dirty_flags(&self) -> DirtyFlags {
        self.dirty
    }

    /// Check whether any change is pending
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Mark parts of this node as changed
    pub fn mark_dirty(&mut self, flags: DirtyFlags) {
        self.dirty |= flags;
    }

    /// Clear all dirty flags
    pub fn clear_dirty(&mut self) {
        self.dirty = DirtyFlags::NONE;
    }
}
