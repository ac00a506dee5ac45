//! Scene graph for physync
//!
//! This crate provides the renderable side the physics bridge drives:
//!
//! - [`Transform3D`] - Position, rotation, and per-axis scale relative to a parent
//! - [`Node`] - A renderable object with geometry and optional instance buffer
//! - [`NodeKey`] - Generational key to a node
//! - [`SceneGraph`] - Parent/child hierarchy of nodes, implementing [`SceneAccess`]

mod graph;
mod node;
mod transform;

pub use graph::SceneGraph;
pub use node::{DirtyFlags, Node, NodeKey};
pub use transform::Transform3D;

// Re-export the types a scene is built from
pub use physync_math::{BufferUsage, InstanceBuffer};
pub use physync_physics::{Geometry, SceneAccess};
