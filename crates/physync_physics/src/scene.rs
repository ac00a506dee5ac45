//! Boundary between the physics world and the scene graph it drives

use crate::shapes::Geometry;
use nalgebra::{Isometry3, Matrix4, UnitQuaternion, Vector3};
use physync_math::InstanceBuffer;
use std::fmt::Debug;
use std::hash::Hash;

/// Read and write access to renderable objects
///
/// Every method returns `None` (or `false`) when the key no longer names an
/// object in the scene.
pub trait SceneAccess {
    /// Identity of a renderable object
    type Key: Copy + Eq + Hash + Debug;

    /// Geometry of the object's mesh
    fn geometry(&self, key: Self::Key) -> Option<&Geometry>;

    /// Accumulated scale from the root down to the object
    fn world_scale(&self, key: Self::Key) -> Option<Vector3<f32>>;

    /// World position and rotation, scale removed
    fn world_pose(&self, key: Self::Key) -> Option<Isometry3<f32>>;

    /// World matrix of the object's parent (identity for root objects)
    fn parent_world_matrix(&self, key: Self::Key) -> Option<Matrix4<f32>>;

    /// Per-instance transforms, if the object is instanced
    fn instances(&self, key: Self::Key) -> Option<&InstanceBuffer>;

    /// Per-instance transforms, mutable
    fn instances_mut(&mut self, key: Self::Key) -> Option<&mut InstanceBuffer>;

    /// Overwrite the object's position and rotation relative to its parent
    fn set_local_pose(&mut self, key: Self::Key, position: Vector3<f32>, rotation: UnitQuaternion<f32>) -> bool;
}
