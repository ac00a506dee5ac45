//! Math helpers for physync
//!
//! This crate re-exports the nalgebra types used across the workspace and adds
//! the small set of operations the physics/render bridge needs:
//!
//! - [`InstanceBuffer`] - Flat, column-major 4x4 per-instance transform buffer
//! - [`mat4::compose_into`] - Closed-form quaternion + translation write into a buffer slot
//! - [`mat4::decode_isometry`] - Read a rigid pose back out of a buffer slot
//! - [`mat4::extract_rotation`] - Rotation part of an affine matrix (scale and translation dropped)
//! - [`mat4::world_to_local`] - Express a world-space pose in a parent's local space

pub mod instance;
pub mod mat4;

pub use instance::{BufferUsage, InstanceBuffer, MATRIX_STRIDE};
pub use mat4::{compose_into, decode_isometry, extract_rotation, world_to_local};

pub use nalgebra::{Isometry3, Matrix3, Matrix4, Point3, Translation3, UnitQuaternion, Vector3};
