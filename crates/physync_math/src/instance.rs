//! Per-instance transform buffers
//!
//! An instanced renderable draws one shared geometry many times, each copy
//! placed by its own 4x4 matrix. The matrices live back to back in a single
//! flat `f32` array so they can be uploaded to the GPU without conversion.

use bytemuck::{try_cast_slice, try_cast_slice_mut};
use nalgebra::{Isometry3, Matrix4};
use serde::{Deserialize, Serialize};

/// Number of floats per instance matrix
pub const MATRIX_STRIDE: usize = 16;

/// How the renderer should expect an instance buffer to change
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BufferUsage {
    /// Written once, drawn many times
    #[default]
    Static,
    /// Rewritten every frame (e.g. driven by physics)
    Dynamic,
}

/// Flat column-major buffer of per-instance transforms
#[derive(Clone, Debug, PartialEq)]
pub struct InstanceBuffer {
    array: Vec<f32>,
    count: usize,
    usage: BufferUsage,
    needs_update: bool,
}

impl InstanceBuffer {
    /// Create a buffer of `count` identity matrices
    pub fn new(count: usize) -> Self {
        let identity = Matrix4::<f32>::identity();
        let mut array = Vec::with_capacity(count * MATRIX_STRIDE);
        for _ in 0..count {
            array.extend_from_slice(identity.as_slice());
        }
        Self {
            array,
            count,
            usage: BufferUsage::Static,
            needs_update: false,
        }
    }

    /// Create a buffer holding the given matrices
    pub fn from_matrices(matrices: &[Matrix4<f32>]) -> Self {
        let mut array = Vec::with_capacity(matrices.len() * MATRIX_STRIDE);
        for m in matrices {
            array.extend_from_slice(m.as_slice());
        }
        Self {
            array,
            count: matrices.len(),
            usage: BufferUsage::Static,
            needs_update: false,
        }
    }

    /// Create a buffer from rigid poses
    pub fn from_isometries(poses: &[Isometry3<f32>]) -> Self {
        let matrices: Vec<Matrix4<f32>> = poses.iter().map(|p| p.to_homogeneous()).collect();
        Self::from_matrices(&matrices)
    }

    /// Number of instances drawn
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of matrix slots the storage can hold
    #[inline]
    pub fn capacity(&self) -> usize {
        self.array.len() / MATRIX_STRIDE
    }

    /// Limit the number of instances drawn (clamped to capacity)
    pub fn set_count(&mut self, count: usize) {
        self.count = count.min(self.capacity());
    }

    /// Raw flat storage
    pub fn array(&self) -> &[f32] {
        &self.array
    }

    /// Raw flat storage, mutable
    pub fn array_mut(&mut self) -> &mut [f32] {
        &mut self.array
    }

    /// All matrix slots viewed as 16-float arrays
    pub fn slots(&self) -> &[[f32; MATRIX_STRIDE]] {
        try_cast_slice(&self.array).unwrap_or(&[])
    }

    /// All matrix slots viewed as 16-float arrays, mutable
    pub fn slots_mut(&mut self) -> &mut [[f32; MATRIX_STRIDE]] {
        try_cast_slice_mut(&mut self.array).unwrap_or(&mut [])
    }

    /// Matrix slot for one instance
    pub fn slot(&self, index: usize) -> Option<&[f32; MATRIX_STRIDE]> {
        self.slots().get(index)
    }

    /// Matrix slot for one instance, mutable
    pub fn slot_mut(&mut self, index: usize) -> Option<&mut [f32; MATRIX_STRIDE]> {
        self.slots_mut().get_mut(index)
    }

    /// Copy of one instance's matrix
    pub fn matrix(&self, index: usize) -> Option<Matrix4<f32>> {
        self.slot(index).map(|s| Matrix4::from_column_slice(s))
    }

    /// Overwrite one instance's matrix
    pub fn set_matrix(&mut self, index: usize, matrix: &Matrix4<f32>) -> bool {
        match self.slot_mut(index) {
            Some(slot) => {
                slot.copy_from_slice(matrix.as_slice());
                self.needs_update = true;
                true
            }
            None => false,
        }
    }

    /// Current usage hint
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Change the usage hint
    pub fn set_usage(&mut self, usage: BufferUsage) {
        self.usage = usage;
    }

    /// Whether the contents changed since the renderer last uploaded them
    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    /// Flag the contents as changed
    pub fn mark_needs_update(&mut self) {
        self.needs_update = true;
    }

    /// Acknowledge an upload
    pub fn clear_needs_update(&mut self) {
        self.needs_update = false;
    }
}
