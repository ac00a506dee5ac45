//! 3D Transform (position, rotation, scale)
//!
//! A Transform3D places a node relative to its parent.

use nalgebra::{Isometry3, Matrix4, Point3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// A 3D transform with position, rotation, and per-axis scale
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform3D {
    /// Position relative to the parent
    pub position: Vector3<f32>,
    /// Rotation relative to the parent
    pub rotation: UnitQuaternion<f32>,
    /// Scale along each local axis
    pub scale: Vector3<f32>,
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform3D {
    /// Create an identity transform (no translation, rotation, or scale change)
    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    /// Create a transform with just a position
    pub fn from_position(position: Vector3<f32>) -> Self {
        Self {
            position,
            ..Self::identity()
        }
    }

    /// Create a transform with position and rotation
    pub fn from_position_rotation(position: Vector3<f32>, rotation: UnitQuaternion<f32>) -> Self {
        Self {
            position,
            rotation,
            ..Self::identity()
        }
    }

    /// Replace the scale
    pub fn with_scale(mut self, scale: Vector3<f32>) -> Self {
        self.scale = scale;
        self
    }

    /// Replace the scale with the same factor on every axis
    pub fn with_uniform_scale(self, scale: f32) -> Self {
        self.with_scale(Vector3::new(scale, scale, scale))
    }

    /// Position and rotation only
    pub fn isometry(&self) -> Isometry3<f32> {
        Isometry3::from_parts(Translation3::from(self.position), self.rotation)
    }

    /// Matrix applying scale, then rotation, then translation
    pub fn to_matrix(&self) -> Matrix4<f32> {
        self.isometry().to_homogeneous() * Matrix4::new_nonuniform_scaling(&self.scale)
    }

    /// Transform a point from local space to parent space
    pub fn transform_point(&self, p: Vector3<f32>) -> Vector3<f32> {
        let scaled = p.component_mul(&self.scale);
        self.isometry().transform_point(&Point3::from(scaled)).coords
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_identity() {
        let t = Transform3D::identity();
        assert_eq!(t.to_matrix(), Matrix4::identity());
        assert_eq!(t.transform_point(Vector3::new(1.0, 2.0, 3.0)), Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_transform_point_order() {
        let t = Transform3D::from_position_rotation(
            Vector3::new(10.0, 0.0, 0.0),
            UnitQuaternion::from_euler_angles(0.0, 0.0, FRAC_PI_2),
        )
        .with_scale(Vector3::new(2.0, 1.0, 1.0));

        // Scale (1,0,0) -> (2,0,0), rotate 90 deg about Z -> (0,2,0), translate
        let p = t.transform_point(Vector3::new(1.0, 0.0, 0.0));
        assert!((p - Vector3::new(10.0, 2.0, 0.0)).norm() < EPSILON);
    }

    #[test]
    fn test_matrix_matches_transform_point() {
        let t = Transform3D::from_position_rotation(
            Vector3::new(1.0, -2.0, 3.0),
            UnitQuaternion::from_euler_angles(0.2, 0.4, -0.3),
        )
        .with_scale(Vector3::new(1.5, 0.5, 2.0));

        let p = Vector3::new(0.3, 0.7, -1.1);
        let via_matrix = t.to_matrix().transform_point(&Point3::from(p)).coords;
        assert!((via_matrix - t.transform_point(p)).norm() < EPSILON);
    }

    #[test]
    fn test_uniform_scale() {
        let t = Transform3D::identity().with_uniform_scale(3.0);
        assert_eq!(t.scale, Vector3::new(3.0, 3.0, 3.0));
    }
}
