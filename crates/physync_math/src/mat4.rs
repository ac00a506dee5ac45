//! 4x4 matrix utilities for render-space transforms
//!
//! Render transforms are stored column-major (translation in elements 12..15),
//! which matches both nalgebra's storage order and the layout GPU instance
//! buffers expect.

use nalgebra::{Isometry3, Matrix3, Matrix4, Point3, Translation3, UnitQuaternion, Vector3};

/// Write a rotation and translation into a 16-element column-major slot.
///
/// Expands the rotation matrix directly from the quaternion components so no
/// intermediate matrix is built. Scale is not written: the slot ends up as a
/// rigid transform with `slot[15] == 1.0`.
pub fn compose_into(slot: &mut [f32; 16], position: &Vector3<f32>, rotation: &UnitQuaternion<f32>) {
    let q = rotation.quaternion();
    let (x, y, z, w) = (q.i, q.j, q.k, q.w);
    let (x2, y2, z2) = (x + x, y + y, z + z);
    let (xx, xy, xz) = (x * x2, x * y2, x * z2);
    let (yy, yz, zz) = (y * y2, y * z2, z * z2);
    let (wx, wy, wz) = (w * x2, w * y2, w * z2);

    slot[0] = 1.0 - (yy + zz);
    slot[1] = xy + wz;
    slot[2] = xz - wy;
    slot[3] = 0.0;

    slot[4] = xy - wz;
    slot[5] = 1.0 - (xx + zz);
    slot[6] = yz + wx;
    slot[7] = 0.0;

    slot[8] = xz + wy;
    slot[9] = yz - wx;
    slot[10] = 1.0 - (xx + yy);
    slot[11] = 0.0;

    slot[12] = position.x;
    slot[13] = position.y;
    slot[14] = position.z;
    slot[15] = 1.0;
}

/// Read a rigid pose out of a 16-element column-major slot.
///
/// Basis columns are normalized before the rotation is recovered, so slots
/// carrying a per-instance scale still decode to a proper rotation.
pub fn decode_isometry(slot: &[f32; 16]) -> Isometry3<f32> {
    let m = Matrix4::from_column_slice(slot);
    let translation = Translation3::new(m[(0, 3)], m[(1, 3)], m[(2, 3)]);
    let rotation = UnitQuaternion::from_matrix(&normalized_basis(&m));
    Isometry3::from_parts(translation, rotation)
}

/// Extract the pure rotation part of an affine matrix.
///
/// Each basis column is divided by its length and the translation is dropped.
/// Degenerate (zero-length) columns are left as zero.
pub fn extract_rotation(m: &Matrix4<f32>) -> Matrix4<f32> {
    let basis = normalized_basis(m);
    let mut out = Matrix4::identity();
    out.fixed_view_mut::<3, 3>(0, 0).copy_from(&basis);
    out
}

/// Express a world-space position and rotation in the local space of a parent.
///
/// The position is run through the parent's inverse world matrix. For the
/// rotation only the rotation part of that inverse is applied, so the parent's
/// scale never leaks into the child's orientation.
///
/// Returns `None` if the parent matrix is not invertible.
pub fn world_to_local(
    parent_world: &Matrix4<f32>,
    position: &Vector3<f32>,
    rotation: &UnitQuaternion<f32>,
) -> Option<(Vector3<f32>, UnitQuaternion<f32>)> {
    let inverse = parent_world.try_inverse()?;
    let local_position = inverse.transform_point(&Point3::from(*position)).coords;

    let mut rotation_matrix = rotation.to_homogeneous();
    rotation_matrix = extract_rotation(&inverse) * rotation_matrix;
    let basis: Matrix3<f32> = rotation_matrix.fixed_view::<3, 3>(0, 0).into_owned();

    Some((local_position, UnitQuaternion::from_matrix(&basis)))
}

fn normalized_basis(m: &Matrix4<f32>) -> Matrix3<f32> {
    let mut basis: Matrix3<f32> = m.fixed_view::<3, 3>(0, 0).into_owned();
    for mut column in basis.column_iter_mut() {
        let length = column.norm();
        if length > f32::EPSILON {
            column /= length;
        }
    }
    basis
}
