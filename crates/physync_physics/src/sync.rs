//! Read-back of simulated poses into scene transforms

use crate::body::{TrackedBodies, TrackedBody};
use crate::error::PhysicsError;
use crate::scene::SceneAccess;
use nalgebra::Isometry3;
use physync_math::{compose_into, world_to_local};
use rapier3d::prelude::{RigidBodyHandle, RigidBodySet};

/// What one write-back pass did
pub(crate) struct SyncOutcome<K> {
    /// Objects written
    pub synced: usize,
    /// Entries dropped because their object or bodies are gone
    pub untracked: Vec<(K, TrackedBody)>,
    /// First failure of the pass, if any
    pub error: Option<PhysicsError>,
}

/// Write every tracked body's pose back into the scene
///
/// Every entry is attempted. Objects that no longer exist in the scene, or
/// whose bodies are gone, are untracked so later passes skip them.
pub(crate) fn sync_tracked<S: SceneAccess>(
    scene: &mut S,
    tracked: &mut TrackedBodies<S::Key>,
    bodies: &RigidBodySet,
    scratch: &mut Isometry3<f32>,
) -> SyncOutcome<S::Key> {
    let mut synced = 0;
    let mut stale = Vec::new();
    let mut error = None;

    for (key, body) in tracked.iter() {
        let result = match body {
            TrackedBody::Instanced(handles) => sync_instances(scene, key, handles, bodies, scratch),
            TrackedBody::Single(handle) => sync_single(scene, key, *handle, bodies, scratch),
        };
        match result {
            Ok(()) => synced += 1,
            Err(e) => {
                if matches!(e, PhysicsError::MissingObject(_) | PhysicsError::StaleBody(_)) {
                    stale.push(key);
                }
                error.get_or_insert(e);
            }
        }
    }

    let untracked = stale
        .into_iter()
        .filter_map(|key| tracked.remove(key).map(|body| (key, body)))
        .collect();
    SyncOutcome {
        synced,
        untracked,
        error,
    }
}

fn sync_instances<S: SceneAccess>(
    scene: &mut S,
    key: S::Key,
    handles: &[RigidBodyHandle],
    bodies: &RigidBodySet,
    scratch: &mut Isometry3<f32>,
) -> Result<(), PhysicsError> {
    let buffer = scene
        .instances_mut(key)
        .ok_or_else(|| PhysicsError::MissingObject(format!("{:?}", key)))?;

    if handles.len() > buffer.capacity() {
        return Err(PhysicsError::InstanceBufferTooSmall {
            object: format!("{:?}", key),
            bodies: handles.len(),
            slots: buffer.capacity(),
        });
    }

    for (slot, handle) in buffer.slots_mut().iter_mut().zip(handles) {
        let body = bodies
            .get(*handle)
            .ok_or_else(|| PhysicsError::StaleBody(format!("{:?}", key)))?;
        *scratch = *body.position();
        compose_into(slot, &scratch.translation.vector, &scratch.rotation);
    }

    buffer.mark_needs_update();
    Ok(())
}

fn sync_single<S: SceneAccess>(
    scene: &mut S,
    key: S::Key,
    handle: RigidBodyHandle,
    bodies: &RigidBodySet,
    scratch: &mut Isometry3<f32>,
) -> Result<(), PhysicsError> {
    let body = bodies
        .get(handle)
        .ok_or_else(|| PhysicsError::StaleBody(format!("{:?}", key)))?;
    *scratch = *body.position();

    let parent = scene
        .parent_world_matrix(key)
        .ok_or_else(|| PhysicsError::MissingObject(format!("{:?}", key)))?;
    let (position, rotation) = world_to_local(&parent, &scratch.translation.vector, &scratch.rotation)
        .ok_or_else(|| PhysicsError::SingularParent(format!("{:?}", key)))?;

    if !scene.set_local_pose(key, position, rotation) {
        return Err(PhysicsError::MissingObject(format!("{:?}", key)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::Geometry;
    use crate::testing::FlatScene;
    use nalgebra::{Matrix4, Translation3, UnitQuaternion, Vector3};
    use physync_math::InstanceBuffer;
    use rapier3d::prelude::RigidBodyBuilder;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn test_single_body_written_in_parent_space() {
        let mut scene = FlatScene::new();
        let parent_rotation = UnitQuaternion::from_euler_angles(0.0, FRAC_PI_2, 0.0);
        let key = scene.add(Geometry::cuboid(1.0, 1.0, 1.0), Isometry3::identity());
        scene.set_parent_world(
            key,
            Isometry3::from_parts(Translation3::new(0.0, 10.0, 0.0), parent_rotation).to_homogeneous(),
        );

        let mut bodies = RigidBodySet::new();
        let handle = bodies.insert(RigidBodyBuilder::dynamic().translation(Vector3::new(0.0, 12.0, 0.0)).build());

        let mut tracked = TrackedBodies::new();
        tracked.insert(key, TrackedBody::Single(handle));

        let mut scratch = Isometry3::identity();
        let outcome = sync_tracked(&mut scene, &mut tracked, &bodies, &mut scratch);
        assert!(outcome.error.is_none());
        assert_eq!(outcome.synced, 1);

        let local = scene.local_pose(key).unwrap();
        assert!((local.translation.vector - Vector3::new(0.0, 2.0, 0.0)).norm() < 1e-5);
        assert!(local.rotation.angle_to(&parent_rotation.inverse()) < 1e-4);
    }

    #[test]
    fn test_instances_written_and_marked() {
        let mut scene = FlatScene::new();
        let key = scene.add(Geometry::sphere(0.5), Isometry3::identity());
        scene.set_instances(key, InstanceBuffer::new(2));

        let mut bodies = RigidBodySet::new();
        let a = bodies.insert(RigidBodyBuilder::dynamic().translation(Vector3::new(1.0, 0.0, 0.0)).build());
        let b = bodies.insert(RigidBodyBuilder::dynamic().translation(Vector3::new(0.0, 3.0, 0.0)).build());

        let mut tracked = TrackedBodies::new();
        tracked.insert(key, TrackedBody::Instanced(vec![a, b]));

        let mut scratch = Isometry3::identity();
        let outcome = sync_tracked(&mut scene, &mut tracked, &bodies, &mut scratch);
        assert!(outcome.error.is_none());

        let buffer = scene.instances(key).unwrap();
        assert!(buffer.needs_update());
        assert_eq!(buffer.slot(0).unwrap()[12], 1.0);
        assert_eq!(buffer.slot(1).unwrap()[13], 3.0);
        assert_eq!(buffer.slot(1).unwrap()[15], 1.0);
    }

    #[test]
    fn test_buffer_too_small() {
        let mut scene = FlatScene::new();
        let key = scene.add(Geometry::sphere(0.5), Isometry3::identity());
        scene.set_instances(key, InstanceBuffer::new(1));

        let mut bodies = RigidBodySet::new();
        let a = bodies.insert(RigidBodyBuilder::dynamic().build());
        let b = bodies.insert(RigidBodyBuilder::dynamic().build());

        let mut tracked = TrackedBodies::new();
        tracked.insert(key, TrackedBody::Instanced(vec![a, b]));

        let mut scratch = Isometry3::identity();
        let outcome = sync_tracked(&mut scene, &mut tracked, &bodies, &mut scratch);
        assert!(matches!(
            outcome.error,
            Some(PhysicsError::InstanceBufferTooSmall { bodies: 2, slots: 1, .. })
        ));
        // The object still exists, so it stays tracked
        assert!(tracked.contains(key));
    }

    #[test]
    fn test_singular_parent() {
        let mut scene = FlatScene::new();
        let key = scene.add(Geometry::cuboid(1.0, 1.0, 1.0), Isometry3::identity());
        scene.set_parent_world(key, Matrix4::zeros());

        let mut bodies = RigidBodySet::new();
        let handle = bodies.insert(RigidBodyBuilder::dynamic().build());
        let mut tracked = TrackedBodies::new();
        tracked.insert(key, TrackedBody::Single(handle));

        let mut scratch = Isometry3::identity();
        let outcome = sync_tracked(&mut scene, &mut tracked, &bodies, &mut scratch);
        assert!(matches!(outcome.error, Some(PhysicsError::SingularParent(_))));
        assert!(tracked.contains(key));
    }

    #[test]
    fn test_missing_object_does_not_block_others() {
        let mut scene = FlatScene::new();
        let removed = scene.add(Geometry::cuboid(1.0, 1.0, 1.0), Isometry3::identity());
        let kept = scene.add(Geometry::cuboid(1.0, 1.0, 1.0), Isometry3::identity());

        let mut bodies = RigidBodySet::new();
        let a = bodies.insert(RigidBodyBuilder::dynamic().build());
        let b = bodies.insert(RigidBodyBuilder::dynamic().translation(Vector3::new(0.0, 4.0, 0.0)).build());
        let mut tracked = TrackedBodies::new();
        tracked.insert(removed, TrackedBody::Single(a));
        tracked.insert(kept, TrackedBody::Single(b));
        scene.remove(removed);

        let mut scratch = Isometry3::identity();
        let outcome = sync_tracked(&mut scene, &mut tracked, &bodies, &mut scratch);
        assert!(matches!(outcome.error, Some(PhysicsError::MissingObject(_))));
        assert_eq!(outcome.synced, 1);
        assert_eq!(scene.writes(kept), 1);
        assert_eq!(scene.local_pose(kept).unwrap().translation.y, 4.0);

        // The removed object is untracked, so the next pass is clean
        assert_eq!(outcome.untracked.len(), 1);
        assert_eq!(outcome.untracked[0].0, removed);
        assert!(!tracked.contains(removed));

        let outcome = sync_tracked(&mut scene, &mut tracked, &bodies, &mut scratch);
        assert!(outcome.error.is_none());
        assert_eq!(outcome.synced, 1);
        assert_eq!(scene.writes(kept), 2);
    }

    #[test]
    fn test_stale_body_untracked() {
        let mut scene = FlatScene::new();
        let key = scene.add(Geometry::cuboid(1.0, 1.0, 1.0), Isometry3::identity());

        let mut other = RigidBodySet::new();
        let handle = other.insert(RigidBodyBuilder::dynamic().build());
        let mut tracked = TrackedBodies::new();
        tracked.insert(key, TrackedBody::Single(handle));

        let bodies = RigidBodySet::new();
        let mut scratch = Isometry3::identity();
        let outcome = sync_tracked(&mut scene, &mut tracked, &bodies, &mut scratch);
        assert!(matches!(outcome.error, Some(PhysicsError::StaleBody(_))));
        assert!(tracked.is_empty());
    }
}
