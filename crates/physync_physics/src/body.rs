//! Rigid bodies attached to renderable objects

use crate::shapes::CollisionShape;
use nalgebra::{Isometry3, Point3};
use rapier3d::prelude::{ColliderSet, MassProperties, RigidBodyBuilder, RigidBodyHandle, RigidBodySet};
use std::collections::HashMap;
use std::hash::Hash;

/// Bodies created for one renderable object
#[derive(Clone, Debug, PartialEq)]
pub enum TrackedBody {
    /// One body driving the object's own transform
    Single(RigidBodyHandle),
    /// One body per instance, ordered by instance index
    Instanced(Vec<RigidBodyHandle>),
}

impl TrackedBody {
    /// All body handles, in instance order
    pub fn handles(&self) -> &[RigidBodyHandle] {
        match self {
            TrackedBody::Single(handle) => std::slice::from_ref(handle),
            TrackedBody::Instanced(handles) => handles,
        }
    }

    /// Body for one instance (index 0 for single bodies)
    pub fn handle(&self, instance_index: usize) -> Option<RigidBodyHandle> {
        self.handles().get(instance_index).copied()
    }

    /// Number of bodies
    pub fn len(&self) -> usize {
        self.handles().len()
    }

    /// Whether there are no bodies (an instanced object with zero instances)
    pub fn is_empty(&self) -> bool {
        self.handles().is_empty()
    }

    /// Whether the bodies write into an instance buffer
    pub fn is_instanced(&self) -> bool {
        matches!(self, TrackedBody::Instanced(_))
    }
}

/// Result of attaching physics to a renderable object
#[derive(Clone, Debug)]
pub struct Attachment {
    /// Shape shared by every body created for the object
    pub shape: CollisionShape,
    /// The body or bodies registered in the world
    pub bodies: TrackedBody,
}

/// Renderable objects whose transforms are read back after every step
///
/// Iteration follows attachment order so write-back is deterministic.
#[derive(Clone, Debug)]
pub struct TrackedBodies<K> {
    order: Vec<K>,
    bodies: HashMap<K, TrackedBody>,
}

impl<K: Copy + Eq + Hash> TrackedBodies<K> {
    /// Create an empty set
    pub fn new() -> Self {
        Self {
            order: Vec::new(),
            bodies: HashMap::new(),
        }
    }

    /// Track an object, replacing any bodies it was tracked with before
    pub fn insert(&mut self, key: K, body: TrackedBody) {
        if self.bodies.insert(key, body).is_none() {
            self.order.push(key);
        }
    }

    /// Bodies tracked for an object
    pub fn get(&self, key: K) -> Option<&TrackedBody> {
        self.bodies.get(&key)
    }

    /// Whether an object is tracked
    pub fn contains(&self, key: K) -> bool {
        self.bodies.contains_key(&key)
    }

    /// Number of tracked objects
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Stop tracking an object, returning its bodies
    pub fn remove(&mut self, key: K) -> Option<TrackedBody> {
        let body = self.bodies.remove(&key)?;
        self.order.retain(|k| *k != key);
        Some(body)
    }

    /// Forget every tracked object
    pub fn clear(&mut self) {
        self.order.clear();
        self.bodies.clear();
    }

    /// Tracked objects in attachment order
    pub fn iter(&self) -> impl Iterator<Item = (K, &TrackedBody)> + '_ {
        self.order
            .iter()
            .filter_map(move |key| self.bodies.get(key).map(|body| (*key, body)))
    }
}

impl<K: Copy + Eq + Hash> Default for TrackedBodies<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Register one body per pose, all sharing the same shape
///
/// Bodies with positive mass are dynamic and carry the mass and the shape's
/// inertia for that mass. Everything else is fixed. Colliders are massless so
/// the body mass is exactly `mass`.
pub(crate) fn create_bodies(
    bodies: &mut RigidBodySet,
    colliders: &mut ColliderSet,
    shape: &CollisionShape,
    poses: &[Isometry3<f32>],
    mass: f32,
) -> Vec<RigidBodyHandle> {
    let inertia = shape.local_inertia(mass);

    poses
        .iter()
        .map(|pose| {
            let builder = if mass > 0.0 {
                RigidBodyBuilder::dynamic()
                    .additional_mass_properties(MassProperties::new(Point3::origin(), mass, inertia))
            } else {
                RigidBodyBuilder::fixed()
            };

            let handle = bodies.insert(builder.pose(*pose).build());
            colliders.insert_with_parent(shape.collider().build(), handle, bodies);
            handle
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::DEFAULT_MARGIN;
    use nalgebra::Vector3;

    #[test]
    fn test_tracked_body_handles() {
        let mut bodies = RigidBodySet::new();
        let a = bodies.insert(RigidBodyBuilder::dynamic().build());
        let b = bodies.insert(RigidBodyBuilder::dynamic().build());

        let single = TrackedBody::Single(a);
        assert_eq!(single.len(), 1);
        assert_eq!(single.handle(0), Some(a));
        assert_eq!(single.handle(1), None);
        assert!(!single.is_instanced());

        let instanced = TrackedBody::Instanced(vec![a, b]);
        assert_eq!(instanced.handles(), &[a, b]);
        assert_eq!(instanced.handle(1), Some(b));
        assert!(instanced.is_instanced());
    }

    #[test]
    fn test_tracked_bodies_keep_order() {
        let mut bodies = RigidBodySet::new();
        let handle = bodies.insert(RigidBodyBuilder::dynamic().build());

        let mut tracked = TrackedBodies::new();
        tracked.insert(3u32, TrackedBody::Single(handle));
        tracked.insert(1u32, TrackedBody::Single(handle));
        tracked.insert(3u32, TrackedBody::Instanced(vec![handle]));

        let keys: Vec<u32> = tracked.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![3, 1]);
        assert!(tracked.get(3).unwrap().is_instanced());

        assert!(tracked.remove(3).unwrap().is_instanced());
        assert!(tracked.remove(3).is_none());
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked.iter().map(|(k, _)| k).collect::<Vec<u32>>(), vec![1]);

        tracked.clear();
        assert!(tracked.is_empty());
        assert!(!tracked.contains(1));
    }

    #[test]
    fn test_create_bodies_dynamic_and_fixed() {
        let mut bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();
        let shape = CollisionShape::cuboid(Vector3::new(0.5, 0.5, 0.5), DEFAULT_MARGIN);
        let poses = [Isometry3::translation(0.0, 1.0, 0.0), Isometry3::translation(2.0, 1.0, 0.0)];

        let dynamic = create_bodies(&mut bodies, &mut colliders, &shape, &poses, 2.0);
        assert_eq!(dynamic.len(), 2);
        assert!(bodies[dynamic[0]].is_dynamic());
        assert!((bodies[dynamic[1]].translation().x - 2.0).abs() < 1e-6);

        let fixed = create_bodies(&mut bodies, &mut colliders, &shape, &poses[..1], 0.0);
        assert!(bodies[fixed[0]].is_fixed());
        assert_eq!(colliders.len(), 3);
    }
}
