//! Flat in-memory scene for unit tests

use crate::scene::SceneAccess;
use crate::shapes::Geometry;
use nalgebra::{Isometry3, Matrix4, UnitQuaternion, Vector3};
use physync_math::InstanceBuffer;

struct Object {
    geometry: Geometry,
    scale: Vector3<f32>,
    local: Isometry3<f32>,
    parent_world: Matrix4<f32>,
    instances: Option<InstanceBuffer>,
    writes: usize,
}

/// Objects with an explicit parent world matrix instead of a hierarchy
pub(crate) struct FlatScene {
    objects: Vec<Option<Object>>,
}

impl FlatScene {
    pub fn new() -> Self {
        Self { objects: Vec::new() }
    }

    pub fn add(&mut self, geometry: Geometry, local: Isometry3<f32>) -> usize {
        self.objects.push(Some(Object {
            geometry,
            scale: Vector3::new(1.0, 1.0, 1.0),
            local,
            parent_world: Matrix4::identity(),
            instances: None,
            writes: 0,
        }));
        self.objects.len() - 1
    }

    pub fn remove(&mut self, key: usize) {
        if let Some(slot) = self.objects.get_mut(key) {
            *slot = None;
        }
    }

    pub fn set_scale(&mut self, key: usize, scale: Vector3<f32>) {
        if let Some(object) = self.get_mut(key) {
            object.scale = scale;
        }
    }

    pub fn set_parent_world(&mut self, key: usize, parent_world: Matrix4<f32>) {
        if let Some(object) = self.get_mut(key) {
            object.parent_world = parent_world;
        }
    }

    pub fn set_instances(&mut self, key: usize, instances: InstanceBuffer) {
        if let Some(object) = self.get_mut(key) {
            object.instances = Some(instances);
        }
    }

    pub fn local_pose(&self, key: usize) -> Option<Isometry3<f32>> {
        self.get(key).map(|o| o.local)
    }

    pub fn writes(&self, key: usize) -> usize {
        self.get(key).map(|o| o.writes).unwrap_or(0)
    }

    fn get(&self, key: usize) -> Option<&Object> {
        self.objects.get(key).and_then(Option::as_ref)
    }

    fn get_mut(&mut self, key: usize) -> Option<&mut Object> {
        self.objects.get_mut(key).and_then(Option::as_mut)
    }
}

impl SceneAccess for FlatScene {
    type Key = usize;

    fn geometry(&self, key: usize) -> Option<&Geometry> {
        self.get(key).map(|o| &o.geometry)
    }

    fn world_scale(&self, key: usize) -> Option<Vector3<f32>> {
        self.get(key).map(|o| o.scale)
    }

    fn world_pose(&self, key: usize) -> Option<Isometry3<f32>> {
        // Parent matrices in these tests are rigid
        let object = self.get(key)?;
        let world = object.parent_world * object.local.to_homogeneous();
        let mut slot = [0.0; 16];
        slot.copy_from_slice(world.as_slice());
        Some(physync_math::decode_isometry(&slot))
    }

    fn parent_world_matrix(&self, key: usize) -> Option<Matrix4<f32>> {
        self.get(key).map(|o| o.parent_world)
    }

    fn instances(&self, key: usize) -> Option<&InstanceBuffer> {
        self.get(key).and_then(|o| o.instances.as_ref())
    }

    fn instances_mut(&mut self, key: usize) -> Option<&mut InstanceBuffer> {
        self.get_mut(key).and_then(|o| o.instances.as_mut())
    }

    fn set_local_pose(&mut self, key: usize, position: Vector3<f32>, rotation: UnitQuaternion<f32>) -> bool {
        match self.get_mut(key) {
            Some(object) => {
                object.local = Isometry3::from_parts(position.into(), rotation);
                object.writes += 1;
                true
            }
            None => false,
        }
    }
}
