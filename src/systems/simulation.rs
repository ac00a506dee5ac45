//! Physics simulation system
//!
//! Runs one frame of the physics world:
//! - Frame time capping
//! - Input → character walk direction and jump
//! - Physics stepping, with failed steps logged and skipped
//! - Player node placement from the character ghost

use nalgebra::{Point3, Vector3};
use physync_physics::{CharacterKey, PhysicsWorld, ShapeKind};
use physync_scene::{NodeKey, SceneGraph};

/// Movement requested for a character this frame
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CharacterInput {
    /// Desired walking direction in world space (any length)
    pub direction: Vector3<f32>,
    /// Start a jump if standing on ground
    pub jump: bool,
}

impl CharacterInput {
    /// Walk along `direction`
    pub fn walk(direction: Vector3<f32>) -> Self {
        Self { direction, jump: false }
    }

    /// Also request a jump
    pub fn with_jump(mut self) -> Self {
        self.jump = true;
        self
    }
}

/// Result of a simulation update
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SimulationResult {
    /// Fixed sub-steps executed
    pub sub_steps: usize,
    /// Scene objects whose transforms were written
    pub synced: usize,
    /// The step failed and was skipped
    pub failed: bool,
}

/// Drives the physics world once per frame
pub struct SimulationSystem {
    max_frame_time: f32,
    failed_steps: u64,
}

impl SimulationSystem {
    /// Create a simulation system that never hands the world more than `max_frame_time` seconds
    pub fn new(max_frame_time: f32) -> Self {
        Self {
            max_frame_time,
            failed_steps: 0,
        }
    }

    /// Number of steps that failed and were skipped
    pub fn failed_steps(&self) -> u64 {
        self.failed_steps
    }

    /// Translate frame input into the character's walk direction
    ///
    /// The direction is normalized and scaled to `walk_speed * dt`, the
    /// displacement applied on each sub-step.
    pub fn drive_character(
        &self,
        physics: &mut PhysicsWorld<NodeKey>,
        character: CharacterKey,
        input: &CharacterInput,
        walk_speed: f32,
        dt: f32,
    ) -> bool {
        let Some(controller) = physics.character_mut(character) else {
            return false;
        };

        if input.jump {
            controller.jump();
        }

        let walk = match input.direction.try_normalize(f32::EPSILON) {
            Some(dir) => dir * walk_speed * dt,
            None => Vector3::zeros(),
        };
        controller.set_walk_direction(walk);
        true
    }

    /// Step the physics world and write results into the scene
    ///
    /// A failed step is logged and counted; the next frame proceeds normally.
    pub fn update(&mut self, physics: &mut PhysicsWorld<NodeKey>, scene: &mut SceneGraph, dt: f32) -> SimulationResult {
        // NaN falls through so the world reports it
        let dt = if dt > self.max_frame_time { self.max_frame_time } else { dt };

        match physics.step(scene, dt) {
            Ok(report) => {
                log::trace!("Stepped {} sub-steps, synced {} objects", report.sub_steps, report.synced);
                SimulationResult {
                    sub_steps: report.sub_steps,
                    synced: report.synced,
                    failed: false,
                }
            }
            Err(e) => {
                self.failed_steps += 1;
                log::error!("Physics step failed: {}", e);
                SimulationResult {
                    failed: true,
                    ..SimulationResult::default()
                }
            }
        }
    }

    /// Place a node with its feet at the bottom of the character capsule
    pub fn follow_character(
        &self,
        physics: &PhysicsWorld<NodeKey>,
        character: CharacterKey,
        scene: &mut SceneGraph,
        node: NodeKey,
    ) -> bool {
        let Some(position) = physics.character_position(character) else {
            return false;
        };
        let half_height = match physics.character(character).map(|c| c.shape().kind()) {
            Some(ShapeKind::Capsule { half_height, .. }) => half_height,
            _ => 0.0,
        };
        let feet = Point3::from(position - Vector3::y() * half_height);

        let Some(local) = scene
            .parent_world(node)
            .and_then(|m| m.try_inverse())
            .map(|inv| inv.transform_point(&feet))
        else {
            return false;
        };

        match scene.get_mut(node) {
            Some(n) => {
                let mut transform = n.transform;
                transform.position = local.coords;
                n.set_transform(transform);
                true
            }
            None => false,
        }
    }
}

impl Default for SimulationSystem {
    fn default() -> Self {
        Self::new(0.25)
    }
}
