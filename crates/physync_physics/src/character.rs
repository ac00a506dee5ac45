//! Kinematic capsule characters
//!
//! A character is a sensor capsule (the ghost) riding on a kinematic body that
//! never sleeps, plus a controller that moves that body once per sub-step by
//! sweeping the capsule through the world.

use crate::action::{Action, ActionContext};
use crate::shapes::CollisionShape;
use nalgebra::{Isometry3, Translation3, UnitVector3, Vector3};
use rapier3d::control::{CharacterAutostep, CharacterLength, KinematicCharacterController};
use rapier3d::prelude::{ColliderHandle, Group, QueryFilter, RigidBodyHandle};
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::f32::consts::FRAC_PI_3;

new_key_type! {
    /// Key to a character controller registered with the world
    pub struct CharacterKey;
}

/// Collision group reserved for character ghosts
pub const CHARACTER_GROUP: Group = Group::GROUP_6;

/// Default capsule radius
pub const DEFAULT_CHARACTER_RADIUS: f32 = 0.3;

/// Default capsule half height (cylindrical part)
pub const DEFAULT_CHARACTER_HALF_HEIGHT: f32 = 1.0;

/// Default maximum fall speed (units per second)
pub const DEFAULT_FALL_SPEED: f32 = 55.0;

/// Construction parameters for a character rig
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterSettings {
    /// Capsule radius
    pub radius: f32,
    /// Capsule half height
    pub half_height: f32,
    /// Highest ledge the character steps onto without jumping
    pub step_height: f32,
    /// Index of the up axis (0 = X, 1 = Y, 2 = Z)
    pub up_axis: usize,
    /// Steepest walkable slope in radians
    pub max_slope: f32,
    /// Initial upward speed of a jump
    pub jump_speed: f32,
    /// Height above take-off at which a jump stops rising
    pub max_jump_height: f32,
    /// Terminal fall speed
    pub fall_speed: f32,
}

impl Default for CharacterSettings {
    fn default() -> Self {
        Self {
            radius: DEFAULT_CHARACTER_RADIUS,
            half_height: DEFAULT_CHARACTER_HALF_HEIGHT,
            step_height: 0.1,
            up_axis: 1,
            max_slope: FRAC_PI_3,
            jump_speed: 10.0,
            max_jump_height: 1.5,
            fall_speed: DEFAULT_FALL_SPEED,
        }
    }
}

/// Handles to everything created for one character
#[derive(Clone, Debug)]
pub struct CharacterRig {
    /// Capsule shared by the ghost and the sweep tests
    pub shape: CollisionShape,
    /// Sensor collider reporting overlaps
    pub ghost: ColliderHandle,
    /// Kinematic body carrying the ghost
    pub body: RigidBodyHandle,
    /// Controller key for tuning and per-tick input
    pub controller: CharacterKey,
}

/// Walking and jumping state of one character
pub struct KinematicCharacter {
    controller: KinematicCharacterController,
    shape: CollisionShape,
    body: RigidBodyHandle,
    ghost: ColliderHandle,
    walk_direction: Vector3<f32>,
    vertical_velocity: f32,
    gravity: f32,
    jump_speed: f32,
    max_jump_height: f32,
    fall_speed: f32,
    jump_origin: Option<f32>,
    position: Vector3<f32>,
    on_ground: bool,
    use_ghost_sweep_test: bool,
}

impl KinematicCharacter {
    pub(crate) fn new(
        settings: &CharacterSettings,
        shape: CollisionShape,
        body: RigidBodyHandle,
        ghost: ColliderHandle,
        gravity: f32,
    ) -> Self {
        let controller = KinematicCharacterController {
            up: Vector3::ith_axis(settings.up_axis.min(2)),
            autostep: Some(CharacterAutostep {
                max_height: CharacterLength::Absolute(settings.step_height),
                min_width: CharacterLength::Absolute(settings.step_height),
                include_dynamic_bodies: false,
            }),
            max_slope_climb_angle: settings.max_slope,
            min_slope_slide_angle: settings.max_slope,
            ..KinematicCharacterController::default()
        };

        Self {
            controller,
            shape,
            body,
            ghost,
            walk_direction: Vector3::zeros(),
            vertical_velocity: 0.0,
            gravity,
            jump_speed: settings.jump_speed,
            max_jump_height: settings.max_jump_height,
            fall_speed: settings.fall_speed,
            jump_origin: None,
            position: Vector3::zeros(),
            on_ground: false,
            use_ghost_sweep_test: true,
        }
    }

    /// Displacement applied on every sub-step until changed
    pub fn set_walk_direction(&mut self, walk_direction: Vector3<f32>) {
        self.walk_direction = walk_direction;
    }

    /// Current per-sub-step displacement
    pub fn walk_direction(&self) -> Vector3<f32> {
        self.walk_direction
    }

    /// Start a jump (ignored while airborne)
    pub fn jump(&mut self) {
        if !self.on_ground {
            return;
        }
        self.vertical_velocity = self.jump_speed;
        self.jump_origin = Some(self.height());
        self.on_ground = false;
    }

    /// Whether a jump can start right now
    pub fn can_jump(&self) -> bool {
        self.on_ground
    }

    /// Whether the last sub-step ended standing on something
    pub fn on_ground(&self) -> bool {
        self.on_ground
    }

    /// Speed along the up axis (positive when rising)
    pub fn vertical_velocity(&self) -> f32 {
        self.vertical_velocity
    }

    /// Initial upward speed given by `jump`
    pub fn set_jump_speed(&mut self, jump_speed: f32) {
        self.jump_speed = jump_speed;
    }

    /// Initial upward speed of a jump
    pub fn jump_speed(&self) -> f32 {
        self.jump_speed
    }

    /// Height above take-off at which a jump stops rising
    pub fn set_max_jump_height(&mut self, max_jump_height: f32) {
        self.max_jump_height = max_jump_height;
    }

    /// Height above take-off at which a jump stops rising
    pub fn max_jump_height(&self) -> f32 {
        self.max_jump_height
    }

    /// Gravity magnitude pulling along the negative up axis
    pub fn set_gravity(&mut self, gravity: f32) {
        self.gravity = gravity;
    }

    /// Gravity magnitude
    pub fn gravity(&self) -> f32 {
        self.gravity
    }

    /// Terminal fall speed
    pub fn set_fall_speed(&mut self, fall_speed: f32) {
        self.fall_speed = fall_speed;
    }

    /// Steepest walkable slope in radians
    pub fn set_max_slope(&mut self, max_slope: f32) {
        self.controller.max_slope_climb_angle = max_slope;
        self.controller.min_slope_slide_angle = max_slope;
    }

    /// Steepest walkable slope in radians
    pub fn max_slope(&self) -> f32 {
        self.controller.max_slope_climb_angle
    }

    /// Skip sensors (including the ghost itself) during sweeps
    pub fn set_use_ghost_sweep_test(&mut self, enabled: bool) {
        self.use_ghost_sweep_test = enabled;
    }

    /// Whether sweeps skip sensors
    pub fn use_ghost_sweep_test(&self) -> bool {
        self.use_ghost_sweep_test
    }

    /// Capsule swept through the world
    pub fn shape(&self) -> &CollisionShape {
        &self.shape
    }

    /// Kinematic body moved by the controller
    pub fn body(&self) -> RigidBodyHandle {
        self.body
    }

    /// Sensor collider attached to the body
    pub fn ghost(&self) -> ColliderHandle {
        self.ghost
    }

    pub(crate) fn warp(&mut self, position: Vector3<f32>) {
        self.position = position;
        self.vertical_velocity = 0.0;
        self.jump_origin = None;
        self.on_ground = false;
    }

    fn up(&self) -> UnitVector3<f32> {
        self.controller.up
    }

    fn height(&self) -> f32 {
        self.position.dot(&self.up())
    }

    fn integrate_vertical_velocity(&mut self, dt: f32) {
        self.vertical_velocity -= self.gravity * dt;
        if self.vertical_velocity > self.jump_speed {
            self.vertical_velocity = self.jump_speed;
        }
        if self.vertical_velocity < -self.fall_speed.abs() {
            self.vertical_velocity = -self.fall_speed.abs();
        }

        if let Some(origin) = self.jump_origin {
            if self.vertical_velocity > 0.0 && self.height() - origin >= self.max_jump_height {
                self.vertical_velocity = 0.0;
            }
        }
    }
}

impl Action for KinematicCharacter {
    fn update_action(&mut self, ctx: &mut ActionContext<'_>, dt: f32) {
        let pose: Isometry3<f32> = match ctx.bodies.get(self.body) {
            Some(body) => *body.position(),
            None => return,
        };
        self.position = pose.translation.vector;
        self.integrate_vertical_velocity(dt);

        let up = self.up();
        let desired = self.walk_direction + up.into_inner() * (self.vertical_velocity * dt);

        let movement = {
            let mut filter = QueryFilter::default().exclude_rigid_body(self.body);
            if self.use_ghost_sweep_test {
                filter = filter.exclude_sensors();
            }
            let pipeline = ctx.query_pipeline(filter);
            self.controller
                .move_shape(dt, &pipeline, &**self.shape.shared(), &pose, desired, |_| {})
        };

        // Blocked while rising: head hit something
        let rise = movement.translation.dot(&up);
        if self.vertical_velocity > 0.0 && rise + 1e-4 < desired.dot(&up) {
            self.vertical_velocity = 0.0;
        }

        self.on_ground = movement.grounded;
        if self.on_ground && self.vertical_velocity <= 0.0 {
            self.vertical_velocity = 0.0;
            self.jump_origin = None;
        }

        self.position = pose.translation.vector + movement.translation;
        if let Some(body) = ctx.bodies.get_mut(self.body) {
            body.set_next_kinematic_position(Isometry3::from_parts(
                Translation3::from(self.position),
                pose.rotation,
            ));
        }
        log::trace!(
            "Character moved by {:?} (grounded: {})",
            movement.translation,
            self.on_ground
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::DEFAULT_MARGIN;
    use rapier3d::prelude::{ColliderBuilder, ColliderSet, RigidBodyBuilder, RigidBodySet};

    fn character() -> KinematicCharacter {
        let mut bodies = RigidBodySet::new();
        let mut colliders = ColliderSet::new();
        let body = bodies.insert(RigidBodyBuilder::kinematic_position_based().build());
        let ghost = colliders.insert_with_parent(ColliderBuilder::ball(0.3).sensor(true).build(), body, &mut bodies);
        let shape = CollisionShape::capsule(DEFAULT_CHARACTER_RADIUS, DEFAULT_CHARACTER_HALF_HEIGHT, DEFAULT_MARGIN);
        KinematicCharacter::new(&CharacterSettings::default(), shape, body, ghost, 9.8)
    }

    #[test]
    fn test_default_settings() {
        let settings = CharacterSettings::default();
        assert_eq!(settings.radius, 0.3);
        assert_eq!(settings.half_height, 1.0);
        assert_eq!(settings.step_height, 0.1);
        assert_eq!(settings.up_axis, 1);
        assert!((settings.max_slope - std::f32::consts::PI / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_controller_parameters() {
        let c = character();
        assert_eq!(c.controller.up.into_inner(), Vector3::y());
        assert!((c.max_slope() - FRAC_PI_3).abs() < 1e-6);
        assert_eq!(c.gravity(), 9.8);
        assert!(c.use_ghost_sweep_test());
    }

    #[test]
    fn test_jump_requires_ground() {
        let mut c = character();
        assert!(!c.can_jump());
        c.jump();
        assert_eq!(c.vertical_velocity(), 0.0);

        c.on_ground = true;
        assert!(c.can_jump());
        c.set_jump_speed(5.0);
        c.jump();
        assert_eq!(c.vertical_velocity(), 5.0);
        assert!(!c.on_ground());
    }

    #[test]
    fn test_fall_speed_clamp() {
        let mut c = character();
        c.set_fall_speed(2.0);
        for _ in 0..100 {
            c.integrate_vertical_velocity(1.0 / 60.0);
        }
        assert_eq!(c.vertical_velocity(), -2.0);
    }

    #[test]
    fn test_jump_stops_at_max_height() {
        let mut c = character();
        c.on_ground = true;
        c.set_max_jump_height(0.5);
        c.jump();

        c.position.y = 0.6;
        c.integrate_vertical_velocity(1.0 / 60.0);
        assert_eq!(c.vertical_velocity(), 0.0);
    }
}
