//! Physics world lifecycle and simulation

use crate::action::{Action, ActionContext};
use crate::body::{create_bodies, Attachment, TrackedBodies, TrackedBody};
use crate::character::{CharacterKey, CharacterRig, CharacterSettings, KinematicCharacter, CHARACTER_GROUP};
use crate::error::PhysicsError;
use crate::hooks::{UpdateHandle, UpdateRegistry};
use crate::scene::SceneAccess;
use crate::shapes::{build_shape, CollisionShape, DEFAULT_MARGIN};
use crate::sync;
use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use physync_math::{decode_isometry, BufferUsage};
use rapier3d::prelude::{
    ActiveCollisionTypes, BroadPhaseBvh, CCDSolver, ColliderHandle, ColliderSet, ImpulseJointSet,
    IntegrationParameters, InteractionGroups, IslandManager, MultibodyJointSet, NarrowPhase, PhysicsPipeline,
    RigidBodyBuilder, RigidBodyHandle, RigidBodySet,
};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Configuration for the physics simulation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Gravity acceleration
    pub gravity: [f32; 3],
    /// Length of one integration sub-step in seconds
    pub fixed_timestep: f32,
    /// Most sub-steps run in a single tick
    pub max_sub_steps: u32,
    /// Collision envelope padding for primitive shapes
    pub shape_margin: f32,
    /// Let character ghosts report overlaps with fixed and kinematic colliders
    pub ghost_pairs: bool,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, -9.8, 0.0],
            fixed_timestep: 1.0 / 60.0,
            max_sub_steps: 10,
            shape_margin: DEFAULT_MARGIN,
            ghost_pairs: true,
        }
    }
}

impl PhysicsConfig {
    /// Create a config with the given gravity and default stepping
    pub fn new(gravity: Vector3<f32>) -> Self {
        Self {
            gravity: gravity.into(),
            ..Self::default()
        }
    }

    /// Gravity as a vector
    pub fn gravity_vector(&self) -> Vector3<f32> {
        Vector3::from(self.gravity)
    }

    /// Check that the config can drive a simulation
    pub fn validate(&self) -> Result<(), PhysicsError> {
        if self.gravity.iter().any(|g| !g.is_finite()) {
            return Err(PhysicsError::InvalidConfig(format!("gravity must be finite, got {:?}", self.gravity)));
        }
        if !(self.fixed_timestep.is_finite() && self.fixed_timestep > 0.0) {
            return Err(PhysicsError::InvalidConfig(format!(
                "fixed_timestep must be positive, got {}",
                self.fixed_timestep
            )));
        }
        if self.max_sub_steps == 0 {
            return Err(PhysicsError::InvalidConfig("max_sub_steps must be at least 1".to_string()));
        }
        if !(self.shape_margin.is_finite() && self.shape_margin >= 0.0) {
            return Err(PhysicsError::InvalidConfig(format!(
                "shape_margin must be non-negative, got {}",
                self.shape_margin
            )));
        }
        Ok(())
    }
}

/// Lifecycle state of a [`PhysicsWorld`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WorldState {
    /// Never initialized, or initialization failed
    #[default]
    Uninitialized,
    /// Simulating
    Running,
    /// Shut down; a fresh `initialize` rebuilds everything
    Stopped,
}

/// What one call to [`PhysicsWorld::step`] did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Integration sub-steps executed
    pub sub_steps: usize,
    /// Tracked objects whose transforms were written back
    pub synced: usize,
}

/// Bodies, colliders, joints and the pipeline that integrates them
struct Dynamics {
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
}

impl Dynamics {
    fn remove_body(&mut self, handle: RigidBodyHandle) {
        self.bodies.remove(
            handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
    }
}

/// Constraint solver parameters and the continuous collision solver
struct Solver {
    params: IntegrationParameters,
    ccd: CCDSolver,
}

/// World-wide collision settings
struct CollisionConfiguration {
    gravity: Vector3<f32>,
    margin: f32,
    ghost_pairs: bool,
}

/// Everything that exists only while the world runs
///
/// Fields are declared in release order.
struct Backend {
    dynamics: Dynamics,
    solver: Solver,
    broad_phase: BroadPhaseBvh,
    narrow_phase: NarrowPhase,
    configuration: CollisionConfiguration,
    scratch: Isometry3<f32>,
    accumulator: f32,
}

impl Backend {
    fn new(config: &PhysicsConfig) -> Self {
        let configuration = CollisionConfiguration {
            gravity: config.gravity_vector(),
            margin: config.shape_margin,
            ghost_pairs: config.ghost_pairs,
        };
        let narrow_phase = NarrowPhase::new();
        let broad_phase = BroadPhaseBvh::new();
        let solver = Solver {
            params: IntegrationParameters {
                dt: config.fixed_timestep,
                ..IntegrationParameters::default()
            },
            ccd: CCDSolver::new(),
        };
        let dynamics = Dynamics {
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
        };

        Self {
            dynamics,
            solver,
            broad_phase,
            narrow_phase,
            configuration,
            scratch: Isometry3::identity(),
            accumulator: 0.0,
        }
    }

    /// Run the character actions, then one integration sub-step
    fn step_once(&mut self, characters: &mut SlotMap<CharacterKey, KinematicCharacter>) {
        let dt = self.solver.params.dt;
        let Backend {
            dynamics,
            solver,
            broad_phase,
            narrow_phase,
            configuration,
            ..
        } = self;

        if !characters.is_empty() {
            let mut ctx = ActionContext {
                bodies: &mut dynamics.bodies,
                colliders: &dynamics.colliders,
                broad_phase: &*broad_phase,
                narrow_phase: &*narrow_phase,
            };
            for (_, character) in characters.iter_mut() {
                character.update_action(&mut ctx, dt);
            }
        }

        dynamics.pipeline.step(
            &configuration.gravity,
            &solver.params,
            &mut dynamics.islands,
            broad_phase,
            narrow_phase,
            &mut dynamics.bodies,
            &mut dynamics.colliders,
            &mut dynamics.impulse_joints,
            &mut dynamics.multibody_joints,
            &mut solver.ccd,
            &(),
            &(),
        );
    }

    /// Drop every native structure, world first and configuration last
    fn release(self) {
        let Backend {
            dynamics,
            solver,
            broad_phase,
            narrow_phase,
            configuration,
            ..
        } = self;

        let (bodies, colliders) = (dynamics.bodies.len(), dynamics.colliders.len());
        drop(dynamics);
        log::debug!("Released dynamics world ({} bodies, {} colliders)", bodies, colliders);
        drop(solver);
        log::debug!("Released constraint solver");
        drop(broad_phase);
        log::debug!("Released broad phase");
        drop(narrow_phase);
        log::debug!("Released narrow phase");
        drop(configuration);
        log::debug!("Released collision configuration");
    }
}

/// The physics world: owns the simulation and the bodies attached to scene objects
///
/// `K` identifies scene objects. Every operation that touches the simulation
/// quietly does nothing (returning `None`, `false` or an empty report) unless
/// the world is running.
pub struct PhysicsWorld<K> {
    /// Physics configuration, applied on the next `initialize`
    pub config: PhysicsConfig,
    state: WorldState,
    backend: Option<Backend>,
    tracked: TrackedBodies<K>,
    characters: SlotMap<CharacterKey, KinematicCharacter>,
    update_hook: Option<UpdateHandle>,
}

impl<K: Copy + Eq + Hash + Debug> PhysicsWorld<K> {
    /// Create an uninitialized world with default configuration
    pub fn new() -> Self {
        Self::with_config(PhysicsConfig::default())
    }

    /// Create an uninitialized world with custom configuration
    pub fn with_config(config: PhysicsConfig) -> Self {
        Self {
            config,
            state: WorldState::Uninitialized,
            backend: None,
            tracked: TrackedBodies::new(),
            characters: SlotMap::with_key(),
            update_hook: None,
        }
    }

    /// Build the simulation and start receiving per-tick updates
    ///
    /// Calling this while already running logs a warning and changes nothing.
    /// After `shutdown` it rebuilds everything from scratch.
    pub fn initialize(&mut self, hooks: &mut dyn UpdateRegistry) -> Result<(), PhysicsError> {
        if self.state == WorldState::Running {
            log::warn!("Physics world already running; ignoring initialize");
            return Ok(());
        }
        self.config.validate()?;

        self.backend = Some(Backend::new(&self.config));
        self.tracked.clear();
        self.characters.clear();
        self.update_hook = Some(hooks.register_update());
        self.state = WorldState::Running;

        log::debug!(
            "Physics world initialized (gravity {:?}, step {:.4}s, max {} sub-steps)",
            self.config.gravity,
            self.config.fixed_timestep,
            self.config.max_sub_steps
        );
        Ok(())
    }

    /// Stop updates, forget all tracking and release the simulation
    ///
    /// Safe to call repeatedly and before `initialize`.
    pub fn shutdown(&mut self, hooks: &mut dyn UpdateRegistry) {
        if let Some(handle) = self.update_hook.take() {
            hooks.cancel_update(handle);
        }
        self.tracked.clear();
        self.characters.clear();

        if let Some(backend) = self.backend.take() {
            backend.release();
        }
        if self.state == WorldState::Running {
            self.state = WorldState::Stopped;
            log::debug!("Physics world stopped");
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> WorldState {
        self.state
    }

    /// Whether the world is simulating
    pub fn is_running(&self) -> bool {
        self.state == WorldState::Running && self.backend.is_some()
    }

    /// Per-tick update registered by `initialize`
    pub fn update_hook(&self) -> Option<UpdateHandle> {
        self.update_hook
    }

    /// Collision shape for a scene object, from its geometry and world scale
    pub fn build_shape<S: SceneAccess<Key = K>>(&self, scene: &S, key: K) -> Option<CollisionShape> {
        if !self.is_running() {
            return None;
        }
        let geometry = scene.geometry(key)?;
        let scale = scene.world_scale(key)?;
        build_shape(geometry, &scale, self.config.shape_margin)
    }

    /// Give a scene object a rigid body (or one per instance)
    ///
    /// Objects with positive mass are dynamic and tracked, so their transforms
    /// follow the simulation. Zero mass makes fixed, untracked bodies.
    pub fn attach_body<S: SceneAccess<Key = K>>(&mut self, scene: &mut S, key: K, mass: f32) -> Option<Attachment> {
        let shape = self.build_shape(scene, key)?;
        if shape.is_static_only() && mass > 0.0 {
            log::warn!("Triangle mesh {:?} attached with mass {}; meshes are meant to be static", key, mass);
        }

        let instanced = scene.instances(key).is_some();
        let poses: Vec<Isometry3<f32>> = match scene.instances(key) {
            Some(buffer) => buffer.slots().iter().take(buffer.count()).map(decode_isometry).collect(),
            None => vec![scene.world_pose(key)?],
        };

        let backend = self.backend.as_mut()?;
        let handles = create_bodies(
            &mut backend.dynamics.bodies,
            &mut backend.dynamics.colliders,
            &shape,
            &poses,
            mass,
        );

        let bodies = if instanced {
            TrackedBody::Instanced(handles)
        } else {
            TrackedBody::Single(*handles.first()?)
        };

        if mass > 0.0 {
            if let Some(buffer) = scene.instances_mut(key) {
                buffer.set_usage(BufferUsage::Dynamic);
            }
            self.tracked.insert(key, bodies.clone());
        }

        log::debug!("Attached {} bod(ies) to {:?} (mass {})", bodies.len(), key, mass);
        Some(Attachment { shape, bodies })
    }

    /// Teleport a tracked body, clearing its velocity
    ///
    /// The body keeps no rotation: its pose becomes a pure translation.
    pub fn set_body_position(&mut self, key: K, position: Vector3<f32>, instance_index: usize) -> bool {
        if !self.is_running() {
            return false;
        }
        let Some(handle) = self.tracked.get(key).and_then(|b| b.handle(instance_index)) else {
            return false;
        };
        let Some(backend) = self.backend.as_mut() else {
            return false;
        };
        let Some(body) = backend.dynamics.bodies.get_mut(handle) else {
            return false;
        };

        body.set_angvel(Vector3::zeros(), true);
        body.set_linvel(Vector3::zeros(), true);
        backend.scratch = Isometry3::from_parts(Translation3::from(position), UnitQuaternion::identity());
        body.set_position(backend.scratch, true);
        true
    }

    /// Advance the simulation by `dt` seconds and write results into the scene
    ///
    /// Elapsed time accumulates; one fixed sub-step runs per whole
    /// `fixed_timestep` owed, up to `max_sub_steps`. Sub-steps beyond the cap
    /// are dropped.
    ///
    /// Every tracked object is written even if some fail; the first failure
    /// is returned. Objects gone from the scene are untracked and their
    /// bodies removed, so the next tick proceeds normally.
    pub fn step<S: SceneAccess<Key = K>>(&mut self, scene: &mut S, dt: f32) -> Result<StepReport, PhysicsError> {
        if !self.is_running() {
            return Ok(StepReport::default());
        }
        if !dt.is_finite() || dt < 0.0 {
            return Err(PhysicsError::InvalidTimeStep(dt));
        }
        let Some(backend) = self.backend.as_mut() else {
            return Ok(StepReport::default());
        };

        let fixed = backend.solver.params.dt;
        backend.accumulator += dt;
        let due = (backend.accumulator / fixed).floor();
        let remainder = backend.accumulator - due * fixed;
        // Huge elapsed times leave nothing representable to carry over
        backend.accumulator = if (0.0..fixed).contains(&remainder) { remainder } else { 0.0 };

        let max_sub_steps = self.config.max_sub_steps as usize;
        let sub_steps = if due >= max_sub_steps as f32 { max_sub_steps } else { due as usize };
        for _ in 0..sub_steps {
            backend.step_once(&mut self.characters);
        }
        if due > sub_steps as f32 {
            log::trace!("Dropped {} sub-steps", due - sub_steps as f32);
        }

        let outcome = sync::sync_tracked(scene, &mut self.tracked, &backend.dynamics.bodies, &mut backend.scratch);
        for (key, body) in &outcome.untracked {
            for handle in body.handles() {
                backend.dynamics.remove_body(*handle);
            }
            log::debug!("Untracked {:?}: its scene object is gone", key);
        }
        match outcome.error {
            Some(e) => Err(e),
            None => Ok(StepReport {
                sub_steps,
                synced: outcome.synced,
            }),
        }
    }

    /// Create a capsule character with default settings
    pub fn create_character(&mut self) -> Option<CharacterRig> {
        self.create_character_with(&CharacterSettings::default())
    }

    /// Create a capsule character
    ///
    /// The ghost starts at the origin. Its controller runs before every
    /// sub-step until the world shuts down.
    pub fn create_character_with(&mut self, settings: &CharacterSettings) -> Option<CharacterRig> {
        if !self.is_running() {
            return None;
        }
        let backend = self.backend.as_mut()?;
        let dynamics = &mut backend.dynamics;

        let shape = CollisionShape::capsule(settings.radius, settings.half_height, backend.configuration.margin);
        let body = dynamics.bodies.insert(
            RigidBodyBuilder::kinematic_position_based()
                .pose(Isometry3::identity())
                .can_sleep(false)
                .build(),
        );

        let mut collision_types = ActiveCollisionTypes::default();
        if backend.configuration.ghost_pairs {
            collision_types |= ActiveCollisionTypes::KINEMATIC_FIXED | ActiveCollisionTypes::KINEMATIC_KINEMATIC;
        }
        let ghost_collider = shape
            .collider()
            .sensor(true)
            .collision_groups(InteractionGroups::all().with_memberships(CHARACTER_GROUP))
            .active_collision_types(collision_types)
            .build();
        let ghost = dynamics.colliders.insert_with_parent(ghost_collider, body, &mut dynamics.bodies);

        let gravity = -backend.configuration.gravity.y;
        let controller = self
            .characters
            .insert(KinematicCharacter::new(settings, shape.clone(), body, ghost, gravity));

        log::debug!("Created character {:?}", controller);
        Some(CharacterRig {
            shape,
            ghost,
            body,
            controller,
        })
    }

    /// Character controller, for reading state
    pub fn character(&self, key: CharacterKey) -> Option<&KinematicCharacter> {
        self.characters.get(key)
    }

    /// Character controller, for tuning and per-tick input
    pub fn character_mut(&mut self, key: CharacterKey) -> Option<&mut KinematicCharacter> {
        self.characters.get_mut(key)
    }

    /// World position of a character's ghost (capsule center)
    pub fn character_position(&self, key: CharacterKey) -> Option<Vector3<f32>> {
        let character = self.characters.get(key)?;
        let backend = self.backend.as_ref()?;
        backend
            .dynamics
            .bodies
            .get(character.body())
            .map(|body| *body.translation())
    }

    /// Move a character without sweeping, resetting its vertical motion
    pub fn warp_character(&mut self, key: CharacterKey, position: Vector3<f32>) -> bool {
        let Some(character) = self.characters.get_mut(key) else {
            return false;
        };
        let Some(backend) = self.backend.as_mut() else {
            return false;
        };
        let Some(body) = backend.dynamics.bodies.get_mut(character.body()) else {
            return false;
        };

        let pose = Isometry3::from_parts(Translation3::from(position), *body.rotation());
        body.set_position(pose, true);
        body.set_next_kinematic_position(pose);
        character.warp(position);
        true
    }

    /// Colliders currently overlapping a character's ghost
    pub fn character_overlaps(&self, key: CharacterKey) -> Vec<ColliderHandle> {
        let (Some(character), Some(backend)) = (self.characters.get(key), self.backend.as_ref()) else {
            return Vec::new();
        };
        let ghost = character.ghost();
        backend
            .narrow_phase
            .intersection_pairs_with(ghost)
            .filter(|(_, _, intersecting)| *intersecting)
            .map(|(a, b, _)| if a == ghost { b } else { a })
            .collect()
    }

    /// Number of characters
    pub fn character_count(&self) -> usize {
        self.characters.len()
    }

    /// Number of bodies registered with the simulation
    pub fn body_count(&self) -> usize {
        self.backend.as_ref().map(|b| b.dynamics.bodies.len()).unwrap_or(0)
    }

    /// Number of colliders registered with the simulation
    pub fn collider_count(&self) -> usize {
        self.backend.as_ref().map(|b| b.dynamics.colliders.len()).unwrap_or(0)
    }

    /// Number of objects whose transforms follow the simulation
    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    /// Whether an object's transform follows the simulation
    pub fn is_tracked(&self, key: K) -> bool {
        self.tracked.contains(key)
    }

    /// Bodies tracked for an object
    pub fn tracked(&self, key: K) -> Option<&TrackedBody> {
        self.tracked.get(key)
    }

    /// Current world pose of a body
    pub fn body_pose(&self, handle: RigidBodyHandle) -> Option<Isometry3<f32>> {
        let backend = self.backend.as_ref()?;
        backend.dynamics.bodies.get(handle).map(|body| *body.position())
    }

    /// Current linear velocity of a body
    pub fn body_velocity(&self, handle: RigidBodyHandle) -> Option<Vector3<f32>> {
        let backend = self.backend.as_ref()?;
        backend.dynamics.bodies.get(handle).map(|body| *body.linvel())
    }

    /// Whether a body is simulated as dynamic
    pub fn is_dynamic(&self, handle: RigidBodyHandle) -> Option<bool> {
        let backend = self.backend.as_ref()?;
        backend.dynamics.bodies.get(handle).map(|body| body.is_dynamic())
    }

    /// Collision groups and sensor flag of a collider
    pub fn collider_groups(&self, handle: ColliderHandle) -> Option<(InteractionGroups, bool)> {
        let backend = self.backend.as_ref()?;
        backend
            .dynamics
            .colliders
            .get(handle)
            .map(|collider| (collider.collision_groups(), collider.is_sensor()))
    }
}

impl<K: Copy + Eq + Hash + Debug> Default for PhysicsWorld<K> {
    fn default() -> Self {
        Self::new()
    }
}
