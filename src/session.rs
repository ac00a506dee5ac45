//! Play session
//!
//! A Session ties the runtime, the physics world, the scene graph and the
//! player character together and drives them frame by frame.

use crate::config::AppConfig;
use crate::scene::{PendingBody, SceneSetup};
use crate::systems::{CharacterInput, Runtime, SimulationResult, SimulationSystem};
use nalgebra::Vector3;
use physync_physics::{CharacterRig, Geometry, PhysicsError, PhysicsWorld, SceneAccess};
use physync_scene::{NodeKey, SceneGraph};

/// A running scene with physics and an optional player character
pub struct Session {
    config: AppConfig,
    runtime: Runtime,
    physics: PhysicsWorld<NodeKey>,
    scene: SceneGraph,
    simulation: SimulationSystem,
    setup: SceneSetup,
    pending: Vec<PendingBody>,
    character: Option<CharacterRig>,
    input: CharacterInput,
}

impl Session {
    /// Create a session over a built scene
    ///
    /// Nothing is simulated until [`Session::start`].
    pub fn new(config: AppConfig, mut setup: SceneSetup) -> Self {
        let physics = PhysicsWorld::with_config(config.physics.clone());
        let simulation = SimulationSystem::new(config.simulation.max_frame_time);
        let scene = std::mem::take(&mut setup.scene);
        Self {
            config,
            runtime: Runtime::new(),
            physics,
            scene,
            simulation,
            setup,
            pending: Vec::new(),
            character: None,
            input: CharacterInput::default(),
        }
    }

    /// Initialize physics and give every queued node its body
    ///
    /// Nodes that cannot get a body yet stay queued and are retried every frame.
    pub fn start(&mut self) -> Result<(), PhysicsError> {
        self.physics.initialize(&mut self.runtime)?;
        self.character = None;
        self.pending = self.setup.bodies.clone();

        let attached = self.attach_pending();
        log::info!("Session started with {} bodies ({} waiting)", attached, self.pending.len());
        Ok(())
    }

    /// Queue a body for a node, attached on the next running frame
    ///
    /// The body is also recreated whenever the session restarts.
    pub fn queue_body(&mut self, body: PendingBody) {
        self.setup.bodies.push(body);
        if self.physics.is_running() {
            self.pending.push(body);
        }
    }

    /// Bodies still waiting to be attached
    pub fn pending_bodies(&self) -> &[PendingBody] {
        &self.pending
    }

    fn attach_pending(&mut self) -> usize {
        let mut attached = 0;
        for body in std::mem::take(&mut self.pending) {
            let targets = if body.recursive {
                self.geometry_nodes(body.node)
            } else {
                vec![body.node]
            };
            for node in targets {
                if self.physics.is_tracked(node) {
                    continue;
                }
                if self.physics.attach_body(&mut self.scene, node, body.mass).is_some() {
                    attached += 1;
                } else if self.scene.get(node).is_some() {
                    log::debug!("No body for node {:?} yet; retrying next frame", node);
                    self.pending.push(PendingBody::new(node, body.mass));
                } else {
                    log::warn!("Dropping queued body for removed node {:?}", node);
                }
            }
        }
        attached
    }

    /// `root` and its descendants that have geometry, depth first
    fn geometry_nodes(&self, root: NodeKey) -> Vec<NodeKey> {
        let mut found = Vec::new();
        let mut stack = vec![root];
        while let Some(key) = stack.pop() {
            let Some(node) = self.scene.get(key) else {
                continue;
            };
            if !matches!(node.geometry, Geometry::Unsupported) {
                found.push(key);
            }
            stack.extend(node.children().iter().rev());
        }
        found
    }

    /// Input applied to the character on following frames
    pub fn set_input(&mut self, input: CharacterInput) {
        self.input = input;
    }

    /// Run one frame
    ///
    /// Does nothing unless physics is running and its update is registered.
    /// The character is created on the first running frame.
    pub fn frame(&mut self, dt: f32) -> SimulationResult {
        self.runtime.begin_frame(dt);

        let registered = self
            .physics
            .update_hook()
            .is_some_and(|hook| self.runtime.is_registered(hook));
        if !self.physics.is_running() || !registered {
            return SimulationResult::default();
        }

        if !self.pending.is_empty() {
            self.attach_pending();
        }
        if self.character.is_none() {
            self.character = self.spawn_character();
        }

        let walk_speed = self.config.character.walk_speed;
        let dt = self.runtime.delta_time();
        if let Some(rig) = &self.character {
            self.simulation
                .drive_character(&mut self.physics, rig.controller, &self.input, walk_speed, dt);
        }
        // Jump is edge-triggered
        self.input.jump = false;

        let result = self.simulation.update(&mut self.physics, &mut self.scene, dt);

        if let (Some(rig), Some(player)) = (&self.character, self.setup.player) {
            self.simulation
                .follow_character(&self.physics, rig.controller, &mut self.scene, player);
        }
        result
    }

    fn spawn_character(&mut self) -> Option<CharacterRig> {
        let settings = self.config.character.to_settings();
        let rig = self.physics.create_character_with(&settings)?;

        if let Some(controller) = self.physics.character_mut(rig.controller) {
            controller.set_jump_speed(self.config.character.jump_speed);
            controller.set_max_jump_height(self.config.character.jump_height);
        }
        if let Some(spawn) = self.setup.spawn {
            self.physics.warp_character(rig.controller, spawn);
        }
        log::debug!("Character created at {:?}", self.setup.spawn.unwrap_or_else(Vector3::zeros));
        Some(rig)
    }

    /// Stop the runtime and tear down physics
    ///
    /// Stop hooks fire once; later calls only repeat the (idempotent) shutdown.
    pub fn stop(&mut self) {
        self.runtime.stop();
        self.physics.shutdown(&mut self.runtime);
        self.character = None;
    }

    /// Character rig, once created
    pub fn character(&self) -> Option<&CharacterRig> {
        self.character.as_ref()
    }

    /// Character capsule center
    pub fn character_position(&self) -> Option<Vector3<f32>> {
        self.character
            .as_ref()
            .and_then(|rig| self.physics.character_position(rig.controller))
    }

    /// World position of a named node
    pub fn node_position(&self, name: &str) -> Option<Vector3<f32>> {
        let key = self.scene.get_by_name(name)?;
        self.scene.world_pose(key).map(|pose| pose.translation.vector)
    }

    /// Key of the player node
    pub fn player(&self) -> Option<NodeKey> {
        self.setup.player
    }

    /// The physics world
    pub fn physics(&self) -> &PhysicsWorld<NodeKey> {
        &self.physics
    }

    /// The physics world, mutable
    pub fn physics_mut(&mut self) -> &mut PhysicsWorld<NodeKey> {
        &mut self.physics
    }

    /// The scene graph
    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    /// The scene graph, mutable
    pub fn scene_mut(&mut self) -> &mut SceneGraph {
        &mut self.scene
    }

    /// The runtime
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// The runtime, mutable (for stop hooks)
    pub fn runtime_mut(&mut self) -> &mut Runtime {
        &mut self.runtime
    }

    /// Number of steps that failed and were skipped
    pub fn failed_steps(&self) -> u64 {
        self.simulation.failed_steps()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneBuilder;
    use physync_physics::WorldState;
    use physync_scene::{Node, Transform3D};

    const DT: f32 = 1.0 / 60.0;

    fn demo_setup() -> SceneSetup {
        SceneBuilder::new()
            .add_ground(0.0, 20.0)
            .add_box("crate", Vector3::new(3.0, 4.0, 0.0), Vector3::new(1.0, 1.0, 1.0), 1.0)
            .add_player(Vector3::new(0.0, 2.0, 0.0))
            .build()
    }

    #[test]
    fn test_frames_before_start_do_nothing() {
        let mut session = Session::new(AppConfig::default(), demo_setup());
        let result = session.frame(DT);
        assert_eq!(result, SimulationResult::default());
        assert!(session.character().is_none());
        assert_eq!(session.runtime().frame(), 1);
    }

    #[test]
    fn test_start_attaches_bodies() {
        let mut session = Session::new(AppConfig::default(), demo_setup());
        session.start().unwrap();
        // Ground is static, so only the crate is tracked
        assert_eq!(session.physics().body_count(), 2);
        assert_eq!(session.physics().tracked_count(), 1);
        assert_eq!(session.runtime().update_count(), 1);
        // Character waits for the first frame
        assert!(session.character().is_none());
    }

    #[test]
    fn test_character_created_on_first_frame() {
        let mut session = Session::new(AppConfig::default(), demo_setup());
        session.start().unwrap();
        session.frame(DT);

        let rig = session.character().unwrap().clone();
        let controller = session.physics().character(rig.controller).unwrap();
        assert_eq!(controller.jump_speed(), 50.0);
        assert_eq!(controller.max_jump_height(), 0.5);

        session.frame(DT);
        assert_eq!(session.physics().character_count(), 1);
    }

    #[test]
    fn test_crate_falls_and_player_follows() {
        let mut session = Session::new(AppConfig::default(), demo_setup());
        session.start().unwrap();
        for _ in 0..180 {
            session.frame(DT);
        }

        // Crate resting on the ground
        let crate_y = session.node_position("crate").unwrap().y;
        assert!((crate_y - 0.5).abs() < 0.1, "crate at {}", crate_y);

        // Player node at the bottom of the capsule
        let center = session.character_position().unwrap();
        let feet = session.node_position("player").unwrap();
        assert!((center.y - feet.y - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut session = Session::new(AppConfig::default(), demo_setup());
        session.start().unwrap();
        session.frame(DT);

        session.stop();
        assert_eq!(session.physics().state(), WorldState::Stopped);
        assert_eq!(session.runtime().update_count(), 0);
        assert!(session.character().is_none());

        session.stop();
        assert_eq!(session.physics().state(), WorldState::Stopped);
        assert_eq!(session.frame(DT), SimulationResult::default());
    }

    #[test]
    fn test_invalid_config_fails_start() {
        let mut config = AppConfig::default();
        config.physics.max_sub_steps = 0;
        let mut session = Session::new(config, demo_setup());
        assert!(matches!(session.start(), Err(PhysicsError::InvalidConfig(_))));
        assert!(!session.physics().is_running());
    }

    #[test]
    fn test_body_tree_attaches_every_mesh() {
        let setup = SceneBuilder::new()
            .add_group("rig", Transform3D::from_position(Vector3::new(0.0, 5.0, 0.0)))
            .add_child("rig", Node::new(Geometry::cuboid(1.0, 1.0, 1.0)).with_name("left"), None)
            .add_child("rig", Node::group().with_name("arm"), None)
            .add_child("arm", Node::new(Geometry::sphere(0.5)).with_name("hand"), None)
            .add_body_tree("rig", 1.0)
            .build();
        let mut session = Session::new(AppConfig::default(), setup);
        session.start().unwrap();

        let scene = session.scene();
        let physics = session.physics();
        assert_eq!(physics.tracked_count(), 2);
        assert!(physics.is_tracked(scene.get_by_name("left").unwrap()));
        assert!(physics.is_tracked(scene.get_by_name("hand").unwrap()));
        assert!(!physics.is_tracked(scene.get_by_name("arm").unwrap()));
        assert!(!physics.is_tracked(scene.get_by_name("rig").unwrap()));
        assert!(session.pending_bodies().is_empty());
    }

    #[test]
    fn test_unattached_body_retried_each_frame() {
        let setup = SceneBuilder::new()
            .add_node(Node::group().with_name("late"), Some(1.0))
            .build();
        let mut session = Session::new(AppConfig::default(), setup);
        session.start().unwrap();

        // No shape yet, so the body waits
        let late = session.scene().get_by_name("late").unwrap();
        assert!(!session.physics().is_tracked(late));
        session.frame(DT);
        assert_eq!(session.pending_bodies().len(), 1);

        session.scene_mut().get_mut(late).unwrap().set_geometry(Geometry::sphere(0.5));
        session.frame(DT);
        assert!(session.physics().is_tracked(late));
        assert!(session.pending_bodies().is_empty());
    }

    #[test]
    fn test_queue_body_on_live_session() {
        let mut session = Session::new(AppConfig::default(), demo_setup());
        session.start().unwrap();
        session.frame(DT);

        let ball = session.scene_mut().add_node(
            Node::new(Geometry::sphere(0.5)).with_transform(Transform3D::from_position(Vector3::new(-3.0, 5.0, 0.0))),
        );
        session.queue_body(PendingBody::new(ball, 1.0));
        session.frame(DT);
        assert!(session.physics().is_tracked(ball));

        // Restarting recreates it along with the built scene's bodies
        session.stop();
        session.start().unwrap();
        assert!(session.physics().is_tracked(ball));
        assert_eq!(session.physics().tracked_count(), 2);
    }

    #[test]
    fn test_queued_body_for_removed_node_is_dropped() {
        let setup = SceneBuilder::new()
            .add_node(Node::group().with_name("gone"), Some(1.0))
            .build();
        let mut session = Session::new(AppConfig::default(), setup);
        session.start().unwrap();
        assert_eq!(session.pending_bodies().len(), 1);

        let gone = session.scene().get_by_name("gone").unwrap();
        session.scene_mut().remove_node(gone);
        session.frame(DT);
        assert!(session.pending_bodies().is_empty());
    }
}
