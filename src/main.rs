//! physync - headless physics demo
//!
//! Builds a small scene, runs it for a configured number of frames with a
//! scripted player walking up a ramp and jumping, and logs what happens.

use nalgebra::Vector3;
use physync::config::AppConfig;
use physync::scene::SceneBuilder;
use physync::systems::CharacterInput;
use physync::Session;
use physync_scene::{Node, Transform3D};
use physync_physics::Geometry;
use std::process::ExitCode;

fn build_demo_scene(config: &AppConfig) -> physync::scene::SceneSetup {
    let crates: Vec<Vector3<f32>> = (0..4)
        .map(|i| Vector3::new(-4.0 + i as f32 * 1.5, 6.0 + i as f32, -3.0))
        .collect();

    SceneBuilder::new()
        .add_ground(0.0, 40.0)
        .add_ramp("ramp", Vector3::new(0.0, 0.0, -8.0), 4.0, 6.0, 1.5)
        .add_box("crate", Vector3::new(3.0, 5.0, 0.0), Vector3::new(1.0, 1.0, 1.0), 1.0)
        .add_sphere("ball", Vector3::new(-3.0, 8.0, 1.0), 0.5, 2.0)
        .add_crates("crates", &crates, 0.8, 0.5)
        .add_group(
            "turntable",
            Transform3D::from_position(Vector3::new(6.0, 3.0, 0.0)).with_uniform_scale(2.0),
        )
        .add_child(
            "turntable",
            Node::new(Geometry::cuboid(0.5, 0.5, 0.5))
                .with_name("passenger")
                .with_transform(Transform3D::from_position(Vector3::new(0.0, 1.0, 0.0))),
            None,
        )
        .add_child(
            "turntable",
            Node::new(Geometry::sphere(0.25))
                .with_name("rider")
                .with_transform(Transform3D::from_position(Vector3::new(1.0, 1.5, 0.0))),
            None,
        )
        .add_body_tree("turntable", 1.0)
        .add_player(Vector3::new(0.0, config.character.half_height + config.character.radius + 0.1, 0.0))
        .build()
}

fn main() -> ExitCode {
    let config = AppConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load config: {}. Using defaults.", e);
        AppConfig::default()
    });

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.debug.log_level)).init();
    log::info!("Starting physync demo");

    let frames = config.simulation.demo_frames;
    let frame_time = config.simulation.frame_time;
    let setup = build_demo_scene(&config);
    let mut session = Session::new(config, setup);
    session.runtime_mut().on_stop(|| log::info!("Demo stopped"));

    if let Err(e) = session.start() {
        log::error!("Failed to start physics: {}", e);
        return ExitCode::FAILURE;
    }

    for frame in 0..frames {
        // Walk toward the ramp, jumping once halfway there
        let mut input = CharacterInput::walk(Vector3::new(0.0, 0.0, -1.0));
        if frame == frames / 2 {
            input = input.with_jump();
        }
        session.set_input(input);

        let result = session.frame(frame_time);
        if frame % 60 == 0 {
            log::info!(
                "frame {}: {} sub-steps, {} synced, character at {:?}",
                frame,
                result.sub_steps,
                result.synced,
                session.character_position()
            );
        }
    }

    for name in ["crate", "ball", "passenger", "rider"] {
        if let Some(position) = session.node_position(name) {
            log::info!("{} came to rest at ({:.2}, {:.2}, {:.2})", name, position.x, position.y, position.z);
        }
    }
    if session.failed_steps() > 0 {
        log::warn!("{} steps failed", session.failed_steps());
    }

    session.stop();
    ExitCode::SUCCESS
}
