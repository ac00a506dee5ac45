//! physync - scene graph physics integration
//!
//! Host-side pieces that drive [`physync_physics`] over a [`physync_scene`] graph:
//! configuration loading, the per-frame runtime, the simulation system, scene
//! building and the play session.

pub mod config;
pub mod scene;
pub mod session;
pub mod systems;

pub use config::{AppConfig, ConfigError};
pub use session::Session;
