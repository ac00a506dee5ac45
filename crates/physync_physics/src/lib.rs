//! Physics bridge for physync
//!
//! This crate couples a rapier simulation to a scene graph of renderable objects:
//! - Collision shapes derived from renderable geometry (boxes, spheres, static triangle meshes)
//! - Rigid bodies for single and instanced renderables, tracked for read-back
//! - Kinematic capsule characters stepped as per-sub-step actions
//! - A fixed-step simulation loop that writes results back into local and instanced transforms
//! - World lifecycle (initialize / shutdown) with ordered release of solver resources
//!
//! The scene graph itself is not part of this crate; it is reached through the
//! [`SceneAccess`] trait.

pub mod action;
pub mod body;
pub mod character;
pub mod error;
pub mod hooks;
pub mod scene;
pub mod shapes;
mod sync;
pub mod world;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use action::{Action, ActionContext};
pub use body::{Attachment, TrackedBodies, TrackedBody};
pub use character::{CharacterKey, CharacterRig, CharacterSettings, KinematicCharacter, CHARACTER_GROUP};
pub use error::PhysicsError;
pub use hooks::{LocalUpdates, UpdateHandle, UpdateRegistry};
pub use scene::SceneAccess;
pub use shapes::{build_shape, CollisionShape, Geometry, ShapeKind, DEFAULT_MARGIN};
pub use world::{PhysicsConfig, PhysicsWorld, StepReport, WorldState};

// Re-export the solver so downstream crates can name its handle types
pub use rapier3d;
pub use rapier3d::prelude::{ColliderHandle, RigidBodyHandle};
