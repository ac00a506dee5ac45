//! Physics error types
//!
//! Only world initialization and the per-tick step report errors. Every other
//! public operation signals an unmet precondition (world not running, missing
//! geometry) by returning `None` or `false`.

use std::fmt;

/// Error type for physics operations
#[derive(Debug, Clone, PartialEq)]
pub enum PhysicsError {
    /// The physics configuration cannot drive a simulation
    InvalidConfig(String),
    /// The elapsed time handed to a step was negative or not finite
    InvalidTimeStep(f32),
    /// A tracked object is no longer present in the scene
    MissingObject(String),
    /// A tracked body handle no longer resolves to a body in the world
    StaleBody(String),
    /// An instanced object has fewer matrix slots than tracked bodies
    InstanceBufferTooSmall {
        /// Object description
        object: String,
        /// Bodies tracked for the object
        bodies: usize,
        /// Matrix slots available in its buffer
        slots: usize,
    },
    /// A parent world matrix could not be inverted
    SingularParent(String),
}

impl fmt::Display for PhysicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhysicsError::InvalidConfig(msg) => write!(f, "Invalid physics config: {}", msg),
            PhysicsError::InvalidTimeStep(dt) => write!(f, "Invalid time step: {}", dt),
            PhysicsError::MissingObject(object) => write!(f, "Tracked object missing from scene: {}", object),
            PhysicsError::StaleBody(object) => write!(f, "Stale rigid body handle for {}", object),
            PhysicsError::InstanceBufferTooSmall { object, bodies, slots } => write!(
                f,
                "Instance buffer of {} has {} slots for {} bodies",
                object, slots, bodies
            ),
            PhysicsError::SingularParent(object) => write!(f, "Parent of {} has a singular world matrix", object),
        }
    }
}

impl std::error::Error for PhysicsError {}
