//! Application systems
//!
//! Frame-level systems that sit between the host and the physics world.

mod runtime;
mod simulation;

pub use runtime::Runtime;
pub use simulation::{CharacterInput, SimulationResult, SimulationSystem};
