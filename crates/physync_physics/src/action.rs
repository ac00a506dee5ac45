//! Per-sub-step actions
//!
//! Actions run before every integration sub-step and may move kinematic bodies.
//! They see the collision state left by the previous sub-step.

use rapier3d::prelude::{BroadPhaseBvh, ColliderSet, NarrowPhase, QueryFilter, QueryPipeline, RigidBodySet};

/// Borrowed view of the world handed to actions
pub struct ActionContext<'a> {
    /// Rigid bodies, mutable so kinematic targets can be set
    pub bodies: &'a mut RigidBodySet,
    /// Colliders
    pub colliders: &'a ColliderSet,
    /// Broad phase used for scene queries
    pub broad_phase: &'a BroadPhaseBvh,
    /// Narrow phase used for scene queries
    pub narrow_phase: &'a NarrowPhase,
}

impl<'a> ActionContext<'a> {
    /// Scene query pipeline over the current world state
    pub fn query_pipeline<'b>(&'b self, filter: QueryFilter<'b>) -> QueryPipeline<'b> {
        self.broad_phase.as_query_pipeline(
            self.narrow_phase.query_dispatcher(),
            &*self.bodies,
            self.colliders,
            filter,
        )
    }
}

/// Custom update invoked by the world once per sub-step
pub trait Action {
    /// Advance by one sub-step of `dt` seconds
    fn update_action(&mut self, ctx: &mut ActionContext<'_>, dt: f32);
}
