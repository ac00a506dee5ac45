//! Per-tick callback registration
//!
//! The host owns the frame loop. The physics world only asks it to schedule
//! one update per frame while the world is running, and cancels that request on
//! shutdown.

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Handle to a registered per-tick update
    pub struct UpdateHandle;
}

/// Something that can schedule and cancel per-frame updates
pub trait UpdateRegistry {
    /// Schedule an update to run once every frame
    fn register_update(&mut self) -> UpdateHandle;

    /// Stop running a previously registered update
    ///
    /// Cancelling an unknown or already cancelled handle is a no-op.
    fn cancel_update(&mut self, handle: UpdateHandle);
}

/// Minimal registry for headless hosts and tests
#[derive(Default, Debug)]
pub struct LocalUpdates {
    active: SlotMap<UpdateHandle, ()>,
}

impl LocalUpdates {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the handle is still scheduled
    pub fn is_active(&self, handle: UpdateHandle) -> bool {
        self.active.contains_key(handle)
    }

    /// Number of scheduled updates
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether nothing is scheduled
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}

impl UpdateRegistry for LocalUpdates {
    fn register_update(&mut self) -> UpdateHandle {
        self.active.insert(())
    }

    fn cancel_update(&mut self, handle: UpdateHandle) {
        self.active.remove(handle);
    }
}
