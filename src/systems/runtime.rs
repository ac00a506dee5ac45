//! Host runtime
//!
//! Owns the per-frame update registrations the physics world hooks into,
//! the frame clock, and the callbacks that run once when the session stops.

use physync_physics::{UpdateHandle, UpdateRegistry};
use slotmap::SlotMap;

type StopHook = Box<dyn FnOnce()>;

/// Frame clock and hook registry for a running session
pub struct Runtime {
    updates: SlotMap<UpdateHandle, u64>,
    stop_hooks: Vec<StopHook>,
    delta_time: f32,
    elapsed: f32,
    frame: u64,
    stopped: bool,
}

impl Runtime {
    /// Create a runtime with no registrations
    pub fn new() -> Self {
        Self {
            updates: SlotMap::with_key(),
            stop_hooks: Vec::new(),
            delta_time: 0.0,
            elapsed: 0.0,
            frame: 0,
            stopped: false,
        }
    }

    /// Advance the frame clock
    pub fn begin_frame(&mut self, dt: f32) {
        self.delta_time = dt;
        self.elapsed += dt;
        self.frame += 1;
    }

    /// Seconds covered by the current frame
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Total seconds since the runtime was created
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    /// Number of frames begun so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Whether an update registration is still live
    pub fn is_registered(&self, handle: UpdateHandle) -> bool {
        self.updates.contains_key(handle)
    }

    /// Number of live update registrations
    pub fn update_count(&self) -> usize {
        self.updates.len()
    }

    /// Run `hook` once when the runtime stops
    pub fn on_stop(&mut self, hook: impl FnOnce() + 'static) {
        self.stop_hooks.push(Box::new(hook));
    }

    /// Fire stop hooks in registration order
    ///
    /// Returns false if the runtime had already stopped.
    pub fn stop(&mut self) -> bool {
        if self.stopped {
            return false;
        }
        self.stopped = true;
        for hook in self.stop_hooks.drain(..) {
            hook();
        }
        log::debug!("Runtime stopped after {} frames", self.frame);
        true
    }

    /// Whether `stop` has run
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl UpdateRegistry for Runtime {
    fn register_update(&mut self) -> UpdateHandle {
        let handle = self.updates.insert(self.frame);
        log::debug!("Registered update {:?} at frame {}", handle, self.frame);
        handle
    }

    fn cancel_update(&mut self, handle: UpdateHandle) {
        if self.updates.remove(handle).is_some() {
            log::debug!("Cancelled update {:?}", handle);
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_frame_clock() {
        let mut runtime = Runtime::new();
        runtime.begin_frame(0.5);
        runtime.begin_frame(0.25);
        assert_eq!(runtime.frame(), 2);
        assert_eq!(runtime.delta_time(), 0.25);
        assert!((runtime.elapsed() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_register_and_cancel() {
        let mut runtime = Runtime::new();
        let a = runtime.register_update();
        let b = runtime.register_update();
        assert_eq!(runtime.update_count(), 2);

        runtime.cancel_update(a);
        assert!(!runtime.is_registered(a));
        assert!(runtime.is_registered(b));

        // Cancelling twice is harmless
        runtime.cancel_update(a);
        assert_eq!(runtime.update_count(), 1);
    }

    #[test]
    fn test_stop_hooks_fire_once() {
        let mut runtime = Runtime::new();
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        runtime.on_stop(move || counter.set(counter.get() + 1));

        assert!(runtime.stop());
        assert!(!runtime.stop());
        assert!(runtime.is_stopped());
        assert_eq!(fired.get(), 1);
    }
}
