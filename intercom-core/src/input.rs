//! Push-to-talk button capability.
//!
//! The controller samples the line level once per loop iteration.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// A digital input read as pressed (level 1) or released (level 0).
pub trait PushButton {
    fn is_pressed(&mut self) -> bool;
}

impl<F: FnMut() -> bool> PushButton for F {
    fn is_pressed(&mut self) -> bool {
        self()
    }
}

/// Button level that another thread (console, GPIO watcher, test) can drive.
#[derive(Debug, Clone, Default)]
pub struct SharedButton {
    level: Arc<AtomicBool>,
}

impl SharedButton {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn press(&self) {
        self.level.store(true, Ordering::Release);
    }

    pub fn release(&self) {
        self.level.store(false, Ordering::Release);
    }

    /// Flip the level and return the new one.
    pub fn toggle(&self) -> bool {
        !self.level.fetch_xor(true, Ordering::AcqRel)
    }
}

impl PushButton for SharedButton {
    fn is_pressed(&mut self) -> bool {
        self.level.load(Ordering::Acquire)
    }
}
