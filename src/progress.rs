// src/progress.rs

//! Shared progress tracking trait and implementations
//!
//! The plan executor reports one unit of progress per finished step. Output
//! depends on the tracker handed in:
//! - `SilentProgress`: no output, for tests and scripted use
//! - `LogProgress`: logs through tracing
//! - the CLI's indicatif tracker in `commands::progress`

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::{info, warn};

/// Core trait for progress tracking
///
/// Implementations must be thread-safe: remote plan steps finish on rayon
/// worker threads.
pub trait ProgressTracker: Send + Sync {
    /// Set the current status message
    fn set_message(&self, message: &str);

    /// Increment progress by the given amount
    fn increment(&self, amount: u64);

    /// Set the total (length) of the progress
    fn set_length(&self, length: u64);

    /// Get current position
    fn position(&self) -> u64;

    /// Get total length
    fn length(&self) -> u64;

    /// Finish progress successfully with a message
    fn finish_with_message(&self, message: &str);

    /// Finish progress with an error/abandonment message
    fn finish_with_error(&self, message: &str);

    /// Check if progress is finished
    fn is_finished(&self) -> bool;
}

/// Silent progress tracker (no-op)
#[derive(Debug, Default)]
pub struct SilentProgress {
    position: AtomicU64,
    length: AtomicU64,
    finished: AtomicBool,
}

impl SilentProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressTracker for SilentProgress {
    fn set_message(&self, _message: &str) {}

    fn increment(&self, amount: u64) {
        self.position.fetch_add(amount, Ordering::Relaxed);
    }

    fn set_length(&self, length: u64) {
        self.length.store(length, Ordering::Relaxed);
    }

    fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    fn length(&self) -> u64 {
        self.length.load(Ordering::Relaxed)
    }

    fn finish_with_message(&self, _message: &str) {
        self.finished.store(true, Ordering::Relaxed);
    }

    fn finish_with_error(&self, _message: &str) {
        self.finished.store(true, Ordering::Relaxed);
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }
}

/// Logging progress tracker
///
/// Logs every message and each completed step at info level.
#[derive(Debug)]
pub struct LogProgress {
    name: String,
    position: AtomicU64,
    length: AtomicU64,
    finished: AtomicBool,
}

impl LogProgress {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position: AtomicU64::new(0),
            length: AtomicU64::new(0),
            finished: AtomicBool::new(false),
        }
    }
}

impl ProgressTracker for LogProgress {
    fn set_message(&self, message: &str) {
        info!("{}: {}", self.name, message);
    }

    fn increment(&self, amount: u64) {
        let new_pos = self.position.fetch_add(amount, Ordering::Relaxed) + amount;
        let length = self.length.load(Ordering::Relaxed);
        if length > 0 {
            info!("{}: {}/{} steps", self.name, new_pos, length);
        }
    }

    fn set_length(&self, length: u64) {
        self.length.store(length, Ordering::Relaxed);
    }

    fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    fn length(&self) -> u64 {
        self.length.load(Ordering::Relaxed)
    }

    fn finish_with_message(&self, message: &str) {
        self.finished.store(true, Ordering::Relaxed);
        info!("{}: {}", self.name, message);
    }

    fn finish_with_error(&self, message: &str) {
        self.finished.store(true, Ordering::Relaxed);
        warn!("{}: ERROR - {}", self.name, message);
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }
}
