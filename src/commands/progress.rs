// src/commands/progress.rs
//! Terminal progress for plan execution
//!
//! One bar per plan, advanced as steps finish. Remote steps finish on worker
//! threads; indicatif bars are safe to update from any of them.

use cvflow::ProgressTracker;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    pub fn new(operation: &str) -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {prefix} ({pos}/{len}) [{bar:30.green/dim}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        bar.set_prefix(operation.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }
}

impl ProgressTracker for CliProgress {
    fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn increment(&self, amount: u64) {
        self.bar.inc(amount);
    }

    fn set_length(&self, length: u64) {
        self.bar.set_length(length);
    }

    fn position(&self) -> u64 {
        self.bar.position()
    }

    fn length(&self) -> u64 {
        self.bar.length().unwrap_or(0)
    }

    fn finish_with_message(&self, message: &str) {
        self.bar.finish_with_message(format!("{} [done]", message));
    }

    fn finish_with_error(&self, message: &str) {
        self.bar.abandon_with_message(format!("[FAILED: {}]", message));
    }

    fn is_finished(&self) -> bool {
        self.bar.is_finished()
    }
}
