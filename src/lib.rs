// src/lib.rs

//! cvflow - content view lifecycle engine
//!
//! Versioned, filtered snapshots of repository content (content views) are
//! published, promoted along environment paths, exported and imported, and
//! consumed by hosts whose reported content is reconciled against the store.
//!
//! # Architecture
//!
//! - Database-first: all lifecycle state in SQLite, uniqueness enforced by constraints
//! - Plans: every lifecycle operation is a graph of typed steps, journaled and recoverable
//! - Content store: units live behind the `ContentStore` trait
//! - Hosts: fact reports reconciled with minimal association churn

pub mod config;
pub mod db;
mod error;
pub mod host;
pub mod lifecycle;
pub mod plan;
pub mod progress;
pub mod store;

pub use config::{CopyMode, EngineConfig, RetryPolicy};
pub use error::{Error, Result};
pub use progress::{LogProgress, ProgressTracker, SilentProgress};
