// src/plan/mod.rs

//! Plan engine
//!
//! Publish, promote and import are expressed as plans: graphs of typed steps
//! whose inputs are literals or outputs of earlier steps. The executor runs a
//! plan in dependency waves, journals each step for crash recovery, serialises
//! attach steps per environment, and always runs cleanup steps whose inputs
//! exist.

pub mod action;
mod executor;
mod graph;
mod journal;
mod locks;
mod recovery;

pub use action::{ActionKind, ClonedRepository};
pub use executor::{ExecutionOptions, PlanExecutor, PlanReport};
pub use graph::{Input, Inputs, Plan, Step, StepId};
pub use journal::{JournalState, PlanJournal, PlanRecord, find_incomplete_journals};
pub use locks::EnvironmentLock;
pub use recovery::{RecoveryOutcome, recover_all};
