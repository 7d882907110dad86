// src/plan/recovery.rs

//! Recovery of plans interrupted by a crash
//!
//! - Attach committed: roll forward (run the remaining steps)
//! - Attach not committed: abort (run eligible finalize steps, close the journal)
//!
//! The database decides whether an in-flight attach committed, since a crash
//! can land after SQLite commits but before the `Attached` record is written.
//! Re-running an attach is harmless: it upserts the same binding.

use crate::db::models::ContentViewEnvironment;
use crate::error::Result;
use tracing::{info, warn};

use super::action::{self, AttachInput};
use super::executor::PlanExecutor;
use super::journal::{JournalState, PlanJournal, find_incomplete_journals};

/// Outcome of recovering one plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Attach had committed; remaining steps were completed
    RolledForward { plan_id: String },
    /// Attach never committed; the plan was closed without binding anything
    Aborted { plan_id: String, reason: String },
    /// Roll-forward was attempted and failed again
    Failed { plan_id: String, error: String },
    /// Journal unreadable; left in place for manual inspection
    Corrupted { plan_id: String, error: String },
}

/// Recover every incomplete plan in the configured journal directory
pub fn recover_all(executor: &PlanExecutor<'_>) -> Result<Vec<RecoveryOutcome>> {
    let journals = find_incomplete_journals(&executor.config().journal_dir())?;
    let mut outcomes = Vec::with_capacity(journals.len());

    for path in journals {
        let journal = match PlanJournal::open(path.clone()) {
            Ok(j) => j,
            Err(e) => {
                outcomes.push(RecoveryOutcome::Corrupted {
                    plan_id: path.display().to_string(),
                    error: e.to_string(),
                });
                continue;
            }
        };
        outcomes.push(recover_single(executor, journal));
    }

    Ok(outcomes)
}

fn recover_single(executor: &PlanExecutor<'_>, journal: PlanJournal) -> RecoveryOutcome {
    let plan_id = journal.plan_id().to_string();
    let state = match journal.state() {
        Ok(state) if state.plan.is_some() => state,
        Ok(_) => {
            return RecoveryOutcome::Corrupted {
                plan_id,
                error: "journal has no Begin record".to_string(),
            };
        }
        Err(e) => {
            return RecoveryOutcome::Corrupted {
                plan_id,
                error: e.to_string(),
            };
        }
    };

    match attach_committed(executor, &state) {
        Ok(true) => {
            info!("Plan {} attached before interruption, rolling forward", plan_id);
            match executor.resume(journal, &state) {
                Ok(_) => RecoveryOutcome::RolledForward { plan_id },
                Err(e) => {
                    warn!("Roll-forward of plan {} failed: {}", plan_id, e);
                    RecoveryOutcome::Failed {
                        plan_id,
                        error: e.to_string(),
                    }
                }
            }
        }
        Ok(false) => {
            let reason = match state.in_flight().first() {
                Some(step) => format!("interrupted during step {}", step),
                None => "interrupted between steps".to_string(),
            };
            match executor.abort(journal, &state) {
                Ok(()) => RecoveryOutcome::Aborted { plan_id, reason },
                Err(e) => RecoveryOutcome::Failed {
                    plan_id,
                    error: e.to_string(),
                },
            }
        }
        Err(e) => RecoveryOutcome::Failed {
            plan_id,
            error: e.to_string(),
        },
    }
}

/// True when the journal or the database shows the attach step committed
fn attach_committed(executor: &PlanExecutor<'_>, state: &JournalState) -> Result<bool> {
    if state.attached {
        return Ok(true);
    }
    let Some(plan) = state.plan.as_ref() else {
        return Ok(false);
    };

    for step in plan.steps.iter().filter(|s| s.action.is_attach()) {
        let Some(input) = state.started.get(&step.id) else {
            continue;
        };
        let attach: AttachInput = action::parse(input)?;
        if ContentViewEnvironment::version_in_environment(executor.conn(), attach.version_id, attach.environment_id)? {
            return Ok(true);
        }
    }
    Ok(false)
}
