// src/plan/executor.rs

//! Plan executor
//!
//! Runs a plan wave by wave. Within a wave, local (database) steps run in
//! order on the calling thread and remote (content store) steps run in
//! parallel on the rayon pool. Every step is journaled before and after it
//! runs.
//!
//! Cancellation is honoured between waves up to the attach step. Once a
//! version is attached the remaining steps always run to completion.
//!
//! Finalize steps (importer cleanup) run after the main steps whether or not
//! they succeeded, provided every step they take input from completed.

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::progress::ProgressTracker;
use crate::store::ContentStore;
use chrono::Utc;
use rayon::prelude::*;
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::action::{self, ActionKind, AttachInput, AutoPublishInput, AutoPublishOutput};
use super::graph::{Plan, Step, StepId};
use super::journal::{JournalState, PlanJournal, PlanRecord};
use super::locks::EnvironmentLock;

/// Options for controlling plan execution
#[derive(Default, Clone)]
pub struct ExecutionOptions {
    /// Cancel token - set to true to request cancellation
    pub cancel: Option<Arc<AtomicBool>>,
    /// Progress tracker, advanced once per finished step
    pub progress: Option<Arc<dyn ProgressTracker>>,
}

impl ExecutionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressTracker>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|c| c.load(Ordering::Relaxed))
    }

    fn check_cancelled(&self, operation: &str) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled(operation.to_string()))
        } else {
            Ok(())
        }
    }

    fn step_finished(&self, message: &str) {
        if let Some(ref progress) = self.progress {
            progress.set_message(message);
            progress.increment(1);
        }
    }
}

/// Outputs of a finished plan
#[derive(Debug, Clone)]
pub struct PlanReport {
    pub plan_id: String,
    pub outputs: BTreeMap<StepId, Value>,
    pub attached: bool,
}

impl PlanReport {
    /// Typed output of one step
    pub fn output<T: DeserializeOwned>(&self, step: StepId) -> Result<T> {
        let value = self
            .outputs
            .get(&step)
            .ok_or_else(|| Error::InvalidInput(format!("Step {} produced no output", step)))?;
        action::parse(value)
    }
}

#[derive(Debug, Default)]
struct RunState {
    outputs: BTreeMap<StepId, Value>,
    attached: bool,
}

impl RunState {
    fn completed(&self, step: StepId) -> bool {
        self.outputs.contains_key(&step)
    }
}

pub struct PlanExecutor<'a> {
    conn: &'a Connection,
    store: &'a dyn ContentStore,
    config: &'a EngineConfig,
    options: ExecutionOptions,
}

impl<'a> PlanExecutor<'a> {
    pub fn new(conn: &'a Connection, store: &'a dyn ContentStore, config: &'a EngineConfig) -> Self {
        Self {
            conn,
            store,
            config,
            options: ExecutionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn conn(&self) -> &'a Connection {
        self.conn
    }

    pub fn store(&self) -> &'a dyn ContentStore {
        self.store
    }

    pub fn config(&self) -> &'a EngineConfig {
        self.config
    }

    /// Executor for follow-up plans started after an attach: same resources,
    /// no cancel token, no progress
    pub fn detached(&self) -> PlanExecutor<'a> {
        PlanExecutor::new(self.conn, self.store, self.config)
    }

    /// Run a plan from the start
    pub fn execute(&self, plan: &Plan) -> Result<PlanReport> {
        let waves = plan.waves()?;
        let mut journal = PlanJournal::create(&self.config.journal_dir(), &plan.id)?;
        journal.write(PlanRecord::Begin {
            plan: plan.clone(),
            timestamp: Utc::now(),
        })?;

        info!("Executing plan {}: {}", plan.id, plan.description);
        if let Some(ref progress) = self.options.progress {
            progress.set_length(plan.steps.len() as u64);
        }

        self.run(plan, &waves, journal, RunState::default())
    }

    /// Continue a journaled plan whose attach already happened
    pub fn resume(&self, journal: PlanJournal, state: &JournalState) -> Result<PlanReport> {
        let plan = state
            .plan
            .as_ref()
            .ok_or_else(|| Error::Journal(format!("Journal {} has no plan", journal.plan_id())))?;
        let waves = plan.waves()?;
        info!("Rolling forward plan {}: {}", plan.id, plan.description);

        let run = RunState {
            outputs: state.outputs.clone(),
            attached: state.attached,
        };
        self.run(plan, &waves, journal, run)
    }

    /// Give up on a journaled plan: run eligible finalize steps and close it
    pub fn abort(&self, mut journal: PlanJournal, state: &JournalState) -> Result<()> {
        let plan = state
            .plan
            .as_ref()
            .ok_or_else(|| Error::Journal(format!("Journal {} has no plan", journal.plan_id())))?;
        info!("Aborting plan {}: {}", plan.id, plan.description);

        let mut run = RunState {
            outputs: state.outputs.clone(),
            attached: state.attached,
        };
        self.run_finalize(plan, &mut journal, &mut run);
        journal.write(PlanRecord::Done {
            success: false,
            duration_ms: 0,
        })?;
        journal.archive()
    }

    fn run(
        &self,
        plan: &Plan,
        waves: &[Vec<StepId>],
        mut journal: PlanJournal,
        mut run: RunState,
    ) -> Result<PlanReport> {
        let start = Instant::now();
        let result = self.run_waves(plan, waves, &mut journal, &mut run);
        self.run_finalize(plan, &mut journal, &mut run);

        journal.write(PlanRecord::Done {
            success: result.is_ok(),
            duration_ms: start.elapsed().as_millis() as u64,
        })?;
        journal.archive()?;

        if let Some(ref progress) = self.options.progress {
            match &result {
                Ok(()) => progress.finish_with_message(&plan.description),
                Err(e) => progress.finish_with_error(&e.to_string()),
            }
        }

        result.map(|()| PlanReport {
            plan_id: plan.id.clone(),
            outputs: run.outputs,
            attached: run.attached,
        })
    }

    fn run_waves(
        &self,
        plan: &Plan,
        waves: &[Vec<StepId>],
        journal: &mut PlanJournal,
        run: &mut RunState,
    ) -> Result<()> {
        for wave in waves {
            let pending: Vec<&Step> = wave
                .iter()
                .filter(|id| !run.completed(**id))
                .map(|id| plan.step(*id))
                .collect::<Result<_>>()?;
            if pending.is_empty() {
                continue;
            }

            if !run.attached {
                self.options.check_cancelled(&pending[0].action.to_string())?;
            }

            let (remote, local): (Vec<&Step>, Vec<&Step>) =
                pending.into_iter().partition(|s| s.action.is_remote());

            for step in local {
                self.run_local_step(step, journal, run)?;
            }
            if !remote.is_empty() {
                self.run_remote_wave(&remote, journal, run)?;
            }
        }
        Ok(())
    }

    fn run_local_step(&self, step: &Step, journal: &mut PlanJournal, run: &mut RunState) -> Result<()> {
        let input = step.resolve_input(&run.outputs)?;

        if step.action.is_attach() && !run.attached {
            self.options.check_cancelled("attach")?;
        }

        journal.write(PlanRecord::StepStarted {
            step: step.id,
            action: step.action,
            input: input.clone(),
        })?;
        debug!("Step {} ({}) started", step.id, step.action);

        match self.dispatch(step.action, &input) {
            Ok(output) => {
                if step.action.is_attach() {
                    run.attached = true;
                    journal.write(PlanRecord::Attached { step: step.id })?;
                }
                self.complete(step, output, journal, run)
            }
            Err(e) => Err(self.fail(step, input, e, journal)),
        }
    }

    fn run_remote_wave(&self, steps: &[&Step], journal: &mut PlanJournal, run: &mut RunState) -> Result<()> {
        let mut prepared = Vec::with_capacity(steps.len());
        for step in steps {
            let input = step.resolve_input(&run.outputs)?;
            journal.write(PlanRecord::StepStarted {
                step: step.id,
                action: step.action,
                input: input.clone(),
            })?;
            prepared.push((*step, input));
        }

        let store = self.store;
        let results: Vec<(&Step, Value, Result<Value>)> = prepared
            .into_par_iter()
            .map(|(step, input)| {
                let result = action::run_remote(step.action, store, &input);
                (step, input, result)
            })
            .collect();

        // Record every outcome before reporting the first failure so finalize
        // steps see all completed outputs
        let mut first_error = None;
        for (step, input, result) in results {
            match result {
                Ok(output) => self.complete(step, output, journal, run)?,
                Err(e) => {
                    let err = self.fail(step, input, e, journal);
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn run_finalize(&self, plan: &Plan, journal: &mut PlanJournal, run: &mut RunState) {
        let order = match plan.finalize_order() {
            Ok(order) => order,
            Err(e) => {
                warn!("Plan {} has unusable finalize steps: {}", plan.id, e);
                return;
            }
        };

        for id in order {
            let Ok(step) = plan.step(id) else { continue };
            if run.completed(id) {
                continue;
            }
            if !step.requires().iter().all(|r| run.completed(*r)) {
                debug!("Skipping finalize step {} ({}): inputs never produced", id, step.action);
                continue;
            }

            let result = step.resolve_input(&run.outputs).and_then(|input| {
                journal.write(PlanRecord::StepStarted {
                    step: id,
                    action: step.action,
                    input: input.clone(),
                })?;
                match self.dispatch(step.action, &input) {
                    Ok(output) => self.complete(step, output, journal, run),
                    Err(e) => Err(self.fail(step, input, e, journal)),
                }
            });
            if let Err(e) = result {
                warn!("Finalize step {} ({}) failed: {}", id, step.action, e);
            }
        }
    }

    fn dispatch(&self, kind: ActionKind, input: &Value) -> Result<Value> {
        match kind {
            ActionKind::CreateVersion => action::create_version(self.conn, input),
            ActionKind::CreateRepos => action::create_repos(self.conn, self.store, input),
            ActionKind::AttachEnvironment => {
                let attach: AttachInput = action::parse(input)?;
                let _lock = EnvironmentLock::acquire(
                    &self.config.lock_dir(),
                    attach.environment_id,
                    &self.config.lock,
                )?;
                action::attach_environment(self.conn, input)
            }
            ActionKind::AutoPublishComposites => {
                let request: AutoPublishInput = action::parse(input)?;
                let published =
                    crate::lifecycle::publish::auto_publish_composites(&self.detached(), request.content_view_id)?;
                action::output(&AutoPublishOutput { published })
            }
            remote => action::run_remote(remote, self.store, input),
        }
    }

    fn complete(&self, step: &Step, output: Value, journal: &mut PlanJournal, run: &mut RunState) -> Result<()> {
        journal.write(PlanRecord::StepCompleted {
            step: step.id,
            output: output.clone(),
        })?;
        run.outputs.insert(step.id, output);
        debug!("Step {} ({}) completed", step.id, step.action);
        self.options.step_finished(&step.action.to_string());
        Ok(())
    }

    fn fail(&self, step: &Step, input: Value, error: Error, journal: &mut PlanJournal) -> Error {
        warn!("Step {} ({}) failed: {}", step.id, step.action, error);
        if let Err(e) = journal.write(PlanRecord::StepFailed {
            step: step.id,
            error: error.to_string(),
        }) {
            warn!("Failed to journal step failure: {}", e);
        }
        Error::PlanFailed {
            step: step.id,
            action: step.action.to_string(),
            input,
            source: Box::new(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::plan::graph::Inputs;
    use crate::plan::journal::find_incomplete_journals;
    use crate::store::{CopyOptions, MemoryContentStore, RepositorySpec, Unit};
    use crate::db::models::ContentType;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Connection, MemoryContentStore, EngineConfig) {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("cvflow.db");
        let conn = db::open(db_path.to_str().unwrap()).unwrap();
        let config = EngineConfig::for_db(db_path.to_string_lossy());
        (temp, conn, MemoryContentStore::new(), config)
    }

    fn repo(store: &MemoryContentStore, name: &str) -> String {
        store
            .create_repository(&RepositorySpec {
                name: name.to_string(),
                content_type: ContentType::Yum,
            })
            .unwrap()
    }

    fn copy_plan(pairs: &[(String, String)]) -> Plan {
        let mut plan = Plan::new("copy");
        for (source, target) in pairs {
            plan.add_step(
                ActionKind::CopyContent,
                Inputs::new()
                    .literal("source", source)
                    .unwrap()
                    .literal("target", target)
                    .unwrap()
                    .literal("options", CopyOptions::all())
                    .unwrap(),
            );
        }
        plan
    }

    #[test]
    fn test_remote_wave_runs_and_archives_journal() {
        let (_temp, conn, store, config) = setup();
        let a = repo(&store, "a");
        let b = repo(&store, "b");
        let c = repo(&store, "c");
        store.add_units(&a, &[Unit::rpm("bash", "5.1-1", "x86_64")]).unwrap();

        let plan = copy_plan(&[(a.clone(), b.clone()), (a.clone(), c.clone())]);
        let report = PlanExecutor::new(&conn, &store, &config).execute(&plan).unwrap();

        assert_eq!(report.outputs.len(), 2);
        assert_eq!(store.list_units(&c).unwrap().len(), 1);
        assert!(find_incomplete_journals(&config.journal_dir()).unwrap().is_empty());
    }

    #[test]
    fn test_failure_carries_step_and_input() {
        let (_temp, conn, store, config) = setup();
        let a = repo(&store, "a");
        let plan = copy_plan(&[(a, "missing".to_string())]);

        let err = PlanExecutor::new(&conn, &store, &config).execute(&plan).unwrap_err();
        match err {
            Error::PlanFailed { step, ref action, ref input, .. } => {
                assert_eq!(step, 0);
                assert_eq!(action, "CopyContent");
                assert_eq!(input["target"], "missing");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_cancel_before_first_wave() {
        let (_temp, conn, store, config) = setup();
        let a = repo(&store, "a");
        let b = repo(&store, "b");
        store.add_units(&a, &[Unit::rpm("bash", "5.1-1", "x86_64")]).unwrap();

        let cancel = Arc::new(AtomicBool::new(true));
        let executor = PlanExecutor::new(&conn, &store, &config)
            .with_options(ExecutionOptions::new().with_cancel(cancel));
        let err = executor.execute(&copy_plan(&[(a, b.clone())])).unwrap_err();

        assert!(matches!(err, Error::Cancelled(_)));
        assert!(store.list_units(&b).unwrap().is_empty());
    }

    #[test]
    fn test_finalize_runs_after_failure() {
        let (temp, conn, store, config) = setup();
        let export = temp.path().join("export");
        std::fs::create_dir_all(&export).unwrap();
        let target = repo(&store, "target");

        let mut plan = Plan::new("import");
        let create = plan.add_step(
            ActionKind::CreateImporter,
            Inputs::new()
                .literal("path", &export)
                .unwrap()
                .literal("export_names", Vec::<String>::new())
                .unwrap()
                .literal("clones", Vec::<action::ClonedRepository>::new())
                .unwrap(),
        );
        let broken = plan.add_step(
            ActionKind::CopyContent,
            Inputs::new()
                .literal("source", "missing")
                .unwrap()
                .literal("target", &target)
                .unwrap()
                .literal("options", CopyOptions::all())
                .unwrap(),
        );
        plan.order_after(broken, create).unwrap();
        let destroy = plan.add_finalize_step(ActionKind::DestroyImporter, Inputs::new().wire("handle", create, "/handle"));
        plan.order_after(destroy, broken).unwrap();

        let err = PlanExecutor::new(&conn, &store, &config).execute(&plan).unwrap_err();
        assert!(matches!(err.step_cause(), Error::CopyFailure { .. }));
        assert_eq!(store.importer_count().unwrap(), 0);
    }
}
