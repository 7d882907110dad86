// src/plan/journal.rs

//! Append-only plan journal for crash recovery
//!
//! Every plan execution writes a journal next to the database. Each record is
//! one line carrying a CRC32 checksum:
//!
//! Format: `{crc32_hex}|{json}\n`
//!
//! `Begin` stores the full plan so recovery can rebuild it without the
//! caller. `Attached` is a barrier (fsync) written as soon as the attach step
//! commits; its presence decides whether recovery rolls forward.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

use super::action::ActionKind;
use super::graph::{Plan, StepId};

/// A record in the plan journal
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlanRecord {
    /// Execution started
    Begin {
        plan: Plan,
        timestamp: DateTime<Utc>,
    },

    /// Step about to run with its resolved input
    StepStarted {
        step: StepId,
        action: ActionKind,
        input: Value,
    },

    StepCompleted { step: StepId, output: Value },

    StepFailed { step: StepId, error: String },

    /// Attach step committed
    Attached { step: StepId },

    /// Execution finished
    Done { success: bool, duration_ms: u64 },
}

impl PlanRecord {
    /// Barrier records are fsynced before execution continues
    pub fn is_barrier(&self) -> bool {
        matches!(
            self,
            Self::Begin { .. } | Self::Attached { .. } | Self::Done { .. }
        )
    }
}

/// Execution state rebuilt from journal records
#[derive(Debug, Clone, Default)]
pub struct JournalState {
    pub plan: Option<Plan>,
    pub started: BTreeMap<StepId, Value>,
    pub outputs: BTreeMap<StepId, Value>,
    pub failed: BTreeSet<StepId>,
    pub attached: bool,
    pub done: Option<bool>,
}

impl JournalState {
    pub fn from_records(records: &[PlanRecord]) -> Self {
        let mut state = Self::default();
        for record in records {
            match record {
                PlanRecord::Begin { plan, .. } => state.plan = Some(plan.clone()),
                PlanRecord::StepStarted { step, input, .. } => {
                    state.started.insert(*step, input.clone());
                }
                PlanRecord::StepCompleted { step, output } => {
                    state.outputs.insert(*step, output.clone());
                }
                PlanRecord::StepFailed { step, .. } => {
                    state.failed.insert(*step);
                }
                PlanRecord::Attached { .. } => state.attached = true,
                PlanRecord::Done { success, .. } => state.done = Some(*success),
            }
        }
        state
    }

    /// Steps that started but never recorded an outcome
    pub fn in_flight(&self) -> Vec<StepId> {
        self.started
            .keys()
            .filter(|s| !self.outputs.contains_key(s) && !self.failed.contains(s))
            .copied()
            .collect()
    }
}

/// Append-only plan journal with fsync barriers
pub struct PlanJournal {
    path: PathBuf,
    file: File,
    plan_id: String,
}

impl PlanJournal {
    /// Create the journal for a new execution of `plan_id`
    pub fn create(journal_dir: &Path, plan_id: &str) -> Result<Self> {
        fs::create_dir_all(journal_dir)?;

        let path = journal_dir.join(format!("plan-{}.journal", plan_id));
        let file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(&path)?;

        Ok(Self {
            path,
            file,
            plan_id: plan_id.to_string(),
        })
    }

    /// Open an existing journal for recovery
    pub fn open(path: PathBuf) -> Result<Self> {
        let plan_id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.strip_prefix("plan-"))
            .ok_or_else(|| Error::Journal(format!("Invalid journal filename {}", path.display())))?
            .to_string();

        let file = OpenOptions::new().append(true).open(&path)?;

        Ok(Self { path, file, plan_id })
    }

    pub fn plan_id(&self) -> &str {
        &self.plan_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record; barriers are fsynced
    pub fn write(&mut self, record: PlanRecord) -> Result<()> {
        let json = serde_json::to_string(&record)
            .map_err(|e| Error::Journal(format!("Failed to serialize journal record: {}", e)))?;
        let crc = crc32fast::hash(json.as_bytes());
        writeln!(self.file, "{:08x}|{}", crc, json)?;
        if record.is_barrier() {
            self.file.flush()?;
            self.file.sync_all()?;
        }
        Ok(())
    }

    /// Read all valid records, stopping at the first corrupted line
    pub fn read_all(&self) -> Result<Vec<PlanRecord>> {
        read_records(&self.path)
    }

    pub fn state(&self) -> Result<JournalState> {
        Ok(JournalState::from_records(&self.read_all()?))
    }

    /// Move the journal into `archive/` after the plan finished
    pub fn archive(self) -> Result<()> {
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| Error::Journal(format!("Invalid journal path {}", self.path.display())))?
            .to_owned();
        let archive_dir = self
            .path
            .parent()
            .unwrap_or(Path::new("."))
            .join("archive");
        fs::create_dir_all(&archive_dir)?;
        fs::rename(&self.path, archive_dir.join(file_name))?;
        Ok(())
    }
}

fn read_records(path: &Path) -> Result<Vec<PlanRecord>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }

        let Some((crc_hex, json)) = line.split_once('|') else {
            warn!("Malformed journal line {}: missing delimiter", line_num + 1);
            break;
        };

        let expected = u32::from_str_radix(crc_hex, 16).ok();
        let actual = crc32fast::hash(json.as_bytes());
        if expected != Some(actual) {
            // Torn write at the tail; everything before it is trustworthy
            warn!(
                "CRC mismatch at line {} of {}, ignoring the rest",
                line_num + 1,
                path.display()
            );
            break;
        }

        let record: PlanRecord = serde_json::from_str(json).map_err(|e| {
            Error::Journal(format!("Failed to parse record at line {}: {}", line_num + 1, e))
        })?;
        records.push(record);
    }

    Ok(records)
}

/// Journals in `journal_dir` with no `Done` record
pub fn find_incomplete_journals(journal_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut journals = Vec::new();

    if !journal_dir.exists() {
        return Ok(journals);
    }

    for entry in fs::read_dir(journal_dir)? {
        let path = entry?.path();
        let is_journal = path.is_file()
            && path.extension().is_some_and(|e| e == "journal")
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("plan-"));
        if !is_journal {
            continue;
        }

        let records = read_records(&path)?;
        if !records.iter().any(|r| matches!(r, PlanRecord::Done { .. })) {
            journals.push(path);
        }
    }

    journals.sort();
    Ok(journals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::graph::Inputs;
    use serde_json::json;
    use std::io::Write as _;
    use tempfile::TempDir;

    fn begin(plan: &Plan) -> PlanRecord {
        PlanRecord::Begin {
            plan: plan.clone(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_state_rebuilt_from_records() {
        let temp = TempDir::new().unwrap();
        let mut plan = Plan::new("publish");
        let step = plan.add_step(ActionKind::CreateVersion, Inputs::new());

        let mut journal = PlanJournal::create(temp.path(), &plan.id).unwrap();
        journal.write(begin(&plan)).unwrap();
        journal
            .write(PlanRecord::StepStarted {
                step,
                action: ActionKind::CreateVersion,
                input: json!({}),
            })
            .unwrap();

        let state = journal.state().unwrap();
        assert_eq!(state.plan.as_ref().unwrap().id, plan.id);
        assert_eq!(state.in_flight(), vec![step]);
        assert!(!state.attached);
        assert_eq!(state.done, None);

        journal
            .write(PlanRecord::StepCompleted {
                step,
                output: json!({"version_id": 4}),
            })
            .unwrap();
        let state = journal.state().unwrap();
        assert!(state.in_flight().is_empty());
        assert_eq!(state.outputs[&step]["version_id"], 4);
    }

    #[test]
    fn test_torn_tail_ignored() {
        let temp = TempDir::new().unwrap();
        let plan = Plan::new("torn");
        let mut journal = PlanJournal::create(temp.path(), &plan.id).unwrap();
        journal.write(begin(&plan)).unwrap();

        let mut raw = OpenOptions::new().append(true).open(journal.path()).unwrap();
        writeln!(raw, "deadbeef|{{\"type\":\"Done\"").unwrap();

        assert_eq!(journal.read_all().unwrap().len(), 1);
    }

    #[test]
    fn test_find_incomplete_and_archive() {
        let temp = TempDir::new().unwrap();
        let open_plan = Plan::new("open");
        let done_plan = Plan::new("done");

        let mut open = PlanJournal::create(temp.path(), &open_plan.id).unwrap();
        open.write(begin(&open_plan)).unwrap();

        let mut done = PlanJournal::create(temp.path(), &done_plan.id).unwrap();
        done.write(begin(&done_plan)).unwrap();
        done.write(PlanRecord::Done {
            success: true,
            duration_ms: 1,
        })
        .unwrap();

        let incomplete = find_incomplete_journals(temp.path()).unwrap();
        assert_eq!(incomplete, vec![open.path().to_path_buf()]);

        open.archive().unwrap();
        assert!(find_incomplete_journals(temp.path()).unwrap().is_empty());
        assert!(temp.path().join("archive").is_dir());
    }

    #[test]
    fn test_reopen_by_filename() {
        let temp = TempDir::new().unwrap();
        let plan = Plan::new("reopen");
        let journal = PlanJournal::create(temp.path(), &plan.id).unwrap();
        let reopened = PlanJournal::open(journal.path().to_path_buf()).unwrap();
        assert_eq!(reopened.plan_id(), plan.id);
    }
}
