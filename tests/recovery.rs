// tests/recovery.rs

//! Crash recovery of interrupted plans from their journals.

mod common;

use chrono::Utc;
use common::{Fixture, rpms};
use cvflow::db::models::{ContentType, ContentViewEnvironment};
use cvflow::lifecycle::{PublishRequest, plan_publish, publish};
use cvflow::plan::{ActionKind, Inputs, Plan, PlanJournal, PlanRecord, RecoveryOutcome, recover_all};
use cvflow::store::{ContentStore, CopyOptions, RepositorySpec};
use serde_json::json;
use std::fs;

#[test]
fn test_nothing_to_recover() {
    let fx = Fixture::new();
    assert!(recover_all(&fx.executor()).unwrap().is_empty());
}

#[test]
fn test_publish_interrupted_before_attach_is_aborted() {
    let fx = Fixture::new();
    let repo = fx.library_repo("RHEL", "BaseOS", &rpms(&["bash"]));
    let view_id = fx.view("Base", &[&repo]).id.unwrap();

    let built = plan_publish(&fx.conn, &fx.config, &PublishRequest::new(view_id)).unwrap();
    let mut journal = PlanJournal::create(&fx.config.journal_dir(), &built.plan.id).unwrap();
    journal
        .write(PlanRecord::Begin {
            plan: built.plan.clone(),
            timestamp: Utc::now(),
        })
        .unwrap();
    drop(journal);

    let outcomes = recover_all(&fx.executor()).unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(outcomes[0], RecoveryOutcome::Aborted { .. }));
    assert!(ContentViewEnvironment::find(&fx.conn, view_id, fx.library_id).unwrap().is_none());

    // The journal is closed; a later publish is unaffected
    assert!(recover_all(&fx.executor()).unwrap().is_empty());
    publish(&fx.executor(), &PublishRequest::new(view_id)).unwrap();
}

#[test]
fn test_committed_attach_rolls_forward() {
    let fx = Fixture::new();
    let dev = fx.environment("Dev", fx.library_id);
    let repo = fx.library_repo("RHEL", "BaseOS", &rpms(&["bash", "glibc"]));
    let view_id = fx.view("Base", &[&repo]).id.unwrap();
    let v1 = publish(&fx.executor(), &PublishRequest::new(view_id)).unwrap();

    let target = fx
        .store
        .create_repository(&RepositorySpec {
            name: "refresh".to_string(),
            content_type: ContentType::Yum,
        })
        .unwrap();

    let attach_input = json!({
        "content_view_id": view_id,
        "version_id": v1.version_id,
        "environment_id": dev,
    });
    let mut plan = Plan::new("Attach then refresh");
    let attach = plan.add_step(
        ActionKind::AttachEnvironment,
        Inputs::new()
            .literal("content_view_id", view_id)
            .unwrap()
            .literal("version_id", v1.version_id)
            .unwrap()
            .literal("environment_id", dev)
            .unwrap(),
    );
    let copy = plan.add_step(
        ActionKind::CopyContent,
        Inputs::new()
            .literal("source", &repo.backend_id)
            .unwrap()
            .literal("target", &target)
            .unwrap()
            .literal("options", CopyOptions::all())
            .unwrap(),
    );
    plan.order_after(copy, attach).unwrap();

    // Crash after the attach committed but before its record was written
    ContentViewEnvironment::attach(&fx.conn, view_id, v1.version_id, dev).unwrap();
    let mut journal = PlanJournal::create(&fx.config.journal_dir(), &plan.id).unwrap();
    journal
        .write(PlanRecord::Begin {
            plan: plan.clone(),
            timestamp: Utc::now(),
        })
        .unwrap();
    journal
        .write(PlanRecord::StepStarted {
            step: attach,
            action: ActionKind::AttachEnvironment,
            input: attach_input,
        })
        .unwrap();
    drop(journal);

    let outcomes = recover_all(&fx.executor()).unwrap();
    assert_eq!(outcomes.len(), 1);
    assert!(
        matches!(outcomes[0], RecoveryOutcome::RolledForward { .. }),
        "{:?}",
        outcomes[0]
    );
    assert_eq!(fx.unit_names(&target), vec!["bash", "glibc"]);

    let binding = ContentViewEnvironment::find(&fx.conn, view_id, dev).unwrap().unwrap();
    assert_eq!(binding.content_view_version_id, v1.version_id);
    assert!(recover_all(&fx.executor()).unwrap().is_empty());
}

#[test]
fn test_unreadable_journal_left_in_place() {
    let fx = Fixture::new();
    let dir = fx.config.journal_dir();
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("plan-broken.journal");
    fs::write(&path, "not a journal record\n").unwrap();

    for _ in 0..2 {
        let outcomes = recover_all(&fx.executor()).unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0], RecoveryOutcome::Corrupted { .. }));
    }
    assert!(path.exists());
}
