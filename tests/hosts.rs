// tests/hosts.rs

//! Host fact reconciliation, content assignment and overrides.

mod common;

use common::{Fixture, rpms};
use cvflow::db::models::{ContentOverride, HostModuleStream, InstalledPackage, OverrideOwner};
use cvflow::host::{
    self, ContentAssignmentRequest, HostContentState, HostReport, ModuleStreamEntry, OverrideRequest,
    OverrideValue, PackageEntry, StatusCache, TraceEntry, TraceStatus,
};
use cvflow::lifecycle::{PromoteRequest, PublishRequest, promote, publish};
use std::collections::BTreeSet;

fn nvreas(fx: &Fixture, host_id: i64) -> BTreeSet<String> {
    InstalledPackage::list_for_host(&fx.conn, host_id)
        .unwrap()
        .into_iter()
        .map(|p| p.nvrea)
        .collect()
}

#[test]
fn test_package_profile_replaced_by_diff() {
    let fx = Fixture::new();
    let host = fx.host("web01.example.com");
    let host_id = host.id.unwrap();
    let policy = &fx.config.reconcile;

    let a = PackageEntry::new("bash", "5.1", "2.el9", "x86_64");
    let b = PackageEntry::new("glibc", "2.34", "60.el9", "x86_64");
    let c = PackageEntry::new("openssl", "3.0.7", "1.el9", "x86_64").with_epoch("1");
    let d = PackageEntry::new("zlib", "1.2.11", "40.el9", "x86_64");

    let first = host::import_package_profile(&fx.conn, &host, &[a.clone(), b.clone(), c.clone()], policy).unwrap();
    assert_eq!(first.added, 3);

    let second = host::import_package_profile(&fx.conn, &host, &[b.clone(), c.clone(), d.clone()], policy).unwrap();
    assert_eq!((second.added, second.removed, second.unchanged), (1, 1, 2));

    let expected: BTreeSet<String> = [b.nvrea(), c.nvrea(), d.nvrea()].into_iter().collect();
    assert_eq!(nvreas(&fx, host_id), expected);
    assert!(expected.contains("openssl-1:3.0.7-1.el9.x86_64"));

    // The dropped package stays in the shared catalog for other hosts
    let catalog = InstalledPackage::find_by_nvreas(&fx.conn, &[a.nvrea()]).unwrap();
    assert_eq!(catalog.len(), 1);
}

#[test]
fn test_module_stream_status_tracks_activity() {
    let fx = Fixture::new();
    let host = fx.host("db01.example.com");
    let host_id = host.id.unwrap();
    let policy = &fx.config.reconcile;

    let streams = vec![
        ModuleStreamEntry::new("postgresql", "15").with_status("enabled").with_active(false),
        ModuleStreamEntry::new("nodejs", "18").with_status("enabled").with_active(true),
    ];
    host::import_module_streams(&fx.conn, &host, &streams, policy).unwrap();

    let mut stored: Vec<Option<String>> = HostModuleStream::list_for_host(&fx.conn, host_id)
        .unwrap()
        .into_iter()
        .map(|s| s.status)
        .collect();
    stored.sort();
    assert_eq!(stored, vec![Some("enabled".to_string()), Some("unknown".to_string())]);

    let summary = host::import_module_streams(&fx.conn, &host, &streams[1..], policy).unwrap();
    assert_eq!(summary.removed, 1);
    assert_eq!(HostModuleStream::list_for_host(&fx.conn, host_id).unwrap().len(), 1);
}

#[test]
fn test_trace_status_follows_profile() {
    let fx = Fixture::new();
    let host = fx.host("app01.example.com");
    let host_id = host.id.unwrap();
    let policy = &fx.config.reconcile;
    let mut cache = StatusCache::new();

    assert_eq!(cache.trace_status(&fx.conn, host_id).unwrap(), TraceStatus::UpToDate);

    let traces = vec![
        TraceEntry::new("sshd", Some("systemctl restart sshd"), "daemon"),
        TraceEntry::new("kernel", Some("reboot"), "static"),
        TraceEntry::new("vim", None, "application"),
    ];
    let stored = host::import_tracer_profile(&fx.conn, &host, &traces, policy).unwrap();
    assert_eq!(stored, 2);

    cache.invalidate(host_id);
    assert_eq!(cache.trace_status(&fx.conn, host_id).unwrap(), TraceStatus::Reboot);

    host::import_tracer_profile(&fx.conn, &host, &traces[..1], policy).unwrap();
    cache.invalidate(host_id);
    assert_eq!(cache.trace_status(&fx.conn, host_id).unwrap(), TraceStatus::ProcessRestart);
}

#[test]
fn test_assignment_requires_published_binding() {
    let fx = Fixture::new();
    let dev = fx.environment("Dev", fx.library_id);
    let repo = fx.library_repo("RHEL", "BaseOS", &rpms(&["bash"]));
    let view_id = fx.view("Base", &[&repo]).id.unwrap();
    let host = fx.host("web01.example.com");

    let v1 = publish(&fx.executor(), &PublishRequest::new(view_id)).unwrap();
    assert!(host::assign_single_environment(&fx.conn, &host, view_id, dev).is_err());

    promote(&fx.executor(), &PromoteRequest::new(v1.version_id, dev)).unwrap();
    let assignment = host::assign_single_environment(&fx.conn, &host, view_id, dev).unwrap();
    assert_eq!(assignment.environment_id, dev);

    // Naming only the environment keeps the current view
    let request = ContentAssignmentRequest::new(None, Some(fx.library_id)).inheriting();
    let moved = HostContentState::default()
        .apply(&fx.conn, &host, request)
        .unwrap()
        .unwrap();
    assert_eq!(moved.content_view_id, view_id);
    assert_eq!(moved.environment_id, fx.library_id);
}

#[test]
fn test_prune_drops_overrides_for_unavailable_content() {
    let fx = Fixture::new();
    let repo = fx.library_repo("RHEL", "BaseOS", &rpms(&["bash"]));
    let view_id = fx.view("Base", &[&repo]).id.unwrap();
    publish(&fx.executor(), &PublishRequest::new(view_id)).unwrap();

    let host = fx.host("web01.example.com");
    host::assign_single_environment(&fx.conn, &host, view_id, fx.library_id).unwrap();
    let owner = OverrideOwner::Host(host.id.unwrap());

    let requests = vec![
        OverrideRequest::new("BaseOS", OverrideValue::Disabled),
        OverrideRequest::new("Retired", OverrideValue::Enabled),
    ];
    let kept = host::update_content_overrides(&fx.conn, owner, &requests, false).unwrap();
    assert_eq!((kept.set, kept.pruned), (2, 0));

    let pruned = host::update_content_overrides(&fx.conn, owner, &[], true).unwrap();
    assert_eq!(pruned.pruned, 1);
    let labels: Vec<String> = ContentOverride::list_for_owner(&fx.conn, owner)
        .unwrap()
        .into_iter()
        .map(|o| o.content_label)
        .collect();
    assert_eq!(labels, vec!["BaseOS".to_string()]);
}

#[test]
fn test_batch_isolates_failing_host() {
    let fx = Fixture::new();
    let good = fx.host("good.example.com");

    let mut report = HostReport::new("good.example.com");
    report.packages = Some(vec![PackageEntry::new("bash", "5.1", "2.el9", "x86_64")]);
    report.traces = Some(vec![TraceEntry::new("sshd", Some("systemctl restart sshd"), "daemon")]);
    let missing = HostReport::new("missing.example.com");

    let outcomes = host::reconcile_batch(&fx.config, &[report, missing]);

    assert_eq!(outcomes.len(), 2);
    let good_outcome = outcomes.iter().find(|o| o.host == "good.example.com").unwrap();
    assert!(good_outcome.is_success());
    let summary = good_outcome.result.as_ref().unwrap();
    assert_eq!(summary.packages.map(|s| s.added), Some(1));
    assert_eq!(summary.traces, Some(1));
    assert!(summary.module_streams.is_none());

    let failed = outcomes.iter().find(|o| o.host == "missing.example.com").unwrap();
    assert!(!failed.is_success());

    assert_eq!(nvreas(&fx, good.id.unwrap()).len(), 1);
}
