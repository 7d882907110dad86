// tests/import_export.rs

//! Export of published versions and import into import-only content views.

mod common;

use common::{Fixture, rpms};
use cvflow::Error;
use cvflow::db::models::{ContentView, ContentViewEnvironment, ContentViewFlags, ContentViewVersion, Repository};
use cvflow::lifecycle::{
    ExportMetadata, ExportedRepository, PublishRequest, export_version, import, import_from_dir, plan_import,
    publish,
};
use cvflow::store::listing_path;
use std::fs;
use std::path::PathBuf;

fn import_only(fx: &Fixture, name: &str) -> ContentView {
    fx.view_with_flags(
        name,
        ContentViewFlags {
            import_only: true,
            ..ContentViewFlags::default()
        },
    )
}

/// Publish `Base` at `major.minor` over two repositories and export it
fn published_export(fx: &Fixture, major: i64, minor: i64) -> (PathBuf, ExportMetadata) {
    let base = fx.library_repo("RHEL", "BaseOS", &rpms(&["bash", "glibc"]));
    let apps = fx.library_repo("RHEL", "AppStream", &rpms(&["nginx"]));
    let view_id = fx.view("Base", &[&base, &apps]).id.unwrap();
    let outcome = publish(&fx.executor(), &PublishRequest::new(view_id).with_version(major, minor)).unwrap();

    let dest = fx.path().join("export");
    let metadata = export_version(&fx.conn, &fx.store, outcome.version_id, &dest).unwrap();
    (dest, metadata)
}

#[test]
fn test_export_writes_metadata_and_listings() {
    let fx = Fixture::new();
    let (dest, metadata) = published_export(&fx, 1, 0);

    assert_eq!(metadata.content_view, "Base");
    assert_eq!(metadata.content_view_version.major, 1);
    assert_eq!(metadata.repository_mapping.len(), 2);
    assert!(metadata.repository_mapping.contains_key("RHEL-BaseOS"));
    for name in metadata.repository_mapping.keys() {
        assert!(listing_path(&dest, name).exists());
    }
    assert_eq!(ExportMetadata::read(&dest).unwrap(), metadata);
}

#[test]
fn test_export_refuses_existing_export() {
    let fx = Fixture::new();
    let (dest, _) = published_export(&fx, 1, 0);
    let view = ContentView::find_by_label(&fx.conn, fx.org_id, "Base").unwrap().unwrap();
    let version = ContentViewVersion::latest(&fx.conn, view.id.unwrap()).unwrap().unwrap();

    let err = export_version(&fx.conn, &fx.store, version.id.unwrap(), &dest).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn test_import_keeps_version_numbers() {
    let fx = Fixture::new();
    let (dest, _) = published_export(&fx, 10, 2);
    let target = import_only(&fx, "Base Import");
    let target_id = target.id.unwrap();

    let outcome = import_from_dir(&fx.executor(), target_id, &dest).unwrap();

    assert_eq!((outcome.major, outcome.minor), (10, 2));
    assert_eq!(outcome.clones.len(), 2);

    let version = ContentViewVersion::find_by_id(&fx.conn, outcome.version_id)
        .unwrap()
        .unwrap();
    assert!(version.imported);
    let binding = ContentViewEnvironment::find(&fx.conn, target_id, fx.library_id)
        .unwrap()
        .unwrap();
    assert_eq!(binding.content_view_version_id, outcome.version_id);

    for clone in Repository::archive_clones(&fx.conn, outcome.version_id).unwrap() {
        let library = Repository::find_by_id(&fx.conn, clone.library_instance().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(fx.unit_names(&clone.backend_id), fx.unit_names(&library.backend_id));
    }
    assert_eq!(fx.store.importer_count().unwrap(), 0);
}

#[test]
fn test_second_import_of_same_version_conflicts() {
    let fx = Fixture::new();
    let (dest, metadata) = published_export(&fx, 1, 0);
    let target_id = import_only(&fx, "Base Import").id.unwrap();

    import(&fx.executor(), target_id, &dest, &metadata).unwrap();
    let err = import(&fx.executor(), target_id, &dest, &metadata).unwrap_err();

    assert!(matches!(err, Error::VersionConflict { major: 1, minor: 0, .. }));
    assert_eq!(ContentViewVersion::count_for_view(&fx.conn, target_id).unwrap(), 1);
}

#[test]
fn test_existing_version_rejected_before_export_is_read() {
    let fx = Fixture::new();
    let (dest, metadata) = published_export(&fx, 1, 0);
    let target_id = import_only(&fx, "Base Import").id.unwrap();
    import(&fx.executor(), target_id, &dest, &metadata).unwrap();

    let err = import(&fx.executor(), target_id, &fx.path().join("no-such-dir"), &metadata).unwrap_err();
    assert!(matches!(err, Error::VersionConflict { major: 1, minor: 0, .. }), "{err}");
}

#[test]
fn test_failed_check_reports_every_problem_and_writes_nothing() {
    let fx = Fixture::new();
    let (dest, mut metadata) = published_export(&fx, 1, 0);
    let standard = fx.view("Not Imported", &[]);

    metadata.repository_mapping.insert(
        "Missing-Repo".to_string(),
        ExportedRepository {
            repository: "Repo".to_string(),
            product: "Missing".to_string(),
            redhat: false,
            checksum: "00".to_string(),
        },
    );
    let tampered = listing_path(&dest, "RHEL-BaseOS");
    fs::write(&tampered, r#"{"units":[]}"#).unwrap();

    let repos_before = fx.count("repositories");
    let store_before = fx.store.repository_count().unwrap();

    let err = import(&fx.executor(), standard.id.unwrap(), &dest, &metadata).unwrap_err();
    match err {
        Error::CompatibilityCheckFailed(problems) => {
            // not import-only, unknown repository, its missing listing, one checksum mismatch
            assert_eq!(problems.len(), 4, "{problems:?}");
            assert!(problems.iter().any(|p| p.contains("import-only")));
            assert!(problems.iter().any(|p| p.contains("Checksum mismatch")));
        }
        other => panic!("expected CompatibilityCheckFailed, got {other}"),
    }

    assert_eq!(fx.count("content_view_versions"), 1);
    assert_eq!(fx.count("repositories"), repos_before);
    assert_eq!(fx.store.repository_count().unwrap(), store_before);
    assert_eq!(fx.store.importer_count().unwrap(), 0);
}

#[test]
fn test_unreadable_export_dir_fails_check() {
    let fx = Fixture::new();
    let target_id = import_only(&fx, "Base Import").id.unwrap();

    let err = import_from_dir(&fx.executor(), target_id, &fx.path().join("nowhere")).unwrap_err();
    assert!(matches!(err, Error::CompatibilityCheckFailed(_)));
    assert_eq!(fx.count("content_view_versions"), 0);
}

#[test]
fn test_importer_destroyed_when_import_fails() {
    let fx = Fixture::new();
    let (dest, metadata) = published_export(&fx, 1, 0);
    let target_id = import_only(&fx, "Base Import").id.unwrap();

    let built = plan_import(&fx.conn, target_id, &dest, &metadata).unwrap();

    // The export disappears between the check and the import
    fs::remove_dir_all(dest.join("repos")).unwrap();

    let err = fx.executor().execute(&built.plan).unwrap_err();
    assert!(matches!(err, Error::PlanFailed { .. }));
    assert_eq!(fx.store.importer_count().unwrap(), 0);
    assert!(ContentViewEnvironment::find(&fx.conn, target_id, fx.library_id).unwrap().is_none());
}
