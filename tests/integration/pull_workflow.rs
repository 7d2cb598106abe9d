use crate::support::{document, folder, write_document, write_record};
use resync::device::LocalDevice;
use resync::policy::ExistingPolicy;
use resync::sync::{download_tree, load_index, plan_backup, plan_pull};
use resync::tree::ExcludePatterns;
use std::fs;
use tempfile::TempDir;

/// `Books/{Fiction/{a.pdf}, manual}` and a root-level `loose.pdf`.
fn store() -> TempDir {
    let store = TempDir::new().unwrap();
    let root = store.path();
    write_record(root, "books", &folder("Books", ""));
    write_record(root, "fiction", &folder("Fiction", "books"));
    write_document(root, "a", &document("a.pdf", "fiction", 1), b"a");
    write_document(root, "m", &document("manual", "books", 1), b"manual");
    write_document(root, "l", &document("loose.pdf", "", 1), b"loose");
    let mut trashed = document("gone.pdf", "books", 1);
    trashed.deleted = true;
    write_document(root, "g", &trashed, b"gone");
    store
}

#[test]
fn pull_materializes_anchor_subtree() {
    let remote = store();
    let local = TempDir::new().unwrap();
    let mut device = LocalDevice::new(remote.path(), false);
    let index = load_index(&mut device).unwrap();

    let plan = plan_pull(&index, &["Books".to_string()], &ExcludePatterns::default()).unwrap();
    let report =
        download_tree(&mut device, &plan.tree, local.path(), ExistingPolicy::Skip, false).unwrap();

    assert_eq!(report.downloaded.len(), 2);
    assert_eq!(
        fs::read(local.path().join("Books/Fiction/a.pdf")).unwrap(),
        b"a"
    );
    assert_eq!(fs::read(local.path().join("Books/manual.pdf")).unwrap(), b"manual");
    assert!(!local.path().join("Books/gone.pdf").exists());
}

#[test]
fn pull_overwrite_replaces_existing_files() {
    let remote = store();
    let local = TempDir::new().unwrap();
    fs::create_dir(local.path().join("Books")).unwrap();
    fs::write(local.path().join("Books/manual.pdf"), b"edited").unwrap();
    let mut device = LocalDevice::new(remote.path(), false);
    let index = load_index(&mut device).unwrap();
    let plan = plan_pull(&index, &["Books".to_string()], &ExcludePatterns::default()).unwrap();

    let skipped =
        download_tree(&mut device, &plan.tree, local.path(), ExistingPolicy::Skip, false).unwrap();
    assert_eq!(skipped.skipped_existing.len(), 1);
    assert_eq!(fs::read(local.path().join("Books/manual.pdf")).unwrap(), b"edited");

    download_tree(&mut device, &plan.tree, local.path(), ExistingPolicy::Overwrite, false)
        .unwrap();
    assert_eq!(fs::read(local.path().join("Books/manual.pdf")).unwrap(), b"manual");
}

#[test]
fn pull_rejects_doconly_and_duplicate() {
    let remote = store();
    let local = TempDir::new().unwrap();
    let mut device = LocalDevice::new(remote.path(), false);
    let index = load_index(&mut device).unwrap();
    let plan = plan_pull(&index, &["Books".to_string()], &ExcludePatterns::default()).unwrap();
    for policy in [ExistingPolicy::DocOnly, ExistingPolicy::Duplicate] {
        assert!(download_tree(&mut device, &plan.tree, local.path(), policy, false).is_err());
    }
    assert!(fs::read_dir(local.path()).unwrap().next().is_none());
}

#[test]
fn nested_anchor_recreates_local_parents_and_honours_excludes() {
    let remote = store();
    let local = TempDir::new().unwrap();
    let mut device = LocalDevice::new(remote.path(), false);
    let index = load_index(&mut device).unwrap();

    let excludes = ExcludePatterns::compile(&["Books/Fiction/a"]).unwrap();
    let plan = plan_pull(
        &index,
        &["Books/Fiction".to_string(), "Missing".to_string()],
        &excludes,
    )
    .unwrap();
    assert_eq!(plan.build.missing_anchors, vec!["Missing".to_string()]);
    let report =
        download_tree(&mut device, &plan.tree, local.path(), ExistingPolicy::Skip, false).unwrap();
    assert!(report.downloaded.is_empty());
    assert!(local.path().join("Books/Fiction").is_dir());
}

#[test]
fn backup_pulls_every_root_item() {
    let remote = store();
    let local = TempDir::new().unwrap();
    let mut device = LocalDevice::new(remote.path(), false);
    let index = load_index(&mut device).unwrap();

    let plan = plan_backup(&index, &ExcludePatterns::compile(&["Books/Fiction"]).unwrap()).unwrap();
    let report =
        download_tree(&mut device, &plan.tree, local.path(), ExistingPolicy::Skip, false).unwrap();
    assert_eq!(report.downloaded.len(), 2);
    assert!(local.path().join("loose.pdf").is_file());
    assert!(local.path().join("Books/manual.pdf").is_file());
    assert!(!local.path().join("Books/Fiction").exists());
}

#[test]
fn dry_run_downloads_nothing() {
    let remote = store();
    let local = TempDir::new().unwrap();
    let mut device = LocalDevice::new(remote.path(), true);
    let index = load_index(&mut device).unwrap();
    let plan = plan_backup(&index, &ExcludePatterns::default()).unwrap();
    let report =
        download_tree(&mut device, &plan.tree, local.path(), ExistingPolicy::Skip, true).unwrap();
    assert_eq!(report.downloaded.len(), 3);
    assert!(fs::read_dir(local.path()).unwrap().next().is_none());
}

/// Device names that are not usable as a single local path component.
fn hostile_store() -> TempDir {
    let store = TempDir::new().unwrap();
    let root = store.path();
    write_record(root, "books", &folder("Books", ""));
    write_document(root, "ok", &document("ok.pdf", "books", 1), b"ok");
    write_document(root, "slash", &document("../evil", "books", 1), b"evil");
    write_record(root, "blank", &folder("", "books"));
    write_document(root, "inner", &document("inner.pdf", "blank", 1), b"inner");
    write_record(root, "dotdot", &folder("..", ""));
    write_document(root, "esc", &document("escaped.pdf", "dotdot", 1), b"escaped");
    store
}

#[test]
fn backup_never_writes_outside_the_target() {
    let remote = hostile_store();
    let local = TempDir::new().unwrap();
    let out = local.path().join("out");
    fs::create_dir(&out).unwrap();
    let mut device = LocalDevice::new(remote.path(), false);
    let index = load_index(&mut device).unwrap();

    let plan = plan_backup(&index, &ExcludePatterns::default()).unwrap();
    let report =
        download_tree(&mut device, &plan.tree, &out, ExistingPolicy::Skip, false).unwrap();

    assert_eq!(report.downloaded, vec![out.join("Books/ok.pdf")]);
    let mut rejected = report.rejected_names.clone();
    rejected.sort();
    assert_eq!(rejected, vec!["..", "Books/", "Books/../evil.pdf"]);

    assert!(!local.path().join("escaped.pdf").exists());
    assert!(!local.path().join("evil.pdf").exists());
    assert!(!out.join("Books/inner.pdf").exists());
    let mut written: Vec<String> = fs::read_dir(local.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    written.sort();
    assert_eq!(written, vec!["out"]);
}

#[test]
fn pull_anchor_with_unusable_local_parent_is_skipped() {
    let remote = store();
    let local = TempDir::new().unwrap();
    let out = local.path().join("out");
    fs::create_dir(&out).unwrap();
    let mut device = LocalDevice::new(remote.path(), false);
    let index = load_index(&mut device).unwrap();

    let plan = plan_pull(&index, &["../Fiction".to_string()], &ExcludePatterns::default()).unwrap();
    let report =
        download_tree(&mut device, &plan.tree, &out, ExistingPolicy::Skip, false).unwrap();
    assert!(report.downloaded.is_empty());
    assert_eq!(report.rejected_names, vec!["../Fiction"]);
    assert!(!local.path().join("Fiction").exists());
}
