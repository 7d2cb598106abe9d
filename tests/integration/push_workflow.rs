use crate::support::{document, folder, read_record, write_document, write_record};
use resync::device::LocalDevice;
use resync::policy::{ExistingPolicy, MissingPolicy};
use resync::sync::{execute_push, load_index, plan_push, PushRequest};
use resync::tree::{ExcludePatterns, FsSource};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

struct Fixture {
    store: TempDir,
    local: TempDir,
}

/// Device holds `papers/{old.pdf, stale.pdf}`; the local side has
/// `papers/{old.pdf, new.pdf, notes.txt}`.
fn fixture() -> Fixture {
    let store = TempDir::new().unwrap();
    write_record(store.path(), "p", &folder("papers", ""));
    write_document(store.path(), "o", &document("old.pdf", "p", 10), b"old on device");
    write_document(store.path(), "s", &document("stale.pdf", "p", 10), b"stale");

    let local = TempDir::new().unwrap();
    let papers = local.path().join("papers");
    fs::create_dir(&papers).unwrap();
    fs::write(papers.join("old.pdf"), b"old locally").unwrap();
    fs::write(papers.join("new.pdf"), b"new").unwrap();
    fs::write(papers.join("notes.txt"), b"not a document").unwrap();
    Fixture { store, local }
}

fn request(local: &Path, if_exists: ExistingPolicy, missing: MissingPolicy) -> PushRequest {
    PushRequest {
        sources: vec![local.join("papers")],
        destination: None,
        if_exists,
        if_does_not_exist: missing,
    }
}

fn stored_ids(store: &Path) -> Vec<String> {
    let mut ids: Vec<String> = fs::read_dir(store)
        .unwrap()
        .filter_map(|e| {
            let name = e.unwrap().file_name().to_string_lossy().into_owned();
            name.strip_suffix(".metadata").map(str::to_string)
        })
        .collect();
    ids.sort();
    ids
}

#[test]
fn push_uploads_new_documents_and_skips_existing() {
    let fx = fixture();
    let mut device = LocalDevice::new(fx.store.path(), false);
    let index = load_index(&mut device).unwrap();

    let req = request(fx.local.path(), ExistingPolicy::Skip, MissingPolicy::Skip);
    let mut plan = plan_push(&index, &FsSource, &req, &ExcludePatterns::default()).unwrap();
    assert_eq!(plan.build.unsupported.len(), 1);
    assert!(plan.removals.is_empty());

    let staging = TempDir::new().unwrap();
    let outcome = execute_push(&mut device, &mut plan, staging.path()).unwrap();
    assert_eq!(outcome.rendered.documents, 1);
    assert_eq!(outcome.rendered.collections, 0);
    assert!(outcome.restarted);

    let index = load_index(&mut device).unwrap();
    let (new_id, record) = index.lookup("new.pdf", "p").expect("new.pdf uploaded");
    assert_eq!(record.parent, "p");
    assert_eq!(
        fs::read(fx.store.path().join(format!("{new_id}.pdf"))).unwrap(),
        b"new"
    );
    assert!(fx.store.path().join(format!("{new_id}.thumbnails")).is_dir());
    assert_eq!(
        fs::read(fx.store.path().join("o.pdf")).unwrap(),
        b"old on device"
    );
    assert!(index.contains("s"));
}

#[test]
fn push_with_delete_removes_items_missing_locally() {
    let fx = fixture();
    let mut device = LocalDevice::new(fx.store.path(), false);
    let index = load_index(&mut device).unwrap();

    let req = request(fx.local.path(), ExistingPolicy::Skip, MissingPolicy::Delete);
    let mut plan = plan_push(&index, &FsSource, &req, &ExcludePatterns::default()).unwrap();
    assert_eq!(plan.removals, vec!["s".to_string()]);

    let staging = TempDir::new().unwrap();
    let outcome = execute_push(&mut device, &mut plan, staging.path()).unwrap();
    assert_eq!(outcome.removed, vec!["s".to_string()]);
    assert!(!fx.store.path().join("s.metadata").exists());
    assert!(!fx.store.path().join("s.pdf").exists());
    assert!(fx.store.path().join("o.metadata").exists());
}

#[test]
fn excluded_items_are_neither_uploaded_nor_deleted() {
    let fx = fixture();
    let mut device = LocalDevice::new(fx.store.path(), false);
    let index = load_index(&mut device).unwrap();

    let excludes = ExcludePatterns::compile(&["papers/new", "papers/stale"]).unwrap();
    let req = request(fx.local.path(), ExistingPolicy::Skip, MissingPolicy::Delete);
    let plan = plan_push(&index, &FsSource, &req, &excludes).unwrap();
    assert!(plan.removals.is_empty());
    assert!(plan.is_noop());
}

#[test]
fn overwrite_keeps_identity_and_replaces_payload() {
    let fx = fixture();
    let mut device = LocalDevice::new(fx.store.path(), false);
    let index = load_index(&mut device).unwrap();

    let req = request(fx.local.path(), ExistingPolicy::Overwrite, MissingPolicy::Skip);
    let mut plan = plan_push(&index, &FsSource, &req, &ExcludePatterns::default()).unwrap();
    let staging = TempDir::new().unwrap();
    let outcome = execute_push(&mut device, &mut plan, staging.path()).unwrap();
    assert_eq!(outcome.rendered.documents, 2);

    assert_eq!(fs::read(fx.store.path().join("o.pdf")).unwrap(), b"old locally");
    let record = read_record(fx.store.path(), "o");
    assert_eq!(record.visible_name, "old.pdf");
    assert_eq!(record.parent, "p");
    assert_eq!(stored_ids(fx.store.path()).len(), 4);
}

#[test]
fn doconly_replaces_payload_but_not_metadata() {
    let fx = fixture();
    let before = fs::read_to_string(fx.store.path().join("o.metadata")).unwrap();
    let mut device = LocalDevice::new(fx.store.path(), false);
    let index = load_index(&mut device).unwrap();

    let req = request(fx.local.path(), ExistingPolicy::DocOnly, MissingPolicy::Skip);
    let mut plan = plan_push(&index, &FsSource, &req, &ExcludePatterns::default()).unwrap();
    let staging = TempDir::new().unwrap();
    let outcome = execute_push(&mut device, &mut plan, staging.path()).unwrap();
    assert_eq!(outcome.rendered.payload_only, 1);

    assert_eq!(fs::read(fx.store.path().join("o.pdf")).unwrap(), b"old locally");
    let after = fs::read_to_string(fx.store.path().join("o.metadata")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn duplicate_creates_a_second_item_with_the_same_name() {
    let fx = fixture();
    let mut device = LocalDevice::new(fx.store.path(), false);
    let index = load_index(&mut device).unwrap();

    let req = request(fx.local.path(), ExistingPolicy::Duplicate, MissingPolicy::Skip);
    let mut plan = plan_push(&index, &FsSource, &req, &ExcludePatterns::default()).unwrap();
    let staging = TempDir::new().unwrap();
    execute_push(&mut device, &mut plan, staging.path()).unwrap();

    let ids = stored_ids(fx.store.path());
    let named_old: Vec<&String> = ids
        .iter()
        .filter(|id| read_record(fx.store.path(), id).visible_name == "old.pdf")
        .collect();
    assert_eq!(named_old.len(), 2);
    assert!(named_old.iter().any(|id| id.as_str() == "o"));
}

#[test]
fn push_into_new_destination_creates_collections() {
    let fx = fixture();
    let mut device = LocalDevice::new(fx.store.path(), false);
    let index = load_index(&mut device).unwrap();

    let req = PushRequest {
        destination: Some("Inbox/2024".to_string()),
        ..request(fx.local.path(), ExistingPolicy::Skip, MissingPolicy::Skip)
    };
    let mut plan = plan_push(&index, &FsSource, &req, &ExcludePatterns::default()).unwrap();
    let staging = TempDir::new().unwrap();
    let outcome = execute_push(&mut device, &mut plan, staging.path()).unwrap();
    assert_eq!(outcome.rendered.collections, 3);
    assert_eq!(outcome.rendered.documents, 2);

    let index = load_index(&mut device).unwrap();
    let (inbox, _) = index.lookup("Inbox", "").unwrap();
    let (year, _) = index.lookup("2024", inbox).unwrap();
    let (papers, _) = index.lookup("papers", year).unwrap();
    let path = index
        .resolve_full_path(index.lookup("new.pdf", papers).unwrap().0)
        .unwrap();
    assert_eq!(path, "/Inbox/2024/papers/new.pdf");
}

#[test]
fn dry_run_device_leaves_store_untouched() {
    let fx = fixture();
    let before = stored_ids(fx.store.path());
    let mut device = LocalDevice::new(fx.store.path(), true);
    let index = load_index(&mut device).unwrap();

    let req = request(fx.local.path(), ExistingPolicy::Overwrite, MissingPolicy::Delete);
    let mut plan = plan_push(&index, &FsSource, &req, &ExcludePatterns::default()).unwrap();
    let staging = TempDir::new().unwrap();
    execute_push(&mut device, &mut plan, staging.path()).unwrap();

    assert_eq!(stored_ids(fx.store.path()), before);
    assert_eq!(
        fs::read(fx.store.path().join("o.pdf")).unwrap(),
        b"old on device"
    );
}

#[cfg(unix)]
#[test]
fn push_skips_dangling_links_and_plans_the_rest() {
    let fx = fixture();
    let papers = fx.local.path().join("papers");
    std::os::unix::fs::symlink("/nonexistent/target", papers.join("dangling.pdf")).unwrap();
    let mut device = LocalDevice::new(fx.store.path(), false);
    let index = load_index(&mut device).unwrap();

    let req = request(fx.local.path(), ExistingPolicy::Skip, MissingPolicy::Skip);
    let mut plan = plan_push(&index, &FsSource, &req, &ExcludePatterns::default()).unwrap();
    assert_eq!(plan.build.unreadable, vec![papers.join("dangling.pdf")]);
    assert_eq!(plan.build.unsupported, vec![papers.join("notes.txt")]);

    let staging = TempDir::new().unwrap();
    let outcome = execute_push(&mut device, &mut plan, staging.path()).unwrap();
    assert_eq!(outcome.rendered.documents, 1);
    let index = load_index(&mut device).unwrap();
    assert!(index.lookup("new.pdf", "p").is_some());
    assert!(index.lookup("dangling.pdf", "p").is_none());
}

#[test]
fn delete_leaves_unrelated_items_in_the_destination() {
    let fx = fixture();
    write_record(fx.store.path(), "b", &folder("Books", ""));
    write_document(fx.store.path(), "x", &document("unrelated.pdf", "b", 10), b"x");
    write_record(fx.store.path(), "bp", &folder("papers", "b"));
    write_document(fx.store.path(), "bs", &document("stale.pdf", "bp", 10), b"stale");
    let mut device = LocalDevice::new(fx.store.path(), false);
    let index = load_index(&mut device).unwrap();

    let req = PushRequest {
        destination: Some("Books".to_string()),
        ..request(fx.local.path(), ExistingPolicy::Skip, MissingPolicy::Delete)
    };
    let plan = plan_push(&index, &FsSource, &req, &ExcludePatterns::default()).unwrap();
    assert_eq!(plan.removals, vec!["bs".to_string()]);
}
