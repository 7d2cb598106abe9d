use crate::support::{document, folder, write_document, write_record};
use resync::cleanup::{CleanupEngine, CleanupPass, Operator, Selection, SelectionRequest};
use resync::device::LocalDevice;
use resync::sync::load_index;
use resync::Result;
use std::fs;
use tempfile::TempDir;

/// Answers every confirmation the same way and always takes the default.
struct Auto {
    confirm: bool,
    selections: usize,
}

impl Operator for Auto {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(self.confirm)
    }

    fn select(
        &mut self,
        _request: &SelectionRequest,
        _position: usize,
        _total: usize,
    ) -> Result<Selection> {
        self.selections += 1;
        Ok(Selection::Default)
    }
}

fn messy_store() -> TempDir {
    let store = TempDir::new().unwrap();
    let root = store.path();
    let mut binned = document("binned.pdf", "", 1);
    binned.deleted = true;
    write_document(root, "t", &binned, b"binned");
    fs::create_dir(root.join("t.thumbnails")).unwrap();

    fs::write(root.join("stray.pdf"), b"no metadata").unwrap();

    write_record(root, "docs", &folder("Docs", ""));
    write_document(root, "newer", &document("copy.pdf", "docs", 200), b"same bytes");
    write_document(root, "older", &document("original.pdf", "docs", 100), b"same bytes");

    write_record(root, "outer", &folder("Outer", ""));
    write_record(root, "inner", &folder("Inner", "outer"));
    store
}

#[test]
fn clean_runs_all_passes_against_the_store() {
    let store = messy_store();
    let root = store.path();
    let mut device = LocalDevice::new(root, false);
    let mut index = load_index(&mut device).unwrap();
    let mut operator = Auto {
        confirm: true,
        selections: 0,
    };

    let report = CleanupEngine::new(&mut index, &mut device, &mut operator)
        .run(&CleanupPass::ALL)
        .unwrap();
    assert!(report.state_changed());
    assert_eq!(operator.selections, 1);

    let removed: Vec<(CleanupPass, usize)> = report
        .outcomes
        .iter()
        .map(|o| (o.pass, o.removed.len()))
        .collect();
    assert_eq!(
        removed,
        vec![
            (CleanupPass::Trash, 1),
            (CleanupPass::Orphans, 1),
            (CleanupPass::Duplicates, 1),
            (CleanupPass::EmptyCollections, 2),
        ]
    );

    assert!(!root.join("t.pdf").exists());
    assert!(!root.join("t.thumbnails").exists());
    assert!(!root.join("stray.pdf").exists());
    assert!(root.join("newer.pdf").exists());
    assert!(!root.join("older.metadata").exists());
    assert!(!root.join("outer.metadata").exists());
    assert!(!root.join("inner.metadata").exists());
    assert!(root.join("docs.metadata").exists());

    let reloaded = load_index(&mut device).unwrap();
    assert_eq!(reloaded, index);
}

#[test]
fn declining_every_confirmation_changes_nothing() {
    let store = messy_store();
    let root = store.path();
    let before: Vec<_> = {
        let mut names: Vec<_> = fs::read_dir(root)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        names.sort();
        names
    };
    let mut device = LocalDevice::new(root, false);
    let mut index = load_index(&mut device).unwrap();
    let mut operator = Auto {
        confirm: false,
        selections: 0,
    };
    let report = CleanupEngine::new(&mut index, &mut device, &mut operator)
        .run(&[
            CleanupPass::Trash,
            CleanupPass::Orphans,
            CleanupPass::EmptyCollections,
        ])
        .unwrap();
    assert!(!report.state_changed());

    let mut after: Vec<_> = fs::read_dir(root)
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    after.sort();
    assert_eq!(before, after);
}
