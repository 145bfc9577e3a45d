//! Tests for watcher reconciliation: CREATE/DELETE notifications delivered
//! against the live index. Events are fed directly through the engine's
//! reconciliation entry points, the same calls the notify-backed
//! synchronizer makes.

use std::fs;
use std::sync::Arc;

use parking_lot::Mutex;
use sorrel::{IndexObserver, Site};
use tempfile::TempDir;

fn new_site() -> (TempDir, Site) {
    let dir = TempDir::new().unwrap();
    Site::create(dir.path()).unwrap();
    let site = Site::open(dir.path()).unwrap();
    (dir, site)
}

#[test]
fn self_generated_output_is_an_idempotent_no_op() {
    let (_dir, site) = new_site();
    let errors = site.generate();
    assert!(errors.is_empty());

    let before = site.document_count();
    // The watcher announces the converter's own target as "created".
    let dirs = site.sync_created(&site.root().join("index.html"));
    assert_eq!(site.document_count(), before);
    assert!(dirs.is_empty());
}

#[test]
fn external_file_creation_is_registered() {
    let (dir, site) = new_site();
    fs::write(dir.path().join("external.md"), "outside edit\n").unwrap();

    site.sync_created(&site.root().join("external.md"));
    assert!(site.contains("external.md"));
    assert!(site.contains("external.html"));
}

#[test]
fn duplicate_create_events_do_not_change_the_count() {
    let (dir, site) = new_site();
    fs::write(dir.path().join("twice.md"), "x\n").unwrap();

    site.sync_created(&site.root().join("twice.md"));
    let count = site.document_count();
    site.sync_created(&site.root().join("twice.md"));
    assert_eq!(site.document_count(), count);
}

#[test]
fn created_directory_is_scanned_recursively() {
    let (dir, site) = new_site();
    fs::create_dir_all(dir.path().join("blog/drafts")).unwrap();
    fs::write(dir.path().join("blog/post.md"), "post\n").unwrap();
    fs::write(dir.path().join("blog/drafts/idea.md"), "idea\n").unwrap();

    let dirs = site.sync_created(&site.root().join("blog"));

    assert!(site.contains("blog"));
    assert!(site.contains("blog/post.md"));
    assert!(site.contains("blog/drafts"));
    assert!(site.contains("blog/drafts/idea.md"));

    // Both new directories need watches armed.
    assert!(dirs.contains(&site.root().join("blog")));
    assert!(dirs.contains(&site.root().join("blog/drafts")));
}

#[test]
fn create_events_for_reserved_paths_are_ignored() {
    let (_dir, site) = new_site();
    let before = site.document_count();

    site.sync_created(&site.root().join("_templates/default.html"));
    site.sync_created(&site.root().join("_sorrel/config.toml"));
    site.sync_created(&site.root().join(".DS_Store"));

    assert_eq!(site.document_count(), before);
}

#[test]
fn external_deletion_is_deindexed() {
    let (dir, site) = new_site();
    fs::remove_file(dir.path().join("index.md")).unwrap();

    site.sync_removed(&site.root().join("index.md"));
    assert!(!site.contains("index.md"));
    assert!(!site.contains("index.html"));
}

#[test]
fn deletion_of_unknown_path_is_a_no_op() {
    let (_dir, site) = new_site();
    let before = site.document_count();
    site.sync_removed(&site.root().join("never-indexed.md"));
    assert_eq!(site.document_count(), before);
}

#[test]
fn directory_deletion_removes_the_subtree() {
    struct Removals {
        paths: Mutex<Vec<String>>,
    }

    impl IndexObserver for Removals {
        fn on_removed(&self, path: &str) {
            self.paths.lock().push(path.to_string());
        }
    }

    let (dir, site) = new_site();
    fs::create_dir(dir.path().join("blog")).unwrap();
    fs::write(dir.path().join("blog/a.md"), "a\n").unwrap();
    fs::write(dir.path().join("blog/b.txt"), "b\n").unwrap();
    site.sync_created(&site.root().join("blog"));
    assert!(site.contains("blog/a.md"));

    let removals = Arc::new(Removals {
        paths: Mutex::new(Vec::new()),
    });
    site.subscribe(removals.clone());

    fs::remove_dir_all(dir.path().join("blog")).unwrap();
    site.sync_removed(&site.root().join("blog"));

    for path in ["blog", "blog/a.md", "blog/b.txt"] {
        assert!(!site.contains(path), "{path} still indexed");
    }
    assert_eq!(removals.paths.lock().len(), 3);
}

#[test]
fn added_documents_are_announced_to_observers() {
    struct Additions {
        paths: Mutex<Vec<String>>,
    }

    impl IndexObserver for Additions {
        fn on_added(&self, path: &str) {
            self.paths.lock().push(path.to_string());
        }
    }

    let (dir, site) = new_site();
    let additions = Arc::new(Additions {
        paths: Mutex::new(Vec::new()),
    });
    site.subscribe(additions.clone());

    fs::write(dir.path().join("fresh.md"), "fresh\n").unwrap();
    site.sync_created(&site.root().join("fresh.md"));

    assert_eq!(*additions.paths.lock(), ["fresh.md"]);
}
