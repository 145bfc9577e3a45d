//! Tests for the initial scan and the index invariants it establishes.

use std::fs;

use sorrel::{Site, SiteError};
use tempfile::TempDir;

fn new_site() -> TempDir {
    let dir = TempDir::new().unwrap();
    Site::create(dir.path()).unwrap();
    dir
}

#[test]
fn scan_registers_root_and_starter_page() {
    let dir = new_site();
    let site = Site::open(dir.path()).unwrap();

    let root = site.get("").unwrap();
    assert!(root.is_directory);

    let page = site.get("index.md").unwrap();
    assert!(!page.is_directory);
    assert_eq!(page.generated_path.as_deref(), Some("index.html"));

    // Root + index.md.
    assert_eq!(site.document_count(), 2);
}

#[test]
fn reserved_directories_are_not_registered() {
    let dir = new_site();
    let site = Site::open(dir.path()).unwrap();

    assert!(!site.contains("_sorrel"));
    assert!(!site.contains("_templates"));
    assert!(!site.contains("_templates/default.html"));
}

#[test]
fn hidden_files_are_not_registered() {
    let dir = new_site();
    fs::write(dir.path().join(".hidden"), "x").unwrap();
    fs::create_dir(dir.path().join(".git")).unwrap();

    let site = Site::open(dir.path()).unwrap();
    assert!(!site.contains(".hidden"));
    assert!(!site.contains(".git"));
}

#[test]
fn generated_path_is_an_alias_of_the_source() {
    let dir = new_site();
    // A stale artifact from an earlier build sits next to its source.
    fs::write(dir.path().join("index.html"), "<html>old</html>").unwrap();

    let site = Site::open(dir.path()).unwrap();

    // Both keys resolve to the same document; the artifact was not indexed
    // as an independent source file.
    let by_source = site.get("index.md").unwrap();
    let by_target = site.get("index.html").unwrap();
    assert_eq!(by_source, by_target);
    assert_eq!(site.document_count(), 2);
}

#[test]
fn children_are_sorted_directories_first() {
    let dir = new_site();
    fs::create_dir(dir.path().join("zoo")).unwrap();
    fs::create_dir(dir.path().join("assets")).unwrap();
    fs::write(dir.path().join("about.md"), "about\n").unwrap();

    let site = Site::open(dir.path()).unwrap();
    let names: Vec<String> = site
        .children("")
        .unwrap()
        .into_iter()
        .map(|doc| doc.name)
        .collect();
    assert_eq!(names, ["assets", "zoo", "about.md", "index.md"]);
}

#[test]
fn files_have_no_children() {
    let dir = new_site();
    let site = Site::open(dir.path()).unwrap();
    assert!(site.children("index.md").unwrap().is_empty());
}

#[test]
fn lookup_of_unknown_path_fails_with_not_found() {
    let dir = new_site();
    let site = Site::open(dir.path()).unwrap();
    assert!(matches!(
        site.get("nope.md"),
        Err(SiteError::NotFound { path }) if path == "nope.md"
    ));
}

#[test]
fn directory_closure_holds_for_nested_trees() {
    let dir = new_site();
    fs::create_dir_all(dir.path().join("a/b")).unwrap();
    fs::write(dir.path().join("a/b/deep.md"), "deep\n").unwrap();

    let site = Site::open(dir.path()).unwrap();
    assert!(site.contains("a"));
    assert!(site.contains("a/b"));
    assert!(site.contains("a/b/deep.md"));
    assert!(site.contains("a/b/deep.html"));
}

#[test]
fn open_refuses_non_site_directories() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(Site::open(dir.path()), Err(SiteError::NotASite { .. })));
}

#[test]
fn open_refuses_stale_site_format() {
    let dir = new_site();
    let config_file = dir.path().join("_sorrel/config.toml");
    fs::write(&config_file, "[project]\nformat = \"0.1\"\n").unwrap();

    assert!(matches!(
        Site::open(dir.path()),
        Err(SiteError::MigrationRequired { found, .. }) if found == "0.1"
    ));
}
