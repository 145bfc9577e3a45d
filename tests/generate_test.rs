//! Tests for the whole-tree build pass and its error collection.

use std::fs;
use std::sync::Arc;

use parking_lot::Mutex;
use sorrel::{ErrorMessage, IndexObserver, Site};
use tempfile::TempDir;

fn new_site() -> (TempDir, Site) {
    let dir = TempDir::new().unwrap();
    Site::create(dir.path()).unwrap();
    let site = Site::open(dir.path()).unwrap();
    (dir, site)
}

#[test]
fn renders_markdown_through_the_template() {
    let dir = TempDir::new().unwrap();
    Site::create(dir.path()).unwrap();
    fs::create_dir_all(dir.path().join("_templates")).unwrap();
    fs::write(dir.path().join("_templates/default.html"), "{{ content }}").unwrap();
    fs::write(
        dir.path().join("index.md"),
        "template: default\n\nSome *emphasis* here.\n",
    )
    .unwrap();

    let site = Site::open(dir.path()).unwrap();
    let errors = site.generate();
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");

    let html = fs::read_to_string(site.root().join("index.html")).unwrap();
    assert!(html.contains("<em>emphasis</em>"), "got: {html}");
}

#[test]
fn header_keys_are_available_in_the_template() {
    let (_dir, site) = new_site();
    let html_path = site.root().join("index.html");
    let errors = site.generate();
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");

    // The starter template fills {{ title }} from the front matter.
    let html = fs::read_to_string(html_path).unwrap();
    assert!(html.contains("<title>"));
    assert!(html.contains("<h1>"));
}

#[test]
fn missing_template_is_reported_against_the_template_path() {
    let (dir, site) = new_site();
    fs::write(
        dir.path().join("broken.md"),
        "template: missing\n\nhello\n",
    )
    .unwrap();
    let site = {
        drop(site);
        Site::open(dir.path()).unwrap()
    };

    let errors = site.generate();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].file, "_templates/missing.html");
    assert!(errors[0].message.contains("not found"), "{}", errors[0].message);

    // The failing page did not abort the pass: the other page still built.
    assert!(site.root().join("index.html").is_file());
    assert!(!site.root().join("broken.html").exists());
}

#[test]
fn template_syntax_error_is_reported_against_the_template_path() {
    let (dir, site) = new_site();
    fs::write(dir.path().join("_templates/bad.html"), "{% if %}").unwrap();
    fs::write(dir.path().join("page.md"), "template: bad\n\nbody\n").unwrap();
    let site = {
        drop(site);
        Site::open(dir.path()).unwrap()
    };

    let errors = site.generate();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].file, "_templates/bad.html");
}

#[test]
fn failures_never_abort_the_pass() {
    let (dir, site) = new_site();
    fs::write(dir.path().join("a.md"), "ok a\n").unwrap();
    fs::write(dir.path().join("b.md"), "template: gone\n\nbad b\n").unwrap();
    fs::write(dir.path().join("c.md"), "ok c\n").unwrap();
    fs::write(dir.path().join("d.md"), "template: gone\n\nbad d\n").unwrap();
    let site = {
        drop(site);
        Site::open(dir.path()).unwrap()
    };

    // Five pages, exactly two failing converters.
    let errors = site.generate();
    assert_eq!(errors.len(), 2);
    for error in &errors {
        assert_eq!(error.file, "_templates/gone.html");
    }
    for built in ["a.html", "c.html", "index.html"] {
        assert!(site.root().join(built).is_file(), "{built} missing");
    }
    assert!(!site.root().join("b.html").exists());
    assert!(!site.root().join("d.html").exists());
}

#[test]
fn error_list_is_broadcast_to_observers() {
    struct Collector {
        seen: Mutex<Vec<ErrorMessage>>,
    }

    impl IndexObserver for Collector {
        fn on_generated(&self, errors: &[ErrorMessage]) {
            self.seen.lock().extend_from_slice(errors);
        }
    }

    let (dir, site) = new_site();
    fs::write(dir.path().join("page.md"), "template: absent\n\nx\n").unwrap();
    let site = {
        drop(site);
        Site::open(dir.path()).unwrap()
    };

    let collector = Arc::new(Collector {
        seen: Mutex::new(Vec::new()),
    });
    site.subscribe(collector.clone());

    let errors = site.generate();
    assert_eq!(*collector.seen.lock(), errors);
}

#[test]
fn regeneration_overwrites_previous_output() {
    let (dir, site) = new_site();
    site.generate();
    let first = fs::read_to_string(site.root().join("index.html")).unwrap();

    fs::write(
        dir.path().join("index.md"),
        "title: changed\ntemplate: default\n\nNew body\n",
    )
    .unwrap();
    site.generate();
    let second = fs::read_to_string(site.root().join("index.html")).unwrap();
    assert_ne!(first, second);
    assert!(second.contains("New body"));
}
