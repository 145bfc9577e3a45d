//! The site engine: authoritative content index plus build pass.
//!
//! A [`Site`] owns the [`PathIndex`] behind a lock, so user-initiated
//! operations and filesystem-watcher callbacks can mutate it from different
//! threads. All filesystem operations tolerate `NotFound`/`AlreadyExists`
//! races caused by the watcher's eventual-consistency delay.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::{CONFIG_DIR, SiteConfig, TEMPLATES_DIR};
use crate::convert::{Converter, ConverterRegistry, ErrorMessage};
use crate::document::{Document, DocumentView, dirname, join_full, join_path};
use crate::error::{Result, SiteError};
use crate::events::{Broadcaster, IndexObserver};
use crate::index::PathIndex;
use crate::{debug_event, log_event};

const STARTER_TEMPLATE: &str = "\
<!DOCTYPE html>
<html>
  <head>
    <title>{{ title }}</title>
  </head>
  <body>
{{ content }}
  </body>
</html>
";

/// Paths discovered while scanning a directory subtree.
#[derive(Default)]
struct ScanLog {
    added: Vec<String>,
    dirs: Vec<PathBuf>,
}

/// Checks if a directory contains a site (detected by the presence of the
/// configuration subdirectory).
pub fn is_site(directory: &Path) -> bool {
    directory.join(CONFIG_DIR).is_dir()
}

/// One loaded site: configuration, converter registry, and content index.
pub struct Site {
    root: PathBuf,
    config: SiteConfig,
    registry: ConverterRegistry,
    index: RwLock<PathIndex>,
    broadcaster: Broadcaster,
}

impl Site {
    /// Create a new site skeleton at `path`: configuration file, templates
    /// directory with a starter template, and a starter index page.
    pub fn create(path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("site")
            .to_string();

        SiteConfig::default().save(path)?;

        let templates = path.join(TEMPLATES_DIR);
        fs::create_dir_all(&templates)?;
        fs::write(templates.join("default.html"), STARTER_TEMPLATE)?;

        fs::write(
            path.join("index.md"),
            format!("title: {name}\ntemplate: default\n\n# {name}\n"),
        )?;
        Ok(())
    }

    /// Open the site at `root` with the stock converter registry.
    pub fn open(root: &Path) -> Result<Self> {
        Self::open_with_registry(root, ConverterRegistry::with_defaults())
    }

    /// Open the site at `root` with an explicit converter registry.
    ///
    /// Loads configuration, refuses sites whose format tag requires the
    /// one-shot migration, and performs the initial recursive scan. This is
    /// the only point where the whole tree is traversed eagerly; all later
    /// changes are incremental.
    pub fn open_with_registry(root: &Path, registry: ConverterRegistry) -> Result<Self> {
        if !is_site(root) {
            return Err(SiteError::NotASite {
                path: root.to_path_buf(),
            });
        }
        let root = fs::canonicalize(root)?;
        let config = SiteConfig::load(&root)?;
        if config.needs_migration() {
            return Err(SiteError::MigrationRequired {
                found: config.project.format.clone(),
                current: crate::config::CURRENT_FORMAT.to_string(),
            });
        }

        let site = Self {
            root,
            config,
            registry,
            index: RwLock::new(PathIndex::new()),
            broadcaster: Broadcaster::new(),
        };

        {
            let mut index = site.index.write();
            index.insert(Document::directory(""))?;
            let mut log = ScanLog::default();
            site.scan_dir(&mut index, "", &mut log)?;
            log_event!("site", "loaded", "{} documents", index.len());
        }
        Ok(site)
    }

    /// Absolute site root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Path part of the preview URL, normalized to either `""` or a value
    /// with a trailing slash.
    pub fn url_path(&self) -> String {
        let path = self.config.preview.url_path.trim_matches('/');
        if path.is_empty() {
            String::new()
        } else {
            format!("{path}/")
        }
    }

    /// Subscribe to index-change and build notifications.
    pub fn subscribe(&self, observer: Arc<dyn IndexObserver>) {
        self.broadcaster.subscribe(observer);
    }

    // ------------------------------------------------------------------
    // Lookup surface
    // ------------------------------------------------------------------

    pub fn contains(&self, path: &str) -> bool {
        self.index.read().contains_path(path)
    }

    /// Snapshot of the document at `path`.
    pub fn get(&self, path: &str) -> Result<DocumentView> {
        self.index.read().view(path)
    }

    /// Snapshots of the children of the directory at `path`, directories
    /// first, each group in lexicographic order. Files have no children.
    pub fn children(&self, path: &str) -> Result<Vec<DocumentView>> {
        let index = self.index.read();
        let doc = index.get(path)?;
        if !doc.is_directory() {
            return Ok(Vec::new());
        }
        Ok(index
            .children_of(path)
            .into_iter()
            .map(DocumentView::from)
            .collect())
    }

    /// Number of documents in the index.
    pub fn document_count(&self) -> usize {
        self.index.read().len()
    }

    /// Relative paths of all convertible sources. The upload tool excludes
    /// these from mirroring, since only their generated output is published.
    pub fn source_paths(&self) -> Vec<String> {
        let index = self.index.read();
        let mut paths: Vec<String> = index
            .source_documents()
            .filter(|doc| doc.generated_path().is_some())
            .map(|doc| doc.path().to_string())
            .collect();
        paths.sort();
        paths
    }

    /// Absolute paths of every indexed directory, including the root.
    pub fn watch_dirs(&self) -> Vec<PathBuf> {
        let index = self.index.read();
        index
            .source_documents()
            .filter(|doc| doc.is_directory())
            .map(|doc| doc.full_path(&self.root))
            .collect()
    }

    // ------------------------------------------------------------------
    // User-initiated operations
    // ------------------------------------------------------------------

    /// Create an empty file named `name` under the directory at `parent`.
    pub fn new_file(&self, name: &str, parent: &str) -> Result<String> {
        let path = self.child_path(name, parent)?;
        let converter = self.registry.matching_converter(&self.root, &path);
        self.ensure_target_free(converter.as_deref())?;
        let full = join_full(&self.root, &path);
        if full.exists() {
            return Err(SiteError::AlreadyExists { path });
        }
        fs::write(&full, "")?;

        self.index
            .write()
            .insert(Document::file(path.clone(), converter))?;
        log_event!("site", "new file", "{path}");
        self.broadcaster.notify_added(&path);
        Ok(path)
    }

    /// Create a directory named `name` under the directory at `parent`.
    pub fn new_directory(&self, name: &str, parent: &str) -> Result<String> {
        let path = self.child_path(name, parent)?;
        let full = join_full(&self.root, &path);
        // Tolerate the directory already existing on disk (the watcher may
        // not have caught up with an external mkdir).
        match fs::create_dir(&full) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(e.into()),
        }

        self.index.write().insert(Document::directory(path.clone()))?;
        log_event!("site", "new directory", "{path}");
        self.broadcaster.notify_added(&path);
        Ok(path)
    }

    /// Copy an existing external file into the site under `parent`.
    pub fn add_external_file(&self, source: &Path, parent: &str) -> Result<String> {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SiteError::InvalidName {
                name: source.display().to_string(),
            })?;
        let path = self.child_path(name, parent)?;
        let converter = self.registry.matching_converter(&self.root, &path);
        self.ensure_target_free(converter.as_deref())?;
        fs::copy(source, join_full(&self.root, &path))?;

        self.index
            .write()
            .insert(Document::file(path.clone(), converter))?;
        log_event!("site", "added file", "{path}");
        self.broadcaster.notify_added(&path);
        Ok(path)
    }

    /// Rename the document at `path` to `new_name` within its directory.
    ///
    /// The physical file is renamed, the index key changes, and for
    /// convertible documents the generated counterpart is renamed in
    /// lockstep. Directory renames rekey every descendant.
    pub fn rename(&self, path: &str, new_name: &str) -> Result<String> {
        validate_name(new_name)?;
        let new_path = join_path(dirname(path), new_name);
        if new_path == path {
            return Ok(new_path);
        }

        let mut index = self.index.write();
        let doc = index.get(path)?;
        let is_directory = doc.is_directory();
        let old_generated = doc.generated_path().map(str::to_string);

        if index.contains_path(&new_path) {
            return Err(SiteError::AlreadyExists { path: new_path });
        }

        let new_converter = if is_directory {
            None
        } else {
            self.registry.matching_converter(&self.root, &new_path)
        };
        let new_generated = new_converter.as_ref().map(|c| c.target().to_string());

        // The generated counterpart's new key must be free before anything
        // moves on disk; a key the document already owns (its old source
        // path) is not a collision.
        if let Some(target) = &new_generated {
            if index.id_of(target).is_some_and(|id| index.id_of(path) != Some(id)) {
                return Err(SiteError::AlreadyExists {
                    path: target.clone(),
                });
            }
        }

        // Physical move; a missing source means the watcher will deliver
        // the deletion shortly, so the index change proceeds.
        match fs::rename(join_full(&self.root, path), join_full(&self.root, &new_path)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!("[site] rename source missing on disk: {path}");
            }
            Err(e) => return Err(e.into()),
        }

        index.relocate(path, new_path.clone(), new_converter)?;

        // Generated counterpart moves in lockstep.
        if let (Some(old_target), Some(new_target)) = (&old_generated, &new_generated) {
            let old_full = join_full(&self.root, old_target);
            if old_full.exists() {
                if let Err(e) = fs::rename(old_full, join_full(&self.root, new_target)) {
                    tracing::warn!("[site] failed to move generated file {old_target}: {e}");
                }
            }
        }

        if is_directory {
            let prefix = format!("{path}/");
            let descendants: Vec<String> = index
                .source_documents()
                .filter(|d| d.path().starts_with(&prefix))
                .map(|d| d.path().to_string())
                .collect();
            for old_rel in descendants {
                let new_rel = format!("{new_path}{}", &old_rel[path.len()..]);
                let descendant_dir = index.get(&old_rel)?.is_directory();
                let converter = if descendant_dir {
                    None
                } else {
                    self.registry.matching_converter(&self.root, &new_rel)
                };
                index.relocate(&old_rel, new_rel, converter)?;
            }
        }
        drop(index);

        log_event!("site", "renamed", "{path} -> {new_path}");
        self.broadcaster.notify_moved(path, &new_path);
        Ok(new_path)
    }

    /// Remove the document at `path`: physical delete plus index removal,
    /// recursive for directories.
    pub fn remove(&self, path: &str) -> Result<()> {
        if path.is_empty() {
            return Err(SiteError::InvalidName {
                name: path.to_string(),
            });
        }

        let mut removed = Vec::new();
        {
            let mut index = self.index.write();
            let doc = index.get(path)?;
            let full = doc.full_path(&self.root);

            if doc.is_directory() {
                match fs::remove_dir_all(&full) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                removed = deindex_subtree(&mut index, path);
            } else {
                let generated = doc.generated_path().map(|t| join_full(&self.root, t));
                remove_file_quiet(&full);
                if let Some(target) = generated {
                    remove_file_quiet(&target);
                }
                index.remove(path)?;
                removed.push(path.to_string());
            }
        }

        log_event!("site", "removed", "{path}");
        for gone in &removed {
            self.broadcaster.notify_removed(gone);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Build pass
    // ------------------------------------------------------------------

    /// Regenerate every derived artifact in one pass.
    ///
    /// Individual failures never abort the pass: expected conversion
    /// failures and per-document I/O errors are collected, broadcast to
    /// observers, and returned in order.
    pub fn generate(&self) -> Vec<ErrorMessage> {
        let mut errors = Vec::new();
        {
            let index = self.index.read();
            let mut sources: Vec<_> = index
                .source_documents()
                .filter_map(|doc| doc.converter().map(|converter| (doc.path(), converter)))
                .collect();
            sources.sort_by_key(|(path, _)| *path);

            for (path, converter) in sources {
                match converter.convert() {
                    Ok(None) => {
                        debug_event!("generate", "converted", "{path}");
                    }
                    Ok(Some(message)) => {
                        log_event!("generate", "failed", "{}: {}", message.file, message.message);
                        errors.push(message);
                    }
                    Err(e) => {
                        log_event!("generate", "io error", "{path}: {e}");
                        errors.push(ErrorMessage::new(path, e.to_string()));
                    }
                }
            }
        }
        self.broadcaster.notify_generated(&errors);
        errors
    }

    // ------------------------------------------------------------------
    // Watcher reconciliation
    // ------------------------------------------------------------------

    /// Reconcile a CREATE notification for an absolute path.
    ///
    /// Idempotent: paths the engine itself just wrote (a converter's own
    /// generated target, a user-created file) leave the index untouched.
    /// Returns directories whose watches must be (re-)armed.
    pub fn sync_created(&self, full_path: &Path) -> Vec<PathBuf> {
        let Some(rel) = self.relative(full_path) else {
            return Vec::new();
        };
        if rel.is_empty() || is_ignored(&rel) {
            return Vec::new();
        }

        let mut log = ScanLog::default();
        {
            let mut index = self.index.write();
            if index.contains_path(&rel) {
                // Already indexed: only make sure a new directory is armed.
                if index.get(&rel).is_ok_and(|doc| doc.is_directory()) {
                    log.dirs.push(full_path.to_path_buf());
                }
                debug_event!("watcher", "already indexed, skipped", "{rel}");
            } else if full_path.is_dir() {
                if index.insert(Document::directory(rel.clone())).is_ok() {
                    log.added.push(rel.clone());
                    if let Err(e) = self.scan_dir(&mut index, &rel, &mut log) {
                        tracing::warn!("[watcher] failed to scan new directory {rel}: {e}");
                    }
                }
            } else {
                self.register_file(&mut index, &rel, &mut log);
            }
        }

        for path in &log.added {
            log_event!("watcher", "created", "{path}");
            self.broadcaster.notify_added(path);
        }
        log.dirs
    }

    /// Reconcile a DELETE notification for an absolute path.
    ///
    /// No-op if the path is not indexed (the engine already removed it).
    pub fn sync_removed(&self, full_path: &Path) {
        let Some(rel) = self.relative(full_path) else {
            return;
        };

        let mut removed = Vec::new();
        {
            let mut index = self.index.write();
            if !index.contains_path(&rel) {
                return;
            }
            // A generated alias disappearing is not a document deletion; the
            // source will regenerate it on the next pass.
            if index.is_generated(&rel) {
                debug_event!("watcher", "generated target removed, ignored", "{rel}");
                return;
            }
            if index.get(&rel).is_ok_and(|doc| doc.is_directory()) {
                removed = deindex_subtree(&mut index, &rel);
            } else if index.remove(&rel).is_ok() {
                removed.push(rel.clone());
            }
        }

        for gone in &removed {
            log_event!("watcher", "deleted", "{gone}");
            self.broadcaster.notify_removed(gone);
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Validate `name` and resolve it against the directory at `parent`.
    fn child_path(&self, name: &str, parent: &str) -> Result<String> {
        validate_name(name)?;
        let index = self.index.read();
        let parent_doc = index.get(parent)?;
        if !parent_doc.is_directory() {
            return Err(SiteError::NotADirectory {
                path: parent.to_string(),
            });
        }
        let path = join_path(parent, name);
        if is_ignored(&path) {
            return Err(SiteError::InvalidName {
                name: name.to_string(),
            });
        }
        if index.contains_path(&path) {
            return Err(SiteError::AlreadyExists { path });
        }
        Ok(path)
    }

    /// A convertible path's computed target key must be free before the
    /// file lands on disk, or the write would succeed and the registration
    /// fail, orphaning the file.
    fn ensure_target_free(&self, converter: Option<&dyn Converter>) -> Result<()> {
        if let Some(target) = converter.map(|c| c.target()) {
            if self.index.read().contains_path(target) {
                return Err(SiteError::AlreadyExists {
                    path: target.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Depth-first scan of one directory subtree into the index.
    ///
    /// Within a directory, convertible sources register before plain files
    /// so a stale generated artifact on disk becomes the alias of its source
    /// instead of an independent document.
    fn scan_dir(&self, index: &mut PathIndex, dir: &str, log: &mut ScanLog) -> Result<()> {
        let full = join_full(&self.root, dir);
        log.dirs.push(full.clone());

        let mut names: Vec<(String, bool)> = Vec::new();
        for entry in fs::read_dir(&full)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                tracing::warn!(
                    "[site] skipping non-UTF-8 file name in {}",
                    full.display()
                );
                continue;
            };
            let is_dir = entry.file_type()?.is_dir();
            names.push((name, is_dir));
        }
        names.sort();

        let mut subdirs = Vec::new();
        let mut files = Vec::new();
        for (name, is_dir) in names {
            let rel = join_path(dir, &name);
            if is_ignored(&rel) {
                continue;
            }
            if is_dir {
                subdirs.push(rel);
            } else {
                files.push(rel);
            }
        }

        let (convertible, plain): (Vec<_>, Vec<_>) = files
            .into_iter()
            .partition(|rel| self.registry.matching_converter(&self.root, rel).is_some());
        for rel in convertible.into_iter().chain(plain) {
            self.register_file(index, &rel, log);
        }

        for rel in subdirs {
            if !index.contains_path(&rel) {
                index.insert(Document::directory(rel.clone()))?;
                log.added.push(rel.clone());
            }
            self.scan_dir(index, &rel, log)?;
        }
        Ok(())
    }

    /// Register one file, attaching a converter if one matches. Skips paths
    /// already present (generated aliases) and target collisions.
    fn register_file(&self, index: &mut PathIndex, rel: &str, log: &mut ScanLog) {
        if index.contains_path(rel) {
            debug_event!("site", "already indexed, skipped", "{rel}");
            return;
        }
        let converter = self.registry.matching_converter(&self.root, rel);
        match index.insert(Document::file(rel.to_string(), converter)) {
            Ok(_) => log.added.push(rel.to_string()),
            Err(SiteError::AlreadyExists { path }) => {
                debug_event!("site", "target path occupied, skipped", "{rel} -> {path}");
            }
            Err(e) => {
                tracing::warn!("[site] failed to register {rel}: {e}");
            }
        }
    }

    /// Relative POSIX path of `full_path` under the site root, or `None` if
    /// it lies outside.
    fn relative(&self, full_path: &Path) -> Option<String> {
        let rel = full_path.strip_prefix(&self.root).ok()?;
        let parts: Option<Vec<&str>> = rel
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect();
        Some(parts?.join("/"))
    }
}

/// Remove a file, ignoring a missing target.
fn remove_file_quiet(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("[site] failed to remove {}: {e}", path.display()),
    }
}

/// Drop a directory document and all of its descendants from the index.
/// Returns removed source paths, deepest first.
fn deindex_subtree(index: &mut PathIndex, dir: &str) -> Vec<String> {
    let prefix = format!("{dir}/");
    let mut paths: Vec<String> = index
        .source_documents()
        .filter(|doc| doc.path().starts_with(&prefix))
        .map(|doc| doc.path().to_string())
        .collect();
    paths.sort_by_key(|p| std::cmp::Reverse(p.len()));
    paths.push(dir.to_string());

    let mut removed = Vec::new();
    for path in paths {
        if index.remove(&path).is_ok() {
            removed.push(path);
        }
    }
    removed
}

/// Dotfiles and the reserved subdirectories are never registered.
fn is_ignored(rel: &str) -> bool {
    if rel.is_empty() {
        return false;
    }
    let mut components = rel.split('/');
    let first = components.next().unwrap_or_default();
    if first == CONFIG_DIR || first == TEMPLATES_DIR {
        return true;
    }
    std::iter::once(first)
        .chain(components)
        .any(|c| c.starts_with('.'))
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name.starts_with('.') {
        return Err(SiteError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_and_hidden_paths_are_ignored() {
        assert!(is_ignored("_sorrel"));
        assert!(is_ignored("_sorrel/config.toml"));
        assert!(is_ignored("_templates/default.html"));
        assert!(is_ignored(".git"));
        assert!(is_ignored("docs/.hidden"));
        assert!(!is_ignored("docs/page.md"));
        assert!(!is_ignored(""));
    }

    #[test]
    fn names_are_validated() {
        assert!(validate_name("page.md").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("a/b").is_err());
        assert!(validate_name(".hidden").is_err());
    }
}
