//! Filesystem synchronizer.
//!
//! Keeps the [`Site`] index consistent with out-of-band filesystem
//! mutations. One non-recursive watch is installed per indexed directory,
//! because newly created subdirectories must themselves be watched; the
//! synchronizer re-arms on every directory it learns about, including ones
//! discovered through its own CREATE events.
//!
//! Events for paths the engine itself just wrote (a converter's generated
//! target) are idempotent no-ops; the engine checks the index before
//! acting.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use notify::event::ModifyKind;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::error::Result;
use crate::site::Site;
use crate::{debug_event, log_event};

/// Reconciles filesystem-watch notifications with the site index.
pub struct Synchronizer {
    site: Arc<Site>,
    watcher: RecommendedWatcher,
    event_rx: Receiver<notify::Result<Event>>,
    armed: HashSet<PathBuf>,
}

impl Synchronizer {
    /// Create a synchronizer and arm a watch on every indexed directory.
    pub fn new(site: Arc<Site>) -> Result<Self> {
        let (tx, event_rx) = crossbeam_channel::unbounded();
        let watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })?;

        let mut sync = Self {
            site,
            watcher,
            event_rx,
            armed: HashSet::new(),
        };
        for dir in sync.site.watch_dirs() {
            sync.arm(&dir);
        }
        log_event!("watcher", "armed", "{} directories", sync.armed.len());
        Ok(sync)
    }

    /// Run the event loop until the watch channel closes.
    pub fn run(mut self) {
        log_event!("watcher", "started");
        while let Ok(res) = self.event_rx.recv() {
            match res {
                Ok(event) => self.handle_event(event),
                Err(e) => tracing::error!("[watcher] file watch error: {e}"),
            }
        }
        log_event!("watcher", "stopped");
    }

    /// Drain and handle all currently pending events without blocking.
    pub fn pump(&mut self) {
        while let Ok(res) = self.event_rx.try_recv() {
            match res {
                Ok(event) => self.handle_event(event),
                Err(e) => tracing::error!("[watcher] file watch error: {e}"),
            }
        }
    }

    fn handle_event(&mut self, event: Event) {
        for path in &event.paths {
            match event.kind {
                EventKind::Create(_) => self.created(path),
                EventKind::Remove(_) => self.removed(path),
                // Some platforms report renames as name-modifications; an
                // existence check disambiguates which side this path is.
                EventKind::Modify(ModifyKind::Name(_)) => {
                    if path.exists() {
                        self.created(path);
                    } else {
                        self.removed(path);
                    }
                }
                _ => {
                    debug_event!("watcher", "ignored", "{:?} {}", event.kind, path.display());
                }
            }
        }
    }

    fn created(&mut self, path: &Path) {
        for dir in self.site.sync_created(path) {
            self.arm(&dir);
        }
    }

    fn removed(&mut self, path: &Path) {
        self.site.sync_removed(path);
        self.disarm(path);
    }

    /// Watch a directory, once. Arming failures are logged and tolerated;
    /// the directory may already be gone again.
    fn arm(&mut self, dir: &Path) {
        if !self.armed.insert(dir.to_path_buf()) {
            return;
        }
        match self.watcher.watch(dir, RecursiveMode::NonRecursive) {
            Ok(()) => debug_event!("watcher", "watching", "{}", dir.display()),
            Err(e) => {
                tracing::warn!("[watcher] failed to watch {}: {e}", dir.display());
                self.armed.remove(dir);
            }
        }
    }

    /// Detach the watch for a deleted directory and all armed descendants.
    fn disarm(&mut self, dir: &Path) {
        let stale: Vec<PathBuf> = self
            .armed
            .iter()
            .filter(|armed| armed.as_path() == dir || armed.starts_with(dir))
            .cloned()
            .collect();
        for dir in stale {
            // The OS usually drops the watch with the directory; unwatch
            // errors here only mean it already happened.
            if let Err(e) = self.watcher.unwatch(&dir) {
                debug_event!("watcher", "unwatch", "{}: {e}", dir.display());
            }
            self.armed.remove(&dir);
        }
    }

    /// Number of currently armed directory watches.
    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }
}
