//! Index-change and build-error notification.
//!
//! An explicit list of subscribers with delivery in subscription order. The
//! engine calls the broadcaster after every index mutation so a shell can
//! keep a displayed tree in sync, and once per `generate()` pass with the
//! collected error list.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::convert::ErrorMessage;

/// Receives index-change and build notifications.
///
/// All methods have empty default bodies so subscribers implement only what
/// they care about. Callbacks run synchronously on the mutating thread and
/// must not call back into the engine.
pub trait IndexObserver: Send + Sync {
    /// A document was registered at `path`.
    fn on_added(&self, path: &str) {
        let _ = path;
    }

    /// A document moved from `old_path` to `new_path`.
    fn on_moved(&self, old_path: &str, new_path: &str) {
        let _ = (old_path, new_path);
    }

    /// The document at `path` was removed.
    fn on_removed(&self, path: &str) {
        let _ = path;
    }

    /// A `generate()` pass finished with the given collected errors.
    fn on_generated(&self, errors: &[ErrorMessage]) {
        let _ = errors;
    }
}

/// Ordered subscriber list.
#[derive(Default)]
pub struct Broadcaster {
    observers: RwLock<Vec<Arc<dyn IndexObserver>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber. Delivery order is subscription order.
    pub fn subscribe(&self, observer: Arc<dyn IndexObserver>) {
        self.observers.write().push(observer);
    }

    pub fn notify_added(&self, path: &str) {
        for observer in self.observers.read().iter() {
            observer.on_added(path);
        }
    }

    pub fn notify_moved(&self, old_path: &str, new_path: &str) {
        for observer in self.observers.read().iter() {
            observer.on_moved(old_path, new_path);
        }
    }

    pub fn notify_removed(&self, path: &str) {
        for observer in self.observers.read().iter() {
            observer.on_removed(path);
        }
    }

    pub fn notify_generated(&self, errors: &[ErrorMessage]) {
        for observer in self.observers.read().iter() {
            observer.on_generated(errors);
        }
    }
}
