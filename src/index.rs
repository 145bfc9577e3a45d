//! PathIndex: the unique-path registry owning all documents.
//!
//! Every path maps to exactly one document. A convertible document occupies
//! two keys: its source path and its converter's target path. The second key
//! is flagged as generated so listings and the build pass can distinguish
//! sources from aliases.

use std::collections::HashMap;

use crate::convert::Converter;
use crate::document::{Document, DocumentId, DocumentView};
use crate::error::{Result, SiteError};

#[derive(Debug, Clone, Copy)]
struct PathEntry {
    id: DocumentId,
    generated: bool,
}

/// Path-keyed document registry with tree-navigation helpers.
///
/// The index is the single owner of all [`Document`] values; callers borrow
/// them for the duration of an operation.
#[derive(Default)]
pub struct PathIndex {
    documents: HashMap<DocumentId, Document>,
    paths: HashMap<String, PathEntry>,
    next_id: u32,
}

impl PathIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> DocumentId {
        self.next_id += 1;
        DocumentId::new(self.next_id).expect("document ids start at 1")
    }

    /// Register a document at its path (and at its generated path, if any).
    ///
    /// Fails with `AlreadyExists` when either path is already owned by a
    /// different document. Callers at the synchronizer boundary treat that
    /// signal as "skip"; explicit user creation surfaces it as an error.
    pub fn insert(&mut self, doc: Document) -> Result<DocumentId> {
        if self.paths.contains_key(doc.path()) {
            return Err(SiteError::AlreadyExists {
                path: doc.path().to_string(),
            });
        }
        if let Some(target) = doc.generated_path() {
            if self.paths.contains_key(target) {
                return Err(SiteError::AlreadyExists {
                    path: target.to_string(),
                });
            }
        }

        let id = self.allocate_id();
        self.paths.insert(
            doc.path().to_string(),
            PathEntry {
                id,
                generated: false,
            },
        );
        if let Some(target) = doc.generated_path() {
            self.paths
                .insert(target.to_string(), PathEntry { id, generated: true });
        }
        self.documents.insert(id, doc);
        Ok(id)
    }

    /// Remove the document at `path`, dropping both of its keys.
    pub fn remove(&mut self, path: &str) -> Result<Document> {
        let entry = self.paths.get(path).copied().ok_or_else(|| SiteError::NotFound {
            path: path.to_string(),
        })?;
        let doc = self
            .documents
            .remove(&entry.id)
            .expect("path entry points at a live document");
        self.paths.remove(doc.path());
        if let Some(target) = doc.generated_path() {
            self.paths.remove(target);
        }
        Ok(doc)
    }

    /// O(1) lookup. Fails with `NotFound` if the path is not registered.
    pub fn get(&self, path: &str) -> Result<&Document> {
        self.paths
            .get(path)
            .map(|entry| &self.documents[&entry.id])
            .ok_or_else(|| SiteError::NotFound {
                path: path.to_string(),
            })
    }

    /// Identity of the document registered at `path`.
    pub fn id_of(&self, path: &str) -> Option<DocumentId> {
        self.paths.get(path).map(|entry| entry.id)
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.paths.contains_key(path)
    }

    /// Is `path` registered as a generated alias (a converter target)?
    pub fn is_generated(&self, path: &str) -> bool {
        self.paths.get(path).is_some_and(|entry| entry.generated)
    }

    /// Parent document; `None` only for the root.
    ///
    /// Directory closure guarantees the lookup succeeds for every non-root
    /// document, so a missing parent is reported as `NotFound` only when the
    /// invariant has been violated externally.
    pub fn parent_of(&self, doc: &Document) -> Option<&Document> {
        doc.parent_path().and_then(|p| self.get(p).ok())
    }

    /// Children of the directory at `path`, directories first, each group in
    /// case-sensitive lexicographic order. Generated aliases are not listed.
    pub fn children_of(&self, path: &str) -> Vec<&Document> {
        let mut children: Vec<&Document> = self
            .source_documents()
            .filter(|doc| doc.parent_path() == Some(path))
            .collect();
        children.sort_by_key(|doc| (!doc.is_directory(), doc.name().to_string()));
        children
    }

    /// All documents through their source key, in unspecified order.
    pub fn source_documents(&self) -> impl Iterator<Item = &Document> {
        self.paths.values().filter_map(|entry| {
            if entry.generated {
                None
            } else {
                self.documents.get(&entry.id)
            }
        })
    }

    /// Number of documents (not path keys) in the index.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Move the document at `old_path` to `new_path`, keeping its identity.
    ///
    /// The converter is rebuilt by the caller for the new path, since target
    /// computation depends on it. Both old keys are dropped and both new keys
    /// registered. Fails with `AlreadyExists` if the destination source or
    /// target path is owned by another document.
    pub fn relocate(
        &mut self,
        old_path: &str,
        new_path: String,
        converter: Option<Box<dyn Converter>>,
    ) -> Result<()> {
        let entry = self
            .paths
            .get(old_path)
            .copied()
            .ok_or_else(|| SiteError::NotFound {
                path: old_path.to_string(),
            })?;

        let occupied = |path: &str| {
            self.paths
                .get(path)
                .is_some_and(|other| other.id != entry.id)
        };
        if occupied(&new_path) {
            return Err(SiteError::AlreadyExists { path: new_path });
        }
        if let Some(target) = converter.as_ref().map(|c| c.target()) {
            if occupied(target) {
                return Err(SiteError::AlreadyExists {
                    path: target.to_string(),
                });
            }
        }

        let doc = self
            .documents
            .get_mut(&entry.id)
            .expect("path entry points at a live document");
        self.paths.remove(doc.path());
        if let Some(target) = doc.generated_path() {
            self.paths.remove(target);
        }

        doc.set_location(new_path, converter);
        self.paths.insert(
            doc.path().to_string(),
            PathEntry {
                id: entry.id,
                generated: false,
            },
        );
        if let Some(target) = doc.generated_path() {
            self.paths.insert(
                target.to_string(),
                PathEntry {
                    id: entry.id,
                    generated: true,
                },
            );
        }
        Ok(())
    }

    /// Snapshot of the document at `path`.
    pub fn view(&self, path: &str) -> Result<DocumentView> {
        self.get(path).map(DocumentView::from)
    }
}
