//! Document model: one indexed filesystem entry.
//!
//! Paths are POSIX-style strings relative to the site root; `""` denotes the
//! root directory itself. Documents never hold references to their container
//! or to each other; navigation goes through the [`PathIndex`] by path key.
//!
//! [`PathIndex`]: crate::index::PathIndex

use std::fmt;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use crate::convert::Converter;

/// Stable identity of a document inside one [`PathIndex`].
///
/// [`PathIndex`]: crate::index::PathIndex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(NonZeroU32);

impl DocumentId {
    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    pub fn value(&self) -> u32 {
        self.0.get()
    }
}

/// One file or directory under the site root.
///
/// A document with an attached converter is *convertible*: it also occupies a
/// second index key, the converter's computed target path, so that the
/// generated artifact is never mistaken for an independent source file.
pub struct Document {
    path: String,
    is_directory: bool,
    converter: Option<Box<dyn Converter>>,
}

impl Document {
    /// Create a directory document. `""` is the site root.
    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_directory: true,
            converter: None,
        }
    }

    /// Create a file document, optionally with an attached converter.
    pub fn file(path: impl Into<String>, converter: Option<Box<dyn Converter>>) -> Self {
        Self {
            path: path.into(),
            is_directory: false,
            converter,
        }
    }

    /// Path relative to the site root (`""` for the root itself).
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Basename of the path. Derived, not stored.
    pub fn name(&self) -> &str {
        basename(&self.path)
    }

    /// Absolute filesystem path under `root`.
    pub fn full_path(&self, root: &Path) -> PathBuf {
        join_full(root, &self.path)
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    pub fn converter(&self) -> Option<&dyn Converter> {
        self.converter.as_deref()
    }

    /// The converter's output path, if this document is convertible.
    pub fn generated_path(&self) -> Option<&str> {
        self.converter.as_ref().map(|c| c.target())
    }

    /// Parent path key. `None` only for the root document.
    pub fn parent_path(&self) -> Option<&str> {
        if self.path.is_empty() {
            None
        } else {
            Some(dirname(&self.path))
        }
    }

    /// Replace path and converter in place. Used by the index on relocation;
    /// the caller is responsible for updating the path keys.
    pub(crate) fn set_location(&mut self, path: String, converter: Option<Box<dyn Converter>>) {
        self.path = path;
        self.converter = converter;
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("path", &self.path)
            .field("is_directory", &self.is_directory)
            .field("generated_path", &self.generated_path())
            .finish()
    }
}

/// Cloneable snapshot of a document, for callers that must not hold the
/// index lock (tree views, the preview server).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentView {
    pub path: String,
    pub name: String,
    pub is_directory: bool,
    pub generated_path: Option<String>,
}

impl From<&Document> for DocumentView {
    fn from(doc: &Document) -> Self {
        Self {
            path: doc.path().to_string(),
            name: doc.name().to_string(),
            is_directory: doc.is_directory(),
            generated_path: doc.generated_path().map(str::to_string),
        }
    }
}

/// Directory part of a relative POSIX path (`""` for top-level entries).
pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..i],
        None => "",
    }
}

/// Final component of a relative POSIX path.
pub fn basename(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// Join a relative POSIX path onto another.
pub fn join_path(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

/// Resolve a relative POSIX path against an absolute root.
pub fn join_full(root: &Path, path: &str) -> PathBuf {
    if path.is_empty() {
        root.to_path_buf()
    } else {
        root.join(path)
    }
}
