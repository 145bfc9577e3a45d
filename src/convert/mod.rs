//! Converters turn source files into derived artifacts.
//!
//! A [`ConverterRegistry`] holds an ordered list of factories; the first
//! factory whose `matches` accepts a path wins, so specific converters can be
//! registered ahead of generic fallbacks. The registry is a value owned by
//! the engine, never a process-wide singleton, so engine instances under test
//! do not interfere.

pub mod markdown;

use std::path::Path;

use serde::Serialize;

use crate::error::Result;

pub use markdown::{MarkdownConverter, MarkdownFactory};

/// A user-actionable conversion failure.
///
/// `file` names the path where the user must act: for template problems
/// that is the template's path, not the source page's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorMessage {
    pub file: String,
    pub message: String,
}

impl ErrorMessage {
    pub fn new(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            message: message.into(),
        }
    }
}

/// A strategy object bound to one source file.
///
/// `target()` must be a pure function of the source path so it can be
/// computed without performing the conversion.
pub trait Converter: Send + Sync {
    /// Output path relative to the site root.
    fn target(&self) -> &str;

    /// Auxiliary input paths whose modification should also count as
    /// staleness. Converters that re-render unconditionally return nothing.
    fn dependencies(&self) -> Vec<String> {
        Vec::new()
    }

    /// Perform the conversion, writing the target file.
    ///
    /// `Ok(Some(_))` reports an expected failure the user can fix (missing
    /// template, template defect). `Err(_)` is reserved for filesystem
    /// failures on the source or target file.
    fn convert(&self) -> Result<Option<ErrorMessage>>;
}

/// Constructs converters for paths it recognizes.
pub trait ConverterFactory: Send + Sync {
    /// Can this converter be applied to the file at `path`?
    fn matches(&self, path: &str) -> bool;

    /// Build a converter bound to `(site_root, path)`.
    fn create(&self, site_root: &Path, path: &str) -> Box<dyn Converter>;
}

/// Ordered list of converter factories. First match wins.
#[derive(Default)]
pub struct ConverterRegistry {
    factories: Vec<Box<dyn ConverterFactory>>,
}

impl ConverterRegistry {
    /// An empty registry. Matches nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock registry with the Markdown converter installed.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(MarkdownFactory));
        registry
    }

    /// Append a factory. Registration order is match order.
    pub fn register(&mut self, factory: Box<dyn ConverterFactory>) {
        self.factories.push(factory);
    }

    /// Return the first matching converter for `path`, or `None`.
    pub fn matching_converter(&self, site_root: &Path, path: &str) -> Option<Box<dyn Converter>> {
        self.factories
            .iter()
            .find(|f| f.matches(path))
            .map(|f| f.create(site_root, path))
    }
}
