pub mod config;
pub mod convert;
pub mod document;
pub mod error;
pub mod events;
pub mod index;
pub mod logging;
pub mod site;
pub mod watcher;

pub use config::{CONFIG_DIR, CURRENT_FORMAT, SiteConfig, TEMPLATES_DIR};
pub use convert::{Converter, ConverterFactory, ConverterRegistry, ErrorMessage};
pub use document::{Document, DocumentId, DocumentView};
pub use error::{Result, SiteError};
pub use events::{Broadcaster, IndexObserver};
pub use index::PathIndex;
pub use site::{Site, is_site};
pub use watcher::Synchronizer;
