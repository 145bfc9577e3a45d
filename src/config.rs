//! Site configuration.
//!
//! Layered: built-in defaults, then `_sorrel/config.toml`, then environment
//! variables. Environment variables use the `SORREL_` prefix with double
//! underscores between nesting levels, e.g. `SORREL_PREVIEW__URL_PATH=/blog`
//! sets `preview.url_path`.
//!
//! The engine core itself only reads `project.format`, which gates the
//! one-shot legacy migration; preview and upload settings are consumed by
//! the tools sitting above the engine.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Reserved subdirectory holding configuration and uploader state.
pub const CONFIG_DIR: &str = "_sorrel";

/// Reserved subdirectory holding page templates.
pub const TEMPLATES_DIR: &str = "_templates";

/// Configuration file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.toml";

/// Site format written by this version of the engine.
pub const CURRENT_FORMAT: &str = "0.3";

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct SiteConfig {
    #[serde(default)]
    pub project: ProjectConfig,

    #[serde(default)]
    pub preview: PreviewConfig,

    #[serde(default)]
    pub upload: UploadConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProjectConfig {
    /// Version tag of the on-disk site layout.
    #[serde(default = "default_format")]
    pub format: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PreviewConfig {
    /// Path part of the preview URL the site is served under.
    #[serde(default = "default_url_path")]
    pub url_path: String,
}

/// Credentials for the external mirroring tool. Consumed by the upload
/// wrapper, carried here because they live in the same persisted store.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct UploadConfig {
    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub user: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub remote_dir: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default log level: error, warn, info, debug, trace.
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module level overrides.
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_format() -> String {
    CURRENT_FORMAT.to_string()
}

fn default_url_path() -> String {
    "/".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            url_path: default_url_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl SiteConfig {
    /// Absolute path of the configuration file under `site_root`.
    pub fn file_path(site_root: &Path) -> PathBuf {
        site_root.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Load configuration for the site at `site_root`.
    pub fn load(site_root: &Path) -> Result<Self> {
        let config = Figment::from(Serialized::defaults(SiteConfig::default()))
            .merge(Toml::file(Self::file_path(site_root)))
            .merge(Env::prefixed("SORREL_").split("__"))
            .extract()?;
        Ok(config)
    }

    /// Persist the configuration under `site_root`, creating the
    /// configuration directory if needed.
    pub fn save(&self, site_root: &Path) -> Result<()> {
        let path = Self::file_path(site_root);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let text = toml::to_string_pretty(self).expect("config serializes to TOML");
        fs::write(path, text)?;
        Ok(())
    }

    /// Does the on-disk layout need the one-shot migration before the index
    /// can be built?
    pub fn needs_migration(&self) -> bool {
        self.project.format != CURRENT_FORMAT
    }
}
