//! Configuration loaded from a TOML file.
//!
//! ```toml
//! media_root = "/srv/pathagar/media"
//! catalog_path = "/srv/pathagar/catalog.json"
//! storage = "link"
//! replace_strategy = "always-copy"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::catalog::DEFAULT_STATUS;
use crate::error::Result;
use crate::ingest::{ImportOptions, StorageStrategy};
use crate::resync::ReplaceStrategy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the file store (`books/` and `covers/` live here).
    pub media_root: PathBuf,
    /// JSON document backing the catalog.
    pub catalog_path: PathBuf,
    /// Directory for temporary cover assets; the OS temp dir when unset.
    pub temp_dir: Option<PathBuf>,
    pub default_status: String,
    pub storage: StorageStrategy,
    pub skip_known_paths: bool,
    pub replace_strategy: ReplaceStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("media"),
            catalog_path: PathBuf::from("catalog.json"),
            temp_dir: None,
            default_status: DEFAULT_STATUS.to_string(),
            storage: StorageStrategy::Copy,
            skip_known_paths: true,
            replace_strategy: ReplaceStrategy::Original,
        }
    }
}

impl Config {
    /// Read `path`, or return the defaults when it does not exist.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn with_media_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.media_root = root.into();
        self
    }

    pub fn with_catalog_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.catalog_path = path.into();
        self
    }

    pub fn with_storage(mut self, storage: StorageStrategy) -> Self {
        self.storage = storage;
        self
    }

    pub fn with_skip_known_paths(mut self, skip: bool) -> Self {
        self.skip_known_paths = skip;
        self
    }

    pub fn with_replace_strategy(mut self, strategy: ReplaceStrategy) -> Self {
        self.replace_strategy = strategy;
        self
    }

    /// Import options matching this configuration.
    pub fn import_options(&self) -> ImportOptions {
        let options = ImportOptions::default()
            .with_storage(self.storage)
            .with_skip_known_paths(self.skip_known_paths)
            .with_status(self.default_status.clone());
        match &self.temp_dir {
            Some(dir) => options.with_temp_dir(dir),
            None => options,
        }
    }
}
