//! Search option loading
//!
//! Layers, later ones winning key by key:
//!
//! 1. `defaults/tagscan.default.toml`, compiled in
//! 2. TOML files and snippets, in the order they were added
//! 3. `TAGSCAN_SEARCH__<KEY>` environment variables, when enabled
//! 4. single key overrides
//!
//! The result is a [`TagscanConfig`] whose `search` table feeds
//! [`tagscan_engine::SearchContext::new`].

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat, ValueKind};
use serde::Deserialize;
use std::path::Path;
use tagscan_engine::SearchOptions;

const DEFAULT_TOML: &str = include_str!("../defaults/tagscan.default.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct TagscanConfig {
    pub search: SearchOptions,
}

/// Builds a [`TagscanConfig`] from the compiled-in defaults and whatever is layered on top.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Add a TOML file that must exist.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Add a TOML file, skipped when it doesn't exist (e.g. a per-user file).
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Add inline TOML, e.g. a `[search]` table stored next to a pattern file.
    pub fn with_toml(mut self, toml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(toml, FileFormat::Toml));
        self
    }

    /// Read `<PREFIX>_SEARCH__<KEY>` variables, `TAGSCAN_SEARCH__CANDIDATE_LIMIT=500` with
    /// prefix `TAGSCAN`. Values are parsed as numbers and booleans where they look like one.
    pub fn with_env(mut self, prefix: &str) -> Self {
        let source = Environment::with_prefix(prefix)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Set one dotted key, e.g. `search.first_match_only`, over every other layer.
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    pub fn build(self) -> Result<TagscanConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// The compiled-in defaults alone.
pub fn load_defaults() -> Result<TagscanConfig, ConfigError> {
    Loader::new().build()
}
