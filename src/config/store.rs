//! Prioritized source store.
//!
//! Sources are grouped into tiers. Lookups scan tiers from highest to lowest
//! and, inside the file tier, from the most recently loaded file down. The
//! first source in which the whole canonical key resolves wins; values are
//! never merged across sources.

use super::keypath;
use super::process::{self, ProcessSource};
use crate::error::{ConfigError, ConfigResult};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Source name for parsed command-line arguments.
pub const ARGV_SOURCE: &str = "argv";
/// Source name for environment variables.
pub const ENV_SOURCE: &str = "env";
/// Source name for programmatic overrides.
pub const OVERRIDE_SOURCE: &str = "overrides";

/// Source priority tier (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SourceTier {
    /// Values set programmatically (lowest priority)
    Override = 0,
    /// JSON files
    File = 1,
    /// Process environment variables
    Env = 2,
    /// Process arguments (highest priority)
    Argv = 3,
}

impl std::fmt::Display for SourceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceTier::Override => write!(f, "override"),
            SourceTier::File => write!(f, "file"),
            SourceTier::Env => write!(f, "env"),
            SourceTier::Argv => write!(f, "argv"),
        }
    }
}

/// One named tree of settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    pub name: String,
    pub tier: SourceTier,
    pub tree: Value,
    /// File the tree was read from, for file sources.
    pub path: Option<PathBuf>,
}

impl Source {
    pub fn new(name: impl Into<String>, tier: SourceTier, tree: Value) -> Self {
        Self {
            name: name.into(),
            tier,
            tree,
            path: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Resolve a canonical key inside this source only.
    pub fn get(&self, canonical: &str) -> Option<&Value> {
        keypath::traverse(&self.tree, canonical)
    }
}

/// Ordered set of sources, highest priority first.
#[derive(Debug, Clone)]
pub struct SourceStore {
    sources: Vec<Source>,
    /// Separator used to nest environment variable names.
    env_separator: String,
}

impl Default for SourceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceStore {
    pub fn new() -> Self {
        Self::with_env_separator(process::DEFAULT_ENV_SEPARATOR)
    }

    pub fn with_env_separator(separator: impl Into<String>) -> Self {
        Self {
            sources: Vec::new(),
            env_separator: separator.into(),
        }
    }

    /// Register `source`, replacing any source with the same name.
    ///
    /// A source goes in front of every existing source of its own tier, so a
    /// re-registered file becomes the most recent one.
    pub fn insert(&mut self, source: Source) {
        self.remove(&source.name);
        let index = self
            .sources
            .iter()
            .position(|existing| existing.tier <= source.tier)
            .unwrap_or(self.sources.len());
        debug!(source = %source.name, tier = %source.tier, index, "Registering config source");
        self.sources.insert(index, source);
    }

    /// Remove a source by name, returning it.
    pub fn remove(&mut self, name: &str) -> Option<Source> {
        let index = self.sources.iter().position(|s| s.name == name)?;
        Some(self.sources.remove(index))
    }

    pub fn clear(&mut self) {
        self.sources.clear();
    }

    pub fn source(&self, name: &str) -> Option<&Source> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Names of all sources in lookup order.
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Parse the JSON file at `path` and register it as file source `name`.
    ///
    /// On any failure the store is left unchanged.
    pub fn load_file(&mut self, name: &str, path: &Path) -> ConfigResult<()> {
        if !path.is_file() {
            return Err(ConfigError::MissingConfigFile {
                name: name.to_string(),
                path: path.to_path_buf(),
            });
        }

        let invalid = |reason: String| ConfigError::InvalidConfigFile {
            name: name.to_string(),
            path: path.to_path_buf(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let tree: Value = serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;
        if !tree.is_object() {
            return Err(invalid("top-level value must be a JSON object".to_string()));
        }

        self.insert(Source::new(name, SourceTier::File, tree).with_path(path));
        Ok(())
    }

    /// Same as [`SourceStore::load_file`]; the caller supplies the full path.
    pub fn load_file_by_path(&mut self, name: &str, path: impl AsRef<Path>) -> ConfigResult<()> {
        self.load_file(name, path.as_ref())
    }

    /// Re-read process arguments and environment variables.
    ///
    /// Runs after every file load so both always outrank file sources.
    pub fn reload_volatile_sources(&mut self, process: &dyn ProcessSource) {
        let args = process.args();
        let argv = process::parse_args(args.get(1..).unwrap_or_default());
        let env = process::parse_env(&process.vars(), &self.env_separator);

        self.insert(Source::new(ENV_SOURCE, SourceTier::Env, env));
        self.insert(Source::new(ARGV_SOURCE, SourceTier::Argv, argv));
    }

    /// Set `canonical` in the override source, creating it if needed.
    pub fn set_override(&mut self, canonical: &str, value: Value) {
        let mut source = self.remove(OVERRIDE_SOURCE).unwrap_or_else(|| {
            Source::new(
                OVERRIDE_SOURCE,
                SourceTier::Override,
                Value::Object(Map::new()),
            )
        });

        if !source.tree.is_object() {
            source.tree = Value::Object(Map::new());
        }
        if let Value::Object(ref mut map) = source.tree {
            keypath::insert(map, canonical, value);
        }
        self.insert(source);
    }

    /// Effective value for a canonical key: first source that has it wins.
    pub fn get(&self, canonical: &str) -> Option<&Value> {
        self.sources.iter().find_map(|source| source.get(canonical))
    }

    /// Name of the source that currently supplies `canonical`.
    pub fn provenance(&self, canonical: &str) -> Option<&str> {
        self.sources
            .iter()
            .find(|source| source.get(canonical).is_some())
            .map(|source| source.name.as_str())
    }

    /// Top-level view of the effective settings.
    ///
    /// Each top-level key maps to the whole subtree of the source that wins
    /// it, matching how [`SourceStore::get`] resolves keys.
    pub fn merged(&self) -> Value {
        let mut merged = Map::new();
        for source in self.sources.iter().rev() {
            if let Value::Object(map) = &source.tree {
                for (key, value) in map {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }
        Value::Object(merged)
    }
}
