//! Config session: the stateful front of the loader.
//!
//! A session owns a [`SourceStore`], the caller's key delimiter and the
//! configuration directory. Every failure is logged through the injected
//! [`ConfigLogger`], recorded as a [`Diagnostic`] and returned, but never
//! leaves the session in a worse state than before the call.

use super::keypath;
use super::process::{self, ProcessSource, SystemProcess};
use super::store::{OVERRIDE_SOURCE, SourceStore, SourceTier};
use crate::error::{ConfigError, ConfigResult, Diagnostic};
use crate::logging::{ConfigLogger, TracingLogger};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Default key delimiter, identical to the canonical separator.
pub const DEFAULT_DELIMITER: &str = keypath::SEPARATOR;

/// Default environment variable that selects the environment name.
pub const DEFAULT_ENV_VAR: &str = "NODE_ENV";

/// Override key that records the resolved environment name.
pub const ENVIRONMENT_NAME_KEY: &str = "environmentName";

/// Extension appended to logical config names.
const CONFIG_EXTENSION: &str = "json";

/// Tunables for a session.
#[derive(Clone)]
pub struct SessionOptions {
    /// Delimiter callers use in keys.
    pub delimiter: String,
    /// Environment variable consulted first for the environment name.
    pub env_var: String,
    /// Separator that nests environment variable names.
    pub env_separator: String,
    /// Where process arguments and environment variables come from.
    pub process: Arc<dyn ProcessSource>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            env_var: DEFAULT_ENV_VAR.to_string(),
            env_separator: process::DEFAULT_ENV_SEPARATOR.to_string(),
            process: Arc::new(SystemProcess),
        }
    }
}

impl SessionOptions {
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn with_env_var(mut self, env_var: impl Into<String>) -> Self {
        self.env_var = env_var.into();
        self
    }

    pub fn with_env_separator(mut self, separator: impl Into<String>) -> Self {
        self.env_separator = separator.into();
        self
    }

    pub fn with_process(mut self, process: impl ProcessSource + 'static) -> Self {
        self.process = Arc::new(process);
        self
    }
}

/// Where the environment name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameOrigin {
    /// The environment-selection variable
    EnvVar,
    /// The last positional command-line argument
    Argument,
    /// The caller-supplied default
    Default,
}

impl std::fmt::Display for NameOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NameOrigin::EnvVar => write!(f, "environment variable"),
            NameOrigin::Argument => write!(f, "command-line argument"),
            NameOrigin::Default => write!(f, "default"),
        }
    }
}

/// Resolved environment name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentSelection {
    pub name: String,
    pub origin: NameOrigin,
}

pub struct ConfigSession {
    store: SourceStore,
    delimiter: String,
    config_dir: PathBuf,
    /// Set when the directory failed validation; file loads by name no-op.
    dir_error: Option<ConfigError>,
    env_var: String,
    logger: Arc<dyn ConfigLogger>,
    process: Arc<dyn ProcessSource>,
    diagnostics: Vec<Diagnostic>,
}

impl std::fmt::Debug for ConfigSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigSession")
            .field("config_dir", &self.config_dir)
            .field("delimiter", &self.delimiter)
            .field("sources", &self.store.source_names())
            .field("diagnostics", &self.diagnostics.len())
            .finish()
    }
}

impl ConfigSession {
    /// Create a session over `config_dir` reading the real process.
    pub fn new(config_dir: impl Into<PathBuf>, logger: Option<Arc<dyn ConfigLogger>>) -> Self {
        Self::with_options(config_dir, logger, SessionOptions::default())
    }

    /// Create a session with explicit options.
    ///
    /// The directory must exist and contain at least one entry. If it does
    /// not, the error is logged and the session is left non-functional:
    /// loads fail with the directory error, argv and env are never ingested
    /// and every lookup returns `None`.
    pub fn with_options(
        config_dir: impl Into<PathBuf>,
        logger: Option<Arc<dyn ConfigLogger>>,
        options: SessionOptions,
    ) -> Self {
        let config_dir = config_dir.into();
        let logger =
            logger.unwrap_or_else(|| Arc::new(TracingLogger::new().with_name("confstack")));

        let mut session = Self {
            store: SourceStore::with_env_separator(options.env_separator),
            delimiter: DEFAULT_DELIMITER.to_string(),
            config_dir,
            dir_error: None,
            env_var: options.env_var,
            logger,
            process: options.process,
            diagnostics: Vec::new(),
        };

        if let Err(err) = validate_directory(&session.config_dir) {
            session.dir_error = Some(session.report(err));
        }
        let _ = session.set_delimiter(options.delimiter.as_str());
        session.reload_volatile_sources();
        session
    }

    /// Whether the config directory passed validation.
    pub fn is_ready(&self) -> bool {
        self.dir_error.is_none()
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn store(&self) -> &SourceStore {
        &self.store
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Every failure observed so far, oldest first.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn clear_diagnostics(&mut self) {
        self.diagnostics.clear();
    }

    /// Path of `{config_dir}/{name}.json` if that file exists.
    pub fn config_file_path(&self, name: &str) -> Option<PathBuf> {
        if self.dir_error.is_some() {
            return None;
        }
        let path = self.config_path_for(name);
        path.is_file().then_some(path)
    }

    /// Load `{config_dir}/{name}.json` as source `name`.
    pub fn load_config(&mut self, name: &str) -> ConfigResult<()> {
        if let Some(err) = self.dir_error.clone() {
            return Err(self.report(err));
        }
        let path = self.config_path_for(name);
        self.load_and_reload(name, &path)
    }

    /// Load the file at `path` as source `name`.
    pub fn load_config_with_path(
        &mut self,
        name: &str,
        path: impl AsRef<Path>,
    ) -> ConfigResult<()> {
        if let Some(err) = self.dir_error.clone() {
            return Err(self.report(err));
        }
        self.load_and_reload(name, path.as_ref())
    }

    /// Resolve the environment name and record it without loading a file.
    pub fn set_environment_name(&mut self, default_name: &str) -> EnvironmentSelection {
        let selection = self.resolve_environment_name(default_name);
        self.record_environment_name(&selection);
        self.reload_volatile_sources();
        selection
    }

    /// Resolve the environment name, load its config file and record it.
    ///
    /// The name is recorded even when the file is missing; the load error is
    /// returned alongside.
    pub fn load_environment_config(
        &mut self,
        default_name: &str,
    ) -> (EnvironmentSelection, ConfigResult<()>) {
        let selection = self.resolve_environment_name(default_name);

        let outcome = match self.dir_error.clone() {
            Some(err) => Err(self.report(err)),
            None => {
                let path = self.config_path_for(&selection.name);
                self.load_file(&selection.name, &path)
            }
        };

        self.record_environment_name(&selection);
        self.reload_volatile_sources();
        (selection, outcome)
    }

    /// The environment name recorded by the last selection, if any.
    pub fn get_environment_name(&self) -> Option<&str> {
        self.store
            .source(OVERRIDE_SOURCE)?
            .get(ENVIRONMENT_NAME_KEY)?
            .as_str()
    }

    /// Look up a value by key segments.
    ///
    /// The first segment is resolved against all sources; each further
    /// segment steps one level into the value found so far. Every segment may
    /// itself contain the session delimiter.
    pub fn get<S: AsRef<str>>(&self, keys: &[S]) -> Option<&Value> {
        if self.dir_error.is_some() {
            return None;
        }
        let (first, rest) = keys.split_first()?;
        let initial = self.store.get(&self.canonical(first.as_ref()))?;
        rest.iter().try_fold(initial, |value, key| {
            keypath::traverse(value, &self.canonical(key.as_ref()))
        })
    }

    /// Typed lookup. Absent keys and values of the wrong shape yield `None`.
    pub fn get_as<T: DeserializeOwned, S: AsRef<str>>(&self, keys: &[S]) -> Option<T> {
        let value = self.get(keys)?;
        match serde_json::from_value(value.clone()) {
            Ok(typed) => Some(typed),
            Err(e) => {
                let path: Vec<&str> = keys.iter().map(AsRef::as_ref).collect();
                self.logger.warn(&format!(
                    "Config value at '{}' has an unexpected type: {}",
                    path.join(&self.delimiter),
                    e
                ));
                None
            }
        }
    }

    /// Name of the source that supplies `key`.
    pub fn provenance(&self, key: &str) -> Option<&str> {
        if self.dir_error.is_some() {
            return None;
        }
        self.store.provenance(&self.canonical(key))
    }

    /// Replace the key delimiter. Empty or missing delimiters are rejected
    /// and the current one is kept.
    pub fn set_delimiter<'a>(
        &mut self,
        delimiter: impl Into<Option<&'a str>>,
    ) -> ConfigResult<()> {
        match delimiter.into() {
            Some(d) if !d.is_empty() => {
                self.delimiter = d.to_string();
                Ok(())
            }
            other => Err(self.report(ConfigError::InvalidDelimiter(
                other.unwrap_or_default().to_string(),
            ))),
        }
    }

    /// Re-read every loaded file from disk, then argv and env.
    ///
    /// A file that fails to reload keeps its previous contents.
    pub fn reload(&mut self) -> ConfigResult<()> {
        let files: Vec<(String, PathBuf)> = self
            .store
            .sources()
            .iter()
            .filter(|source| source.tier == SourceTier::File)
            .filter_map(|source| Some((source.name.clone(), source.path.clone()?)))
            .collect();

        // Oldest first so the newest file ends up in front again.
        let mut first_error = None;
        for (name, path) in files.into_iter().rev() {
            if let Err(err) = self.load_file(&name, &path) {
                first_error.get_or_insert(err);
            }
        }
        self.reload_volatile_sources();

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Re-ingest process arguments and environment variables.
    ///
    /// Does nothing when the config directory failed validation.
    pub fn reload_volatile_sources(&mut self) {
        if self.dir_error.is_some() {
            return;
        }
        self.store.reload_volatile_sources(self.process.as_ref());
    }

    fn resolve_environment_name(&self, default_name: &str) -> EnvironmentSelection {
        if let Some(name) = self
            .process
            .var(&self.env_var)
            .filter(|name| !name.is_empty())
        {
            return EnvironmentSelection {
                name,
                origin: NameOrigin::EnvVar,
            };
        }

        if let Some(name) = process::last_positional(&self.process.args()) {
            return EnvironmentSelection {
                name,
                origin: NameOrigin::Argument,
            };
        }

        EnvironmentSelection {
            name: default_name.to_string(),
            origin: NameOrigin::Default,
        }
    }

    fn record_environment_name(&mut self, selection: &EnvironmentSelection) {
        self.logger.info(&format!(
            "Using environment '{}' (from {})",
            selection.name, selection.origin
        ));
        self.store
            .set_override(ENVIRONMENT_NAME_KEY, Value::String(selection.name.clone()));
    }

    fn load_and_reload(&mut self, name: &str, path: &Path) -> ConfigResult<()> {
        let outcome = self.load_file(name, path);
        if outcome.is_ok() {
            self.reload_volatile_sources();
        }
        outcome
    }

    fn load_file(&mut self, name: &str, path: &Path) -> ConfigResult<()> {
        match self.store.load_file(name, path) {
            Ok(()) => {
                self.logger
                    .info(&format!("Loaded config '{}' from {}", name, path.display()));
                Ok(())
            }
            Err(err) => Err(self.report(err)),
        }
    }

    fn config_path_for(&self, name: &str) -> PathBuf {
        self.config_dir.join(format!("{}.{}", name, CONFIG_EXTENSION))
    }

    fn canonical(&self, key: &str) -> String {
        keypath::resolve_key(key, &self.delimiter)
    }

    /// Log and record `err`, handing it back for the caller to return.
    fn report(&mut self, err: ConfigError) -> ConfigError {
        self.logger.error(&err.to_string());
        self.diagnostics.push(Diagnostic::from(&err));
        err
    }
}

fn validate_directory(path: &Path) -> ConfigResult<()> {
    let invalid = |reason: &str| ConfigError::InvalidDirectory {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    if !path.exists() {
        return Err(invalid("directory does not exist"));
    }
    if !path.is_dir() {
        return Err(invalid("not a directory"));
    }
    let mut entries = std::fs::read_dir(path).map_err(|e| invalid(&e.to_string()))?;
    if entries.next().is_none() {
        return Err(invalid("directory is empty"));
    }
    Ok(())
}
