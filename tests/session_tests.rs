//! Integration tests for config sessions.
//!
//! Covers environment selection, file/env/argv precedence and key lookup
//! through the public API, using temp directories and fixed process sources.

use confstack::config::{
    ConfigSession, NameOrigin, ProcessSource, SessionOptions, StaticProcess, resolve_key,
};
use confstack::error::{ConfigError, ErrorCode};
use confstack::logging::{LogLevel, MemoryLogger};
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Helper to create a config directory with the given files.
fn create_config_dir(files: &[(&str, &str)]) -> TempDir {
    let temp = TempDir::new().expect("Failed to create temp dir");
    for (name, content) in files {
        fs::write(temp.path().join(name), content).expect("Failed to write config file");
    }
    temp
}

/// Helper to create a session with a recording logger.
fn create_session(
    dir: &Path,
    process: impl ProcessSource + 'static,
) -> (ConfigSession, MemoryLogger) {
    let logger = MemoryLogger::new();
    let session = ConfigSession::with_options(
        dir,
        Some(Arc::new(logger.clone())),
        SessionOptions::default().with_process(process),
    );
    (session, logger)
}

/// Process whose environment can change while a session holds it.
#[derive(Clone, Default)]
struct MutableProcess {
    vars: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MutableProcess {
    fn set_var(&self, key: &str, value: &str) {
        self.vars
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }
}

impl ProcessSource for MutableProcess {
    fn args(&self) -> Vec<String> {
        vec!["server".to_string()]
    }

    fn vars(&self) -> Vec<(String, String)> {
        self.vars
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn var(&self, name: &str) -> Option<String> {
        self.vars.lock().unwrap().get(name).cloned()
    }
}

#[test]
fn test_local_environment_selected_by_default() {
    let temp = create_config_dir(&[
        ("all.json", r#"{"name": "base"}"#),
        ("local.json", r#"{"name": "local"}"#),
    ]);
    let (mut session, logger) = create_session(temp.path(), StaticProcess::new("server"));

    let (selection, outcome) = session.load_environment_config("local");

    assert!(outcome.is_ok());
    assert_eq!(selection.origin, NameOrigin::Default);
    assert_eq!(session.get_environment_name(), Some("local"));
    assert_eq!(session.get(&["name"]), Some(&json!("local")));
    assert!(logger.messages(LogLevel::Error).is_empty());
}

#[test]
fn test_base_file_then_environment_file() {
    let temp = create_config_dir(&[
        ("all.json", r#"{"name": "base", "shared": {"retries": 3}}"#),
        ("local.json", r#"{"name": "local"}"#),
    ]);
    let (mut session, _) = create_session(temp.path(), StaticProcess::new("server"));

    session.load_config("all").unwrap();
    session.load_environment_config("local").1.unwrap();

    assert_eq!(session.get(&["name"]), Some(&json!("local")));
    assert_eq!(session.get(&["shared", "retries"]), Some(&json!(3)));
}

#[test]
fn test_missing_production_file() {
    let temp = create_config_dir(&[
        ("all.json", r#"{"name": "base"}"#),
        ("local.json", r#"{"name": "local"}"#),
    ]);
    let process = StaticProcess::new("server").with_var("NODE_ENV", "production");
    let (mut session, logger) = create_session(temp.path(), process);

    let (selection, outcome) = session.load_environment_config("local");

    assert_eq!(selection.name, "production");
    assert_eq!(selection.origin, NameOrigin::EnvVar);
    assert!(matches!(outcome, Err(ConfigError::MissingConfigFile { .. })));
    assert_eq!(session.get_environment_name(), Some("production"));
    assert_eq!(session.get(&["name"]), None);

    let errors = logger.messages(LogLevel::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("production"));
    assert_eq!(session.diagnostics()[0].code, ErrorCode::MissingConfigFile);
}

#[test]
fn test_positional_argument_selects_environment() {
    let temp = create_config_dir(&[("staging.json", r#"{"name": "staging"}"#)]);
    let process = StaticProcess::new("server").with_args(["--port", "8080", "staging"]);
    let (mut session, _) = create_session(temp.path(), process);

    let (selection, outcome) = session.load_environment_config("local");

    assert!(outcome.is_ok());
    assert_eq!(selection.origin, NameOrigin::Argument);
    assert_eq!(session.get(&["name"]), Some(&json!("staging")));
    assert_eq!(session.get(&["port"]), Some(&json!(8080)));
}

#[test]
fn test_precedence_law() {
    let temp = create_config_dir(&[(
        "local.json",
        r#"{"port": 80, "host": "file-host", "name": "file-name", "db": {"pool": 5}}"#,
    )]);
    let process = StaticProcess::new("server")
        .with_arg("--port=9000")
        .with_var("host", "env-host")
        .with_var("port", "7000");
    let (mut session, _) = create_session(temp.path(), process);
    session.load_config("local").unwrap();

    // argv beats env beats file
    assert_eq!(session.get(&["port"]), Some(&json!(9000)));
    assert_eq!(session.get(&["host"]), Some(&json!("env-host")));
    // untouched keys come from the file
    assert_eq!(session.get(&["name"]), Some(&json!("file-name")));
    assert_eq!(session.get(&["db", "pool"]), Some(&json!(5)));
}

#[test]
fn test_volatile_sources_reloaded_after_each_file() {
    let temp = create_config_dir(&[
        ("a.json", r#"{"port": 1}"#),
        ("b.json", r#"{"port": 2}"#),
    ]);
    let process = StaticProcess::new("server").with_arg("--port=3");
    let (mut session, _) = create_session(temp.path(), process);

    session.load_config("a").unwrap();
    session.load_config("b").unwrap();

    assert_eq!(session.get(&["port"]), Some(&json!(3)));
    assert_eq!(
        session.store().source_names(),
        vec!["argv", "env", "b", "a"]
    );
}

#[test]
fn test_env_changes_picked_up_by_next_file_load() {
    let temp = create_config_dir(&[
        ("a.json", r#"{"port": 1}"#),
        ("b.json", r#"{"name": "b"}"#),
    ]);
    let process = MutableProcess::default();
    process.set_var("port", "7000");
    let (mut session, _) = create_session(temp.path(), process.clone());

    session.load_config("a").unwrap();
    assert_eq!(session.get(&["port"]), Some(&json!("7000")));

    process.set_var("port", "8000");
    // Nothing re-reads the environment until the next load.
    assert_eq!(session.get(&["port"]), Some(&json!("7000")));

    session.load_config("b").unwrap();
    assert_eq!(session.get(&["port"]), Some(&json!("8000")));
    assert_eq!(session.provenance("port"), Some("env"));
}

#[test]
fn test_invalid_directory_hides_env_and_argv() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let other = create_config_dir(&[("extra.json", r#"{"extra": true}"#)]);
    let process = StaticProcess::new("server")
        .with_arg("--port=9000")
        .with_var("HOST", "env-host");
    let (mut session, _) = create_session(temp.path(), process);

    assert!(!session.is_ready());
    assert_eq!(session.get(&["port"]), None);
    assert_eq!(session.get(&["HOST"]), None);

    let err = session
        .load_config_with_path("extra", other.path().join("extra.json"))
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidDirectory);
    assert_eq!(session.get(&["extra"]), None);

    let (selection, outcome) = session.load_environment_config("local");
    assert_eq!(selection.name, "local");
    assert!(matches!(outcome, Err(ConfigError::InvalidDirectory { .. })));
    assert_eq!(session.get(&["port"]), None);
}

#[test]
fn test_nested_lookup_stays_in_winning_source() {
    let temp = create_config_dir(&[(
        "local.json",
        r#"{"serverSettings": {"port": 3000, "host": "localhost"}}"#,
    )]);
    let process = StaticProcess::new("server").with_arg("--serverSettings.port=4000");
    let (mut session, _) = create_session(temp.path(), process);
    session.load_config("local").unwrap();

    // argv owns `serverSettings`, so segment-wise traversal only sees argv's subtree.
    assert_eq!(session.get(&["serverSettings", "port"]), Some(&json!(4000)));
    assert_eq!(session.get(&["serverSettings", "host"]), None);
    // A single canonical key falls through to the file.
    assert_eq!(session.get(&["serverSettings:host"]), Some(&json!("localhost")));
}

#[test]
fn test_env_nesting_separator() {
    let temp = create_config_dir(&[("local.json", r#"{"DB": {"HOST": "file"}}"#)]);
    let process = StaticProcess::new("server").with_var("DB__HOST", "env");
    let (mut session, _) = create_session(temp.path(), process);
    session.load_config("local").unwrap();

    assert_eq!(session.get(&["DB", "HOST"]), Some(&json!("env")));
    assert_eq!(session.get(&["DB__HOST"]), Some(&json!("env")));
}

#[test]
fn test_delimiter_changes_lookup() {
    let temp = create_config_dir(&[("local.json", r#"{"serverSettings": {"port": 3000}}"#)]);
    let (mut session, _) = create_session(temp.path(), StaticProcess::new("server"));
    session.load_config("local").unwrap();

    assert_eq!(session.get(&["serverSettings.port"]), None);
    session.set_delimiter(".").unwrap();
    assert_eq!(session.get(&["serverSettings.port"]), Some(&json!(3000)));

    assert!(session.set_delimiter("").is_err());
    assert_eq!(session.delimiter(), ".");
    assert_eq!(session.get(&["serverSettings.port"]), Some(&json!(3000)));
}

#[test]
fn test_resolve_key_examples() {
    assert_eq!(resolve_key("serverSettings.port", "."), "serverSettings:port");
    assert_eq!(resolve_key("serverSettings:port", ":"), "serverSettings:port");
}

#[test]
fn test_lookups_do_not_mutate() {
    let temp = create_config_dir(&[("local.json", r#"{"a": {"b": 1}}"#)]);
    let (mut session, _) = create_session(temp.path(), StaticProcess::new("server"));
    session.load_config("local").unwrap();

    let before = session.store().merged();
    let _ = session.get(&["a", "b", "c"]);
    let _ = session.get(&["missing", "x"]);
    let _ = session.get_as::<String, _>(&["a"]);
    assert_eq!(session.store().merged(), before);
}

#[test]
fn test_invalid_json_is_reported_not_loaded() {
    let temp = create_config_dir(&[("local.json", "{ broken")]);
    let (mut session, logger) = create_session(temp.path(), StaticProcess::new("server"));

    let err = session.load_config("local").unwrap_err();

    assert_eq!(err.code(), ErrorCode::InvalidConfigFile);
    assert!(session.store().source("local").is_none());
    assert_eq!(logger.messages(LogLevel::Error).len(), 1);
}

#[test]
fn test_set_environment_name_records_without_loading() {
    let temp = create_config_dir(&[("qa.json", r#"{"name": "qa"}"#)]);
    let process = StaticProcess::new("server").with_var("NODE_ENV", "qa");
    let (mut session, _) = create_session(temp.path(), process);

    let selection = session.set_environment_name("local");

    assert_eq!(selection.name, "qa");
    assert_eq!(session.get_environment_name(), Some("qa"));
    assert_eq!(session.get(&["environmentName"]), Some(&json!("qa")));
    assert_eq!(session.get(&["name"]), None);
}
