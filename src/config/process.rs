//! Process arguments and environment variables as settings trees.
//!
//! These are the "volatile" sources: they are re-read after every file load
//! so they always override file values. Access goes through
//! [`ProcessSource`] so tests never have to touch the real environment.

use super::keypath;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Key under which positional arguments are stored in the argv tree.
pub const POSITIONAL_KEY: &str = "_";

/// Default separator that nests environment variable names.
pub const DEFAULT_ENV_SEPARATOR: &str = "__";

/// Abstraction over the process arguments and environment.
pub trait ProcessSource: Send + Sync {
    /// Command-line arguments, program name first.
    fn args(&self) -> Vec<String>;

    /// All environment variables.
    fn vars(&self) -> Vec<(String, String)>;

    /// Look up one environment variable.
    fn var(&self, name: &str) -> Option<String> {
        self.vars()
            .into_iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

/// The real process.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcess;

impl ProcessSource for SystemProcess {
    fn args(&self) -> Vec<String> {
        std::env::args_os()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    fn vars(&self) -> Vec<(String, String)> {
        // Variables that are not valid unicode are skipped rather than mangled.
        std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .collect()
    }

    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Fixed arguments and variables.
#[derive(Debug, Clone)]
pub struct StaticProcess {
    args: Vec<String>,
    vars: BTreeMap<String, String>,
}

impl StaticProcess {
    /// Create a process with only a program name and an empty environment.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            args: vec![program.into()],
            vars: BTreeMap::new(),
        }
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }
}

impl Default for StaticProcess {
    fn default() -> Self {
        Self::new("app")
    }
}

impl ProcessSource for StaticProcess {
    fn args(&self) -> Vec<String> {
        self.args.clone()
    }

    fn vars(&self) -> Vec<(String, String)> {
        self.vars
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

/// Parse command-line arguments (program name excluded) into a settings tree.
///
/// - `--key=value` and `--key value` set `key`
/// - `--flag` with no value sets `true`, `--no-flag` sets `false`
/// - `-abc` sets `a`, `b` and `c` to `true`; `-p value` sets `p`
/// - `--` ends flag parsing
/// - dotted keys (`--server.port=80`) nest
///
/// Positional arguments are collected in order under [`POSITIONAL_KEY`].
pub fn parse_args(args: &[String]) -> Value {
    let mut tree = Map::new();
    let mut positional = Vec::new();
    let mut iter = args.iter().peekable();
    let mut flags_done = false;

    while let Some(arg) = iter.next() {
        if flags_done {
            positional.push(Value::String(arg.clone()));
            continue;
        }
        if arg == "--" {
            flags_done = true;
            continue;
        }

        if let Some(body) = arg.strip_prefix("--") {
            if let Some((key, raw)) = body.split_once('=') {
                set_flag(&mut tree, key, coerce(raw));
            } else if let Some(key) = body.strip_prefix("no-") {
                set_flag(&mut tree, key, Value::Bool(false));
            } else if let Some(next) = iter.next_if(|next| is_value(next)) {
                set_flag(&mut tree, body, coerce(next));
            } else {
                set_flag(&mut tree, body, Value::Bool(true));
            }
        } else if arg.len() > 1 && arg.starts_with('-') && !looks_numeric(arg) {
            let letters: Vec<char> = arg[1..].chars().collect();
            if letters.len() == 1 {
                let key = letters[0].to_string();
                match iter.next_if(|next| is_value(next)) {
                    Some(next) => set_flag(&mut tree, &key, coerce(next)),
                    None => set_flag(&mut tree, &key, Value::Bool(true)),
                }
            } else {
                for letter in letters {
                    set_flag(&mut tree, &letter.to_string(), Value::Bool(true));
                }
            }
        } else {
            positional.push(Value::String(arg.clone()));
        }
    }

    tree.insert(POSITIONAL_KEY.to_string(), Value::Array(positional));
    Value::Object(tree)
}

/// Positional arguments of a full argv (program name first), flags removed.
pub fn positionals(args: &[String]) -> Vec<String> {
    let Some(rest) = args.get(1..) else {
        return Vec::new();
    };
    match parse_args(rest).get(POSITIONAL_KEY) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// The last positional argument, counting the program name as the first.
///
/// Only returns a value when more than one positional exists, i.e. when at
/// least one was passed after the program name.
pub fn last_positional(args: &[String]) -> Option<String> {
    let count = usize::from(!args.is_empty()) + positionals(args).len();
    if count > 1 {
        positionals(args).pop()
    } else {
        None
    }
}

/// Turn environment variables into a settings tree.
///
/// Every variable is available under its own name as a string. Names that
/// contain `separator` are additionally nested (`SERVER__PORT` becomes
/// `SERVER:PORT`); an exact flat name wins over a nested mapping of the
/// same name.
pub fn parse_env(vars: &[(String, String)], separator: &str) -> Value {
    let sorted: BTreeMap<&str, &str> = vars.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    let mut tree = Map::new();

    if !separator.is_empty() {
        for (name, value) in &sorted {
            if !name.contains(separator) {
                continue;
            }
            let parts: Vec<&str> = name.split(separator).collect();
            if parts.iter().any(|part| part.is_empty()) {
                continue;
            }
            let canonical = parts.join(keypath::SEPARATOR);
            keypath::insert(&mut tree, &canonical, Value::String(value.to_string()));
        }
    }

    for (name, value) in sorted {
        if name.is_empty() {
            continue;
        }
        tree.insert(name.to_string(), Value::String(value.to_string()));
    }

    Value::Object(tree)
}

fn set_flag(tree: &mut Map<String, Value>, key: &str, value: Value) {
    if key.is_empty() {
        return;
    }
    let canonical = keypath::resolve_key(key, ".");
    keypath::insert(tree, &canonical, value);
}

fn is_value(arg: &str) -> bool {
    !arg.starts_with('-') || looks_numeric(arg)
}

fn looks_numeric(arg: &str) -> bool {
    arg.parse::<f64>().is_ok_and(f64::is_finite)
}

/// Convert an argument string to a bool or number when it clearly is one.
fn coerce(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }

    let digits = raw.strip_prefix('-').unwrap_or(raw);
    let leading_zero = digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.");
    if leading_zero {
        return Value::String(raw.to_string());
    }

    if let Ok(int) = raw.parse::<i64>() {
        return Value::Number(int.into());
    }
    if raw.contains('.')
        && let Ok(float) = raw.parse::<f64>()
        && let Some(number) = Number::from_f64(float)
    {
        return Value::Number(number);
    }
    Value::String(raw.to_string())
}
