//! Layered configuration.
//!
//! Settings come from four kinds of sources, highest priority first:
//! 1. **argv** - process arguments (`--server.port=80`)
//! 2. **env** - process environment variables (`SERVER__PORT=80`)
//! 3. **files** - JSON files, most recently loaded first
//! 4. **overrides** - values set programmatically (the environment name)
//!
//! ## Lookup
//! Lookup is whole-key, first-match-wins: values are never merged across
//! sources. argv and env are re-read after every file load so they keep
//! outranking files.
//!
//! ## Environment selection
//! The environment name comes from `NODE_ENV` (configurable), then the last
//! positional argument, then a caller default. It selects
//! `{config_dir}/{name}.json` and is recorded under `environmentName`.

pub mod global;
mod keypath;
mod process;
mod session;
mod store;

pub use keypath::{SEPARATOR, resolve_key, traverse};
pub use process::{
    DEFAULT_ENV_SEPARATOR, POSITIONAL_KEY, ProcessSource, StaticProcess, SystemProcess,
    last_positional, parse_args, parse_env,
};
pub use session::{
    ConfigSession, DEFAULT_DELIMITER, DEFAULT_ENV_VAR, ENVIRONMENT_NAME_KEY, EnvironmentSelection,
    NameOrigin, SessionOptions,
};
pub use store::{ARGV_SOURCE, ENV_SOURCE, OVERRIDE_SOURCE, Source, SourceStore, SourceTier};
