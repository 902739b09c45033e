//! CLI command definitions for confstack
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for printed values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON (default)
    #[default]
    Json,
    /// YAML
    Yaml,
}

/// Layered configuration inspector
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration directory holding `<name>.json` files
    #[arg(short, long, default_value = "config", global = true)]
    pub dir: PathBuf,

    /// Environment name used when none is selected by env var or argument
    #[arg(short, long, default_value = "local", global = true)]
    pub env_default: String,

    /// Environment variable that selects the environment name
    #[arg(long, default_value = "NODE_ENV", global = true)]
    pub env_var: String,

    /// Key delimiter used in queried keys
    #[arg(long, default_value = ".", global = true)]
    pub delimiter: String,

    /// Extra config files to load before the environment file, as NAME=PATH
    #[arg(short, long = "file", value_parser = parse_named_file, global = true)]
    pub files: Vec<(String, PathBuf)>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the value at a key path
    Get(GetArgs),

    /// Print the resolved environment name
    Env(PassthroughArgs),

    /// Print the merged settings
    Dump(DumpArgs),

    /// List sources in lookup order
    Sources(PassthroughArgs),
}

/// Arguments after `--` become the argv source of the session.
#[derive(Args, Debug, Default)]
pub struct PassthroughArgs {
    /// Arguments handed to the config session as its command line
    #[arg(last = true)]
    pub args: Vec<String>,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Key segments; each may contain the delimiter
    #[arg(required = true)]
    pub keys: Vec<String>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    #[command(flatten)]
    pub passthrough: PassthroughArgs,
}

#[derive(Args, Debug)]
pub struct DumpArgs {
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    #[command(flatten)]
    pub passthrough: PassthroughArgs,
}

impl Command {
    /// Arguments to expose as the session's command line.
    pub fn passthrough(&self) -> &[String] {
        match self {
            Command::Get(args) => &args.passthrough.args,
            Command::Dump(args) => &args.passthrough.args,
            Command::Env(args) | Command::Sources(args) => &args.args,
        }
    }
}

fn parse_named_file(raw: &str) -> Result<(String, PathBuf), String> {
    match raw.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected NAME=PATH, got '{}'", raw)),
    }
}
