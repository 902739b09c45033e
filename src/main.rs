//! confstack
//!
//! Resolves the environment name, loads the matching config file plus any
//! extra files, applies argv/env overrides and prints what was asked for.

use anyhow::Result;
use clap::Parser;
use confstack::cli::{Cli, Command, OutputFormat};
use confstack::config::{
    ConfigSession, ProcessSource, SessionOptions, StaticProcess, SystemProcess,
};
use serde_json::Value;
use std::fs::OpenOptions;
use std::process::ExitCode;
use tracing::{Level, debug};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging based on --log option
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    match cli.log.as_str() {
        "0" | "off" => {
            // No logging
        }
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    // Only the arguments after `--` act as the session's command line; the
    // environment is the real one.
    let args = cli.command.passthrough().iter().cloned();
    let process = SystemProcess.vars().into_iter().fold(
        StaticProcess::new(env!("CARGO_PKG_NAME")).with_args(args),
        |process, (key, value)| process.with_var(key, value),
    );
    let options = SessionOptions::default()
        .with_delimiter(cli.delimiter.clone())
        .with_env_var(cli.env_var.clone())
        .with_process(process);

    let mut session = ConfigSession::with_options(cli.dir.clone(), None, options);

    // Failures are already logged and recorded by the session.
    for (name, path) in &cli.files {
        let _ = session.load_config_with_path(name, path);
    }
    let (selection, _) = session.load_environment_config(&cli.env_default);
    debug!(
        environment = %selection.name,
        origin = %selection.origin,
        sources = ?session.store().source_names(),
        "Config session ready"
    );

    match &cli.command {
        Command::Get(args) => match session.get(args.keys.as_slice()) {
            Some(value) => print_value(value, args.format)?,
            None => return Ok(ExitCode::FAILURE),
        },
        Command::Env(_) => println!("{}", selection.name),
        Command::Dump(args) => print_value(&session.store().merged(), args.format)?,
        Command::Sources(_) => {
            for source in session.store().sources() {
                let path = source
                    .path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                println!("{}\t{}\t{}", source.name, source.tier, path);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn print_value(value: &Value, format: OutputFormat) -> Result<()> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(value)?,
        OutputFormat::Yaml => serde_yaml::to_string(value)?,
    };
    println!("{}", rendered.trim_end());
    Ok(())
}
