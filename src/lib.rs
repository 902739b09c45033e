//! confstack library
//!
//! Layered configuration loading: environment selection, JSON files,
//! argv/env overrides and delimited key lookup.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
