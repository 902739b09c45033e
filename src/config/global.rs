//! Process-wide session handle.
//!
//! Applications that prefer a composition root should build a
//! [`ConfigSession`] directly. This module is for code that expects one
//! shared session: the first [`init`] wins, later calls get the same
//! instance back, and [`reset`] tears it down (mainly for tests).

use super::session::{ConfigSession, SessionOptions};
use crate::logging::ConfigLogger;
use arc_swap::ArcSwapOption;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Shared, serialized access to a session.
pub type SharedSession = Arc<Mutex<ConfigSession>>;

static GLOBAL: ArcSwapOption<Mutex<ConfigSession>> = ArcSwapOption::const_empty();

/// Serializes initialization so only one session is ever built per cycle.
static INIT_LOCK: Mutex<()> = Mutex::new(());

/// Get or create the process-wide session.
///
/// The directory and logger of the first call are kept; later arguments are
/// ignored.
pub fn init(
    config_dir: impl Into<PathBuf>,
    logger: Option<Arc<dyn ConfigLogger>>,
) -> SharedSession {
    init_with_options(config_dir, logger, SessionOptions::default())
}

/// Like [`init`], with explicit options for the first construction.
pub fn init_with_options(
    config_dir: impl Into<PathBuf>,
    logger: Option<Arc<dyn ConfigLogger>>,
    options: SessionOptions,
) -> SharedSession {
    let _guard = INIT_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    if let Some(existing) = GLOBAL.load_full() {
        debug!("Config session already initialized, reusing it");
        return existing;
    }

    let session = Arc::new(Mutex::new(ConfigSession::with_options(config_dir, logger, options)));
    GLOBAL.store(Some(Arc::clone(&session)));
    session
}

/// The process-wide session, if one was initialized.
pub fn get() -> Option<SharedSession> {
    GLOBAL.load_full()
}

/// Drop the process-wide session so the next [`init`] builds a new one.
///
/// Handles obtained earlier stay valid.
pub fn reset() {
    let _guard = INIT_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    GLOBAL.store(None);
}
