//! Shared runtime context built after config resolution and database open.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use paper_harvest::fetch::Fetcher;
use paper_harvest::store::PaperStore;

use crate::app::config_manager::Settings;

/// Holds shared state built during startup so command handlers can use
/// `ctx.store`, `ctx.fetcher`, etc., instead of passing many arguments.
pub(crate) struct RunContext {
    pub(crate) settings: Settings,
    pub(crate) store: PaperStore,
    pub(crate) fetcher: Fetcher,
    /// Set once by the Ctrl-C handler.
    pub(crate) interrupted: Arc<AtomicBool>,
    pub(crate) use_spinner: bool,
}

impl RunContext {
    pub(crate) fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::SeqCst)
    }
}
