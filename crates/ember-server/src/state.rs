//! Shared application state, constructed once in [`crate::bootstrap`] and
//! threaded through every handler — never held as a global.

use crate::config::Settings;
use ember_blob::{BlobRepository, PathManager};
use ember_core::uptime::UptimeTracker;
use ember_index::{IndexClient, Throttle};
use ember_words::Wordlist;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub index: IndexClient,
    pub blob: BlobRepository,
    pub paths: PathManager,
    pub wordlist: Arc<Wordlist>,
    pub throttle: Throttle,
    pub uptime: UptimeTracker,
    pub settings: Arc<Settings>,
}
