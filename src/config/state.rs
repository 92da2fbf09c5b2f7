// Application state module
// Shared, read-only state handed to every connection

use std::sync::Arc;

use super::types::Config;
use crate::logger::PayloadLog;

/// Application state
pub struct AppState {
    pub config: Config,
    /// Receives every payload accepted by the POST handler
    pub payload_log: Arc<dyn PayloadLog>,
}

impl AppState {
    pub fn new(config: Config, payload_log: Arc<dyn PayloadLog>) -> Self {
        Self {
            config,
            payload_log,
        }
    }
}
