//! Shared application state

use mixlink_auth::AuthManager;
use mixlink_core::Config;
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    /// Configuration
    pub config: Config,
    /// Pairing and session authentication
    pub auth: Arc<AuthManager>,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: Config, auth: Arc<AuthManager>) -> Self {
        Self { config, auth }
    }
}
