//! Configuration types for MixLink

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Pairing and session policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthConfig {
    /// Number of characters in a pairing code
    pub pairing_code_length: usize,
    /// Seconds a pairing code stays valid
    pub pairing_code_expiry_seconds: u64,
    /// Pairing attempts allowed per origin address in one window
    pub pairing_max_attempts_per_window: u32,
    /// Length of a rate-limit window in seconds
    pub pairing_rate_limit_window_seconds: u64,
    /// Random bytes behind each session token
    pub session_token_byte_length: usize,
    /// Session lifetime in seconds
    pub session_expiry_seconds: u64,
    /// Maximum number of live sessions
    pub session_max_count: usize,
    /// Extend a session's expiry every time it is used
    pub session_sliding_expiry: bool,
    /// Reject a token presented from a different address than it was issued to
    pub session_origin_binding: bool,
    /// Reject a token presented with a different user agent than it was issued to
    pub session_user_agent_binding: bool,
    /// Period of the background expiry sweep in seconds
    pub cleanup_interval_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            pairing_code_length: 6,
            pairing_code_expiry_seconds: 300,
            pairing_max_attempts_per_window: 3,
            pairing_rate_limit_window_seconds: 60,
            session_token_byte_length: 32,
            session_expiry_seconds: 30 * 24 * 60 * 60,
            session_max_count: 10,
            session_sliding_expiry: false,
            session_origin_binding: false,
            session_user_agent_binding: false,
            cleanup_interval_seconds: 60,
        }
    }
}

impl AuthConfig {
    /// Check that every value is usable
    pub fn validate(&self) -> Result<()> {
        if self.pairing_code_length < 4 {
            return Err(Error::config("pairingCodeLength must be at least 4"));
        }
        if self.pairing_code_expiry_seconds == 0 {
            return Err(Error::config("pairingCodeExpirySeconds must be positive"));
        }
        if self.pairing_max_attempts_per_window == 0 {
            return Err(Error::config("pairingMaxAttemptsPerWindow must be positive"));
        }
        if self.pairing_rate_limit_window_seconds == 0 {
            return Err(Error::config(
                "pairingRateLimitWindowSeconds must be positive",
            ));
        }
        if self.session_token_byte_length < 16 {
            return Err(Error::config("sessionTokenByteLength must be at least 16"));
        }
        if self.session_expiry_seconds == 0 {
            return Err(Error::config("sessionExpirySeconds must be positive"));
        }
        if self.session_max_count == 0 {
            return Err(Error::config("sessionMaxCount must be positive"));
        }
        if self.cleanup_interval_seconds == 0 {
            return Err(Error::config("cleanupIntervalSeconds must be positive"));
        }
        Ok(())
    }

    /// Builder pattern: set the maximum number of live sessions
    pub fn with_session_max_count(mut self, max: usize) -> Self {
        self.session_max_count = max;
        self
    }

    /// Builder pattern: enable or disable sliding expiry
    pub fn with_sliding_expiry(mut self, enabled: bool) -> Self {
        self.session_sliding_expiry = enabled;
        self
    }

    /// Builder pattern: enable or disable origin address binding
    pub fn with_origin_binding(mut self, enabled: bool) -> Self {
        self.session_origin_binding = enabled;
        self
    }

    /// Builder pattern: enable or disable user agent binding
    pub fn with_user_agent_binding(mut self, enabled: bool) -> Self {
        self.session_user_agent_binding = enabled;
        self
    }
}

/// Main configuration for MixLink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Session storage file (platform config dir if None)
    pub sessions_file: Option<PathBuf>,
    /// Pairing and session policy
    pub auth: AuthConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8470,
            sessions_file: None,
            auth: AuthConfig::default(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a JSON file
    ///
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.auth.validate()?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Builder pattern: set port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder pattern: set the session storage file
    pub fn with_sessions_file(mut self, path: PathBuf) -> Self {
        self.sessions_file = Some(path);
        self
    }

    /// Builder pattern: replace the auth policy
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }
}
