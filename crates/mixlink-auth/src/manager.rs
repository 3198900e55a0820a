//! Wiring of the pairing and session components

use crate::cleanup::{CleanupHandle, CleanupScheduler};
use crate::error::AuthResult;
use crate::guard::{SessionContext, SessionGuard};
use crate::pairing::{
    ClientInfo, PairingAnnouncement, PairingCompleteRequest, PairingRegistry, PairingTicket,
};
use crate::rate_limit::RateLimiter;
use crate::session::{Session, SessionStore};
use crate::storage::SessionFile;
use mixlink_core::AuthConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tracing::info;

/// Manages device pairing and authentication
///
/// Owns every piece of pairing and session state and the background sweep.
/// Construct once at startup with [`AuthManager::open`].
pub struct AuthManager {
    registry: Arc<PairingRegistry>,
    sessions: Arc<SessionStore>,
    guard: SessionGuard,
    cleanup: Mutex<Option<CleanupHandle>>,
}

impl AuthManager {
    /// Load sessions from `file` and start the cleanup sweep
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn open(config: &AuthConfig, file: SessionFile) -> Self {
        let sessions = Arc::new(SessionStore::open(config, file).await);
        let limiter = Arc::new(RateLimiter::new(
            config.pairing_max_attempts_per_window,
            config.pairing_rate_limit_window_seconds,
        ));
        let registry = Arc::new(PairingRegistry::new(config, limiter.clone(), sessions.clone()));
        let guard = SessionGuard::new(config, sessions.clone());

        let cleanup = CleanupScheduler::new(registry.clone(), sessions.clone(), limiter)
            .spawn(Duration::from_secs(config.cleanup_interval_seconds));

        info!(
            sessions = sessions.count().await,
            max = config.session_max_count,
            "Authentication ready"
        );

        Self {
            registry,
            sessions,
            guard,
            cleanup: Mutex::new(Some(cleanup)),
        }
    }

    /// Start a new pairing
    pub async fn initiate(
        &self,
        device_name: Option<String>,
        origin_address: Option<String>,
    ) -> AuthResult<PairingTicket> {
        self.registry.initiate(device_name, origin_address).await
    }

    /// Complete a pairing and issue a session
    pub async fn complete(
        &self,
        request: PairingCompleteRequest,
        client: ClientInfo,
    ) -> AuthResult<Session> {
        self.registry.complete(request, client).await
    }

    /// Receive every newly issued pairing code
    pub fn subscribe(&self) -> broadcast::Receiver<PairingAnnouncement> {
        self.registry.subscribe()
    }

    /// Validate a session token
    pub async fn validate(&self, token: &str) -> Option<Session> {
        self.sessions.validate(token).await
    }

    /// Require a valid session for a request
    pub async fn authorize(
        &self,
        authorization: Option<&str>,
        client: &ClientInfo,
    ) -> AuthResult<SessionContext> {
        self.guard.authorize(authorization, client).await
    }

    /// Attach a session if the request carries a valid one
    pub async fn authorize_optional(
        &self,
        authorization: Option<&str>,
        client: &ClientInfo,
    ) -> Option<SessionContext> {
        self.guard.authorize_optional(authorization, client).await
    }

    /// List all live sessions
    pub async fn list(&self) -> Vec<Session> {
        self.sessions.list().await
    }

    /// Get a session by id
    pub async fn get(&self, id: &str) -> Option<Session> {
        self.sessions.get(id).await
    }

    /// Revoke a session by id
    pub async fn revoke(&self, id: &str) -> AuthResult<bool> {
        self.sessions.revoke(id).await
    }

    /// Revoke every session
    pub async fn revoke_all(&self) -> AuthResult<usize> {
        self.sessions.revoke_all().await
    }

    /// Number of pairing codes awaiting completion
    pub async fn pending_pairings(&self) -> usize {
        self.registry.pending_count().await
    }

    /// Stop the cleanup sweep
    pub async fn shutdown(&self) {
        if let Some(handle) = self.cleanup.lock().await.take() {
            handle.shutdown().await;
        }
    }
}
