//! Session records and the session store
//!
//! A session is what a completed pairing turns into: a long-lived bearer
//! token plus bookkeeping. The store keeps sessions in memory, indexed by
//! id and by token fingerprint, and writes the full set back to the
//! [`SessionFile`] after every mutation.

use crate::codegen::{generate_id, generate_token, short_fingerprint, token_fingerprint};
use crate::error::{AuthError, AuthResult};
use crate::storage::{SessionFile, StorageResult};
use chrono::{DateTime, Duration, Utc};
use mixlink_core::AuthConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

/// An authenticated device session
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session identifier used for administration
    pub id: String,
    /// Bearer token (secret)
    pub token: String,
    /// Human-readable device name
    pub device_name: String,
    /// When the session was created
    pub created_at: DateTime<Utc>,
    /// Last successful validation
    pub last_used_at: DateTime<Utc>,
    /// When the session stops being valid
    pub expires_at: DateTime<Utc>,
    /// Address the session was created from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin_address: Option<String>,
    /// User agent the session was created with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Session {
    /// Whether the session has passed its expiry at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// Record a successful use, optionally sliding the expiry forward
    fn touch(&mut self, now: DateTime<Utc>, slide: Option<Duration>) {
        if now > self.last_used_at {
            self.last_used_at = now;
        }
        if let Some(lifetime) = slide {
            let expires_at = now + lifetime;
            if expires_at > self.expires_at {
                self.expires_at = expires_at;
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("token", &"<redacted>")
            .field("device_name", &self.device_name)
            .field("created_at", &self.created_at)
            .field("last_used_at", &self.last_used_at)
            .field("expires_at", &self.expires_at)
            .field("origin_address", &self.origin_address)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Summary information about a session for API responses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub device_name: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_address: Option<String>,
}

impl From<&Session> for SessionInfo {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            device_name: session.device_name.clone(),
            created_at: session.created_at,
            last_used_at: session.last_used_at,
            expires_at: session.expires_at,
            origin_address: session.origin_address.clone(),
        }
    }
}

/// Fields a new session is created from
#[derive(Debug, Clone, Default)]
pub struct NewSession {
    pub device_name: String,
    pub origin_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Sessions indexed by id and by token fingerprint
#[derive(Default)]
struct SessionMap {
    sessions: HashMap<String, Session>,
    /// token fingerprint -> session id
    by_token: HashMap<String, String>,
}

impl SessionMap {
    fn from_sessions(loaded: Vec<Session>) -> Self {
        let mut map = Self::default();
        for session in loaded {
            map.insert(session);
        }
        map
    }

    fn insert(&mut self, session: Session) {
        self.by_token
            .insert(token_fingerprint(&session.token), session.id.clone());
        self.sessions.insert(session.id.clone(), session);
    }

    fn remove(&mut self, id: &str) -> Option<Session> {
        let session = self.sessions.remove(id)?;
        self.by_token.remove(&token_fingerprint(&session.token));
        Some(session)
    }

    fn id_for_token(&self, fingerprint: &str) -> Option<String> {
        self.by_token.get(fingerprint).cloned()
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let expired: Vec<String> = self
            .sessions
            .values()
            .filter(|s| s.is_expired(now))
            .map(|s| s.id.clone())
            .collect();
        for id in &expired {
            self.remove(id);
        }
        expired.len()
    }

    fn clear(&mut self) -> usize {
        let count = self.sessions.len();
        self.sessions.clear();
        self.by_token.clear();
        count
    }

    fn sorted(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = self.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        sessions
    }
}

/// Session lifetime policy taken from [`AuthConfig`]
#[derive(Debug, Clone)]
struct SessionPolicy {
    token_bytes: usize,
    lifetime: Duration,
    max_count: usize,
    sliding: bool,
}

/// Active sessions with write-through file persistence
pub struct SessionStore {
    policy: SessionPolicy,
    state: RwLock<SessionMap>,
    file: SessionFile,
    /// Serializes file writes; held while snapshotting so the newest state wins
    persist_lock: Mutex<()>,
}

impl SessionStore {
    /// Create a store backed by `file`, loading any sessions it holds
    pub async fn open(config: &AuthConfig, file: SessionFile) -> Self {
        let loaded = file.load().await;
        Self {
            policy: SessionPolicy {
                token_bytes: config.session_token_byte_length,
                lifetime: Duration::seconds(config.session_expiry_seconds as i64),
                max_count: config.session_max_count,
                sliding: config.session_sliding_expiry,
            },
            state: RwLock::new(SessionMap::from_sessions(loaded)),
            file,
            persist_lock: Mutex::new(()),
        }
    }

    /// Build a session record with a fresh id and token
    pub(crate) fn build(&self, new: NewSession, now: DateTime<Utc>) -> Session {
        Session {
            id: generate_id(),
            token: generate_token(self.policy.token_bytes),
            device_name: new.device_name,
            created_at: now,
            last_used_at: now,
            expires_at: now + self.policy.lifetime,
            origin_address: new.origin_address,
            user_agent: new.user_agent,
        }
    }

    /// Insert a session in memory, enforcing the session cap
    ///
    /// Sessions already past their expiry do not count against the cap and
    /// are dropped here. The caller persists afterwards.
    pub(crate) async fn admit(&self, session: Session, now: DateTime<Utc>) -> AuthResult<()> {
        let mut state = self.state.write().await;
        state.purge_expired(now);
        if state.sessions.len() >= self.policy.max_count {
            warn!(
                max = self.policy.max_count,
                "Session limit reached, rejecting new session"
            );
            return Err(AuthError::SessionLimitReached);
        }
        state.insert(session);
        Ok(())
    }

    /// Create and persist a new session
    pub async fn create(&self, new: NewSession) -> AuthResult<Session> {
        self.create_at(new, Utc::now()).await
    }

    pub(crate) async fn create_at(&self, new: NewSession, now: DateTime<Utc>) -> AuthResult<Session> {
        let session = self.build(new, now);
        self.admit(session.clone(), now).await?;
        // Memory stays authoritative; the next successful write catches up
        if let Err(e) = self.persist().await {
            error!(session = %session.id, "Failed to persist new session: {}", e);
            return Err(e.into());
        }
        info!(session = %session.id, device = %session.device_name, "Session created");
        Ok(session)
    }

    /// Validate a token, returning the session if it is live
    ///
    /// Every hit updates `last_used_at` (and slides the expiry when enabled)
    /// and is written to disk before returning.
    pub async fn validate(&self, token: &str) -> Option<Session> {
        self.lookup(token).await.ok()
    }

    /// Like [`SessionStore::validate`], but tells an expired session apart
    /// from an unknown token
    pub async fn lookup(&self, token: &str) -> AuthResult<Session> {
        self.lookup_at(token, Utc::now()).await
    }

    pub(crate) async fn lookup_at(&self, token: &str, now: DateTime<Utc>) -> AuthResult<Session> {
        let fingerprint = token_fingerprint(token);

        let outcome = {
            let mut state = self.state.write().await;
            let id = state
                .id_for_token(&fingerprint)
                .ok_or(AuthError::SessionInvalid)?;

            let expired = state
                .sessions
                .get(&id)
                .map(|s| s.is_expired(now))
                .ok_or(AuthError::SessionInvalid)?;

            if expired {
                state.remove(&id);
                Err(AuthError::SessionExpired)
            } else {
                let slide = self.policy.sliding.then_some(self.policy.lifetime);
                let session = state
                    .sessions
                    .get_mut(&id)
                    .ok_or(AuthError::SessionInvalid)?;
                session.touch(now, slide);
                Ok(session.clone())
            }
        };

        if let Err(e) = self.persist().await {
            warn!("Failed to persist session state after validation: {}", e);
        }

        if let Err(AuthError::SessionExpired) = &outcome {
            debug!(
                token = short_fingerprint(&fingerprint),
                "Expired session removed on use"
            );
        }
        outcome
    }

    /// All live sessions, oldest first
    pub async fn list(&self) -> Vec<Session> {
        self.list_at(Utc::now()).await
    }

    pub(crate) async fn list_at(&self, now: DateTime<Utc>) -> Vec<Session> {
        self.purge_expired(now).await;
        self.state.read().await.sorted()
    }

    /// Get a live session by id
    pub async fn get(&self, id: &str) -> Option<Session> {
        self.get_at(id, Utc::now()).await
    }

    pub(crate) async fn get_at(&self, id: &str, now: DateTime<Utc>) -> Option<Session> {
        self.state
            .read()
            .await
            .sessions
            .get(id)
            .filter(|s| !s.is_expired(now))
            .cloned()
    }

    /// Revoke a session by id, returning whether one was removed
    pub async fn revoke(&self, id: &str) -> AuthResult<bool> {
        let removed = self.state.write().await.remove(id).is_some();
        if removed {
            self.persist().await?;
            info!(session = %id, "Session revoked");
        }
        Ok(removed)
    }

    /// Revoke every session, returning how many there were
    pub async fn revoke_all(&self) -> AuthResult<usize> {
        let count = self.state.write().await.clear();
        self.persist().await?;
        info!("Revoked all sessions ({})", count);
        Ok(count)
    }

    /// Drop expired sessions, saving once if anything was removed
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let removed = self.state.write().await.purge_expired(now);
        if removed > 0 {
            if let Err(e) = self.persist().await {
                error!("Failed to persist session state after purge: {}", e);
            }
        }
        removed
    }

    /// Number of sessions held in memory
    pub async fn count(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    /// Write the current session set to disk
    pub async fn persist(&self) -> StorageResult<()> {
        let _guard = self.persist_lock.lock().await;
        let snapshot = self.state.read().await.sorted();
        self.file.write(&snapshot).await
    }
}
