//! Device pairing with short human-relayed codes
//!
//! Implements the pairing flow:
//! 1. A client initiates pairing and receives a correlation id
//! 2. The code is shown on the operator console and relayed by a human
//! 3. The client completes pairing with code + correlation id
//! 4. The code is consumed and a session token is issued
//!
//! A code is `PENDING` until it is either consumed by a successful
//! completion or removed once expired. Neither state leads back.

use crate::codegen::{generate_code, generate_id};
use crate::error::{AuthError, AuthResult};
use crate::rate_limit::RateLimiter;
use crate::session::{NewSession, Session, SessionStore};
use chrono::{DateTime, Duration, Utc};
use mixlink_core::AuthConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info, warn};

/// Device name recorded when neither side supplied one
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown device";

/// A pairing code awaiting completion
#[derive(Debug, Clone)]
struct PairingCode {
    correlation_id: String,
    expires_at: DateTime<Utc>,
    device_name: Option<String>,
    origin_address: Option<String>,
}

impl PairingCode {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

/// Response when starting a pairing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingTicket {
    /// The code to relay (also announced on the operator console)
    pub code: String,
    /// Must be echoed back when completing
    pub correlation_id: String,
    /// Seconds until the code expires
    pub expires_in: i64,
}

/// A freshly issued code, for display on the operator console
#[derive(Debug, Clone)]
pub struct PairingAnnouncement {
    pub code: String,
    pub correlation_id: String,
    pub device_name: Option<String>,
    pub origin_address: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Request to complete a pairing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingCompleteRequest {
    /// The code entered by the user (any case)
    pub code: String,
    /// The correlation id from initiation
    pub correlation_id: String,
    /// Device name provided by the client
    #[serde(default)]
    pub device_name: Option<String>,
}

/// Transport-level facts about the caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub origin_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn new(origin_address: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            origin_address,
            user_agent,
        }
    }
}

/// Outstanding pairing codes
pub struct PairingRegistry {
    code_length: usize,
    code_lifetime: Duration,
    codes: Mutex<HashMap<String, PairingCode>>,
    limiter: Arc<RateLimiter>,
    sessions: Arc<SessionStore>,
    announcements: broadcast::Sender<PairingAnnouncement>,
}

impl PairingRegistry {
    /// Create a registry issuing sessions into `sessions`
    pub fn new(config: &AuthConfig, limiter: Arc<RateLimiter>, sessions: Arc<SessionStore>) -> Self {
        let (announcements, _) = broadcast::channel(16);
        Self {
            code_length: config.pairing_code_length,
            code_lifetime: Duration::seconds(config.pairing_code_expiry_seconds as i64),
            codes: Mutex::new(HashMap::new()),
            limiter,
            sessions,
            announcements,
        }
    }

    /// Receive every newly issued code
    pub fn subscribe(&self) -> broadcast::Receiver<PairingAnnouncement> {
        self.announcements.subscribe()
    }

    /// Start a new pairing
    pub async fn initiate(
        &self,
        device_name: Option<String>,
        origin_address: Option<String>,
    ) -> AuthResult<PairingTicket> {
        self.initiate_at(device_name, origin_address, Utc::now()).await
    }

    pub(crate) async fn initiate_at(
        &self,
        device_name: Option<String>,
        origin_address: Option<String>,
        now: DateTime<Utc>,
    ) -> AuthResult<PairingTicket> {
        if let Some(origin) = origin_address.as_deref() {
            if !self.limiter.check_and_consume_at(origin, now).await {
                return Err(AuthError::PairingRateLimited);
            }
        }

        let correlation_id = generate_id();
        let expires_at = now + self.code_lifetime;

        let code = {
            let mut codes = self.codes.lock().await;
            let code = loop {
                let candidate = generate_code(self.code_length);
                if !codes.contains_key(&candidate) {
                    break candidate;
                }
            };
            codes.insert(
                code.clone(),
                PairingCode {
                    correlation_id: correlation_id.clone(),
                    expires_at,
                    device_name: device_name.clone(),
                    origin_address: origin_address.clone(),
                },
            );
            code
        };

        info!(
            correlation = %correlation_id,
            device = device_name.as_deref().unwrap_or("-"),
            origin = origin_address.as_deref().unwrap_or("-"),
            "Started pairing"
        );

        // Nobody listening is fine; the code is still returned to the caller
        let _ = self.announcements.send(PairingAnnouncement {
            code: code.clone(),
            correlation_id: correlation_id.clone(),
            device_name,
            origin_address,
            expires_at,
        });

        Ok(PairingTicket {
            code,
            correlation_id,
            expires_in: self.code_lifetime.num_seconds(),
        })
    }

    /// Complete a pairing and issue a session
    pub async fn complete(
        &self,
        request: PairingCompleteRequest,
        client: ClientInfo,
    ) -> AuthResult<Session> {
        self.complete_at(request, client, Utc::now()).await
    }

    pub(crate) async fn complete_at(
        &self,
        request: PairingCompleteRequest,
        client: ClientInfo,
        now: DateTime<Utc>,
    ) -> AuthResult<Session> {
        let key = request.code.trim().to_uppercase();

        let session = {
            let mut codes = self.codes.lock().await;

            let pending = match codes.get(&key) {
                Some(p) if p.correlation_id == request.correlation_id => p.clone(),
                _ => {
                    warn!(
                        correlation = %request.correlation_id,
                        "Pairing completion with unknown code"
                    );
                    return Err(AuthError::PairingCodeInvalid);
                }
            };

            if pending.is_expired(now) {
                codes.remove(&key);
                debug!(correlation = %request.correlation_id, "Pairing code expired");
                return Err(AuthError::PairingCodeExpired);
            }

            let device_name = request
                .device_name
                .filter(|n| !n.trim().is_empty())
                .or(pending.device_name)
                .unwrap_or_else(|| UNKNOWN_DEVICE_NAME.to_string());

            let session = self.sessions.build(
                NewSession {
                    device_name,
                    origin_address: client.origin_address.or(pending.origin_address),
                    user_agent: client.user_agent,
                },
                now,
            );

            // Code stays pending if the store is full
            self.sessions.admit(session.clone(), now).await?;
            codes.remove(&key);
            session
        };

        // The session stays admitted; the next successful write catches up
        if let Err(e) = self.sessions.persist().await {
            error!(session = %session.id, "Failed to persist paired session: {}", e);
            return Err(e.into());
        }

        info!(
            session = %session.id,
            device = %session.device_name,
            "Device paired successfully"
        );
        Ok(session)
    }

    /// Drop every expired code
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut codes = self.codes.lock().await;
        let before = codes.len();
        codes.retain(|_, c| !c.is_expired(now));
        before - codes.len()
    }

    /// Number of codes awaiting completion
    pub async fn pending_count(&self) -> usize {
        self.codes.lock().await.len()
    }
}
