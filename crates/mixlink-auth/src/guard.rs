//! Request-time session checks
//!
//! Extracts the bearer token from an `Authorization` header value, validates
//! it against the [`SessionStore`] and applies the optional origin and
//! user-agent bindings.

use crate::error::{AuthError, AuthResult};
use crate::pairing::ClientInfo;
use crate::session::SessionStore;
use mixlink_core::AuthConfig;
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

/// What downstream handlers learn about an authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub session_id: String,
    pub device_name: String,
}

/// Extract the token from a `Bearer <token>` header value
pub fn parse_bearer(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return None;
    }
    Some(token)
}

/// Gatekeeper for authenticated requests
#[derive(Clone)]
pub struct SessionGuard {
    sessions: Arc<SessionStore>,
    origin_binding: bool,
    user_agent_binding: bool,
}

impl SessionGuard {
    pub fn new(config: &AuthConfig, sessions: Arc<SessionStore>) -> Self {
        Self {
            sessions,
            origin_binding: config.session_origin_binding,
            user_agent_binding: config.session_user_agent_binding,
        }
    }

    /// Require a valid session for the request
    pub async fn authorize(
        &self,
        authorization: Option<&str>,
        client: &ClientInfo,
    ) -> AuthResult<SessionContext> {
        let token = authorization
            .and_then(parse_bearer)
            .ok_or(AuthError::Unauthorized)?;

        let session = self.sessions.lookup(token).await?;

        if self.origin_binding {
            if let Some(recorded) = session.origin_address.as_deref() {
                if client.origin_address.as_deref() != Some(recorded) {
                    warn!(session = %session.id, "Session presented from a different address");
                    return Err(AuthError::SessionInvalid);
                }
            }
        }

        if self.user_agent_binding {
            if let Some(recorded) = session.user_agent.as_deref() {
                if client.user_agent.as_deref() != Some(recorded) {
                    warn!(session = %session.id, "Session presented with a different user agent");
                    return Err(AuthError::SessionInvalid);
                }
            }
        }

        Ok(SessionContext {
            session_id: session.id,
            device_name: session.device_name,
        })
    }

    /// Attach a session if the request carries a valid one, never failing
    pub async fn authorize_optional(
        &self,
        authorization: Option<&str>,
        client: &ClientInfo,
    ) -> Option<SessionContext> {
        self.authorize(authorization, client).await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::NewSession;
    use crate::storage::SessionFile;
    use tempfile::{tempdir, TempDir};

    async fn create_test_guard(config: AuthConfig) -> (SessionGuard, Arc<SessionStore>, TempDir) {
        let dir = tempdir().unwrap();
        let file = SessionFile::with_path(dir.path().join("sessions.json")).unwrap();
        let sessions = Arc::new(SessionStore::open(&config, file).await);
        (SessionGuard::new(&config, sessions.clone()), sessions, dir)
    }

    fn bound_session() -> NewSession {
        NewSession {
            device_name: "phone".to_string(),
            origin_address: Some("192.168.1.20".to_string()),
            user_agent: Some("MixLink-iOS/2.1".to_string()),
        }
    }

    fn same_client() -> ClientInfo {
        ClientInfo::new(
            Some("192.168.1.20".to_string()),
            Some("MixLink-iOS/2.1".to_string()),
        )
    }

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer("Bearer abc123"), Some("abc123"));
        assert_eq!(parse_bearer("bearer abc123"), Some("abc123"));
        assert_eq!(parse_bearer("Bearer "), None);
        assert_eq!(parse_bearer("Basic abc123"), None);
        assert_eq!(parse_bearer("abc123"), None);
        assert_eq!(parse_bearer("Bearer abc 123"), None);
    }

    #[tokio::test]
    async fn test_missing_or_malformed_credentials() {
        let (guard, _sessions, _dir) = create_test_guard(AuthConfig::default()).await;

        let missing = guard.authorize(None, &ClientInfo::default()).await;
        assert!(matches!(missing, Err(AuthError::Unauthorized)));

        let malformed = guard
            .authorize(Some("Token xyz"), &ClientInfo::default())
            .await;
        assert!(matches!(malformed, Err(AuthError::Unauthorized)));

        let unknown = guard
            .authorize(Some("Bearer not-a-session"), &ClientInfo::default())
            .await;
        assert!(matches!(unknown, Err(AuthError::SessionInvalid)));
    }

    #[tokio::test]
    async fn test_valid_session_context() {
        let (guard, sessions, _dir) = create_test_guard(AuthConfig::default()).await;
        let session = sessions.create(bound_session()).await.unwrap();

        let header = format!("Bearer {}", session.token);
        let context = guard
            .authorize(Some(&header), &ClientInfo::default())
            .await
            .unwrap();
        assert_eq!(context.session_id, session.id);
        assert_eq!(context.device_name, "phone");
    }

    #[tokio::test]
    async fn test_origin_binding() {
        let config = AuthConfig::default().with_origin_binding(true);
        let (guard, sessions, _dir) = create_test_guard(config).await;
        let session = sessions.create(bound_session()).await.unwrap();
        let header = format!("Bearer {}", session.token);

        assert!(guard.authorize(Some(&header), &same_client()).await.is_ok());

        let elsewhere = ClientInfo::new(
            Some("10.1.1.1".to_string()),
            Some("MixLink-iOS/2.1".to_string()),
        );
        let result = guard.authorize(Some(&header), &elsewhere).await;
        assert!(matches!(result, Err(AuthError::SessionInvalid)));
    }

    #[tokio::test]
    async fn test_user_agent_binding() {
        let config = AuthConfig::default().with_user_agent_binding(true);
        let (guard, sessions, _dir) = create_test_guard(config).await;
        let session = sessions.create(bound_session()).await.unwrap();
        let header = format!("Bearer {}", session.token);

        let other_agent = ClientInfo::new(
            Some("192.168.1.20".to_string()),
            Some("curl/8.0".to_string()),
        );
        let result = guard.authorize(Some(&header), &other_agent).await;
        assert!(matches!(result, Err(AuthError::SessionInvalid)));

        // Origin binding is off, so a new address is fine
        let moved = ClientInfo::new(
            Some("10.1.1.1".to_string()),
            Some("MixLink-iOS/2.1".to_string()),
        );
        assert!(guard.authorize(Some(&header), &moved).await.is_ok());
    }

    #[tokio::test]
    async fn test_binding_skipped_without_recorded_value() {
        let config = AuthConfig::default()
            .with_origin_binding(true)
            .with_user_agent_binding(true);
        let (guard, sessions, _dir) = create_test_guard(config).await;
        let session = sessions
            .create(NewSession {
                device_name: "phone".to_string(),
                ..NewSession::default()
            })
            .await
            .unwrap();

        let header = format!("Bearer {}", session.token);
        assert!(guard.authorize(Some(&header), &same_client()).await.is_ok());
    }

    #[tokio::test]
    async fn test_optional_never_fails() {
        let (guard, sessions, _dir) = create_test_guard(AuthConfig::default()).await;
        assert!(guard
            .authorize_optional(None, &ClientInfo::default())
            .await
            .is_none());
        assert!(guard
            .authorize_optional(Some("Bearer nope"), &ClientInfo::default())
            .await
            .is_none());

        let session = sessions.create(bound_session()).await.unwrap();
        let header = format!("Bearer {}", session.token);
        let context = guard
            .authorize_optional(Some(&header), &ClientInfo::default())
            .await
            .unwrap();
        assert_eq!(context.session_id, session.id);
    }
}
