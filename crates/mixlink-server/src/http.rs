//! HTTP request handlers
//!
//! Pairing endpoints are open; session management requires a valid session.

use axum::{
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use mixlink_auth::{PairingCompleteRequest, PairingTicket, SessionContext, SessionInfo};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::middleware::{attach_session, client_info, require_session};
use crate::state::AppState;

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route(
            "/api/sessions",
            get(list_sessions_handler).delete(revoke_all_handler),
        )
        .route(
            "/api/sessions/:id",
            get(get_session_handler).delete(revoke_session_handler),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    let optional = Router::new()
        .route("/api/session", get(current_session_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            attach_session,
        ));

    Router::new()
        // Pairing API
        .route("/api/pair/initiate", post(pair_initiate_handler))
        .route("/api/pair/complete", post(pair_complete_handler))
        // Server info
        .route("/api/info", get(server_info_handler))
        .merge(protected)
        .merge(optional)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Pairing API Handlers
// ============================================================================

/// Body of a pairing initiation (may be omitted)
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingInitiateRequest {
    #[serde(default)]
    device_name: Option<String>,
}

/// Start a new pairing
///
/// Returns the code, a correlation id and the code lifetime in seconds.
async fn pair_initiate_handler(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Option<Json<PairingInitiateRequest>>,
) -> Result<Json<PairingTicket>, ApiError> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let origin = peer.map(|ConnectInfo(addr)| addr.ip().to_string());

    let ticket = state.auth.initiate(request.device_name, origin).await?;
    Ok(Json(ticket))
}

/// Response after successful pairing
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairingCompleteResponse {
    pub session_id: String,
    pub token: String,
    pub device_name: String,
    pub expires_at: DateTime<Utc>,
}

/// Complete a pairing and issue a session token
async fn pair_complete_handler(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(request): Json<PairingCompleteRequest>,
) -> Result<Json<PairingCompleteResponse>, ApiError> {
    let client = client_info(peer.map(|c| c.0), &headers);
    let session = state.auth.complete(request, client).await?;

    Ok(Json(PairingCompleteResponse {
        session_id: session.id,
        token: session.token,
        device_name: session.device_name,
        expires_at: session.expires_at,
    }))
}

// ============================================================================
// Session Handlers
// ============================================================================

/// Response describing the caller's own session
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentSessionResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionContext>,
}

/// Report whether the caller is authenticated
async fn current_session_handler(
    context: Option<Extension<SessionContext>>,
) -> Json<CurrentSessionResponse> {
    let session = context.map(|Extension(c)| c);
    Json(CurrentSessionResponse {
        authenticated: session.is_some(),
        session,
    })
}

/// List all live sessions
async fn list_sessions_handler(State(state): State<Arc<AppState>>) -> Json<Vec<SessionInfo>> {
    let sessions = state.auth.list().await;
    Json(sessions.iter().map(SessionInfo::from).collect())
}

/// Get one session
async fn get_session_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionInfo>, ApiError> {
    state
        .auth
        .get(&id)
        .await
        .map(|s| Json(SessionInfo::from(&s)))
        .ok_or(ApiError::NotFound)
}

/// Revoke one session
async fn revoke_session_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.auth.revoke(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound)
    }
}

/// Response for a bulk revocation
#[derive(Debug, Serialize)]
pub struct RevokeAllResponse {
    pub revoked: usize,
}

/// Revoke every session, including the caller's
async fn revoke_all_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RevokeAllResponse>, ApiError> {
    let revoked = state.auth.revoke_all().await?;
    Ok(Json(RevokeAllResponse { revoked }))
}

// ============================================================================
// Server Info
// ============================================================================

/// Server information response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    /// Server version
    pub version: String,
    /// Listening port
    pub port: u16,
    /// Number of live sessions
    pub sessions: usize,
    /// Maximum number of sessions
    pub max_sessions: usize,
    /// Pairing codes awaiting completion
    pub pending_pairings: usize,
}

/// Get server information
async fn server_info_handler(State(state): State<Arc<AppState>>) -> Json<ServerInfo> {
    Json(ServerInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        port: state.config.port,
        sessions: state.auth.list().await.len(),
        max_sessions: state.config.auth.session_max_count,
        pending_pairings: state.auth.pending_pairings().await,
    })
}
