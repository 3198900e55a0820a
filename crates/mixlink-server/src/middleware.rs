//! Session checks applied in front of handlers

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use mixlink_auth::ClientInfo;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::AppState;

/// Build the caller description from the peer address and headers
pub fn client_info(peer: Option<SocketAddr>, headers: &HeaderMap) -> ClientInfo {
    ClientInfo::new(
        peer.map(|addr| addr.ip().to_string()),
        headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    )
}

fn request_credentials(request: &Request) -> (Option<String>, ClientInfo) {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|c| c.0);
    let authorization = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    (authorization, client_info(peer, request.headers()))
}

/// Reject the request unless it carries a valid session
///
/// On success the [`mixlink_auth::SessionContext`] is added to the request
/// extensions.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let (authorization, client) = request_credentials(&request);

    match state.auth.authorize(authorization.as_deref(), &client).await {
        Ok(context) => {
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Attach a session context when the request carries a valid one
pub async fn attach_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let (authorization, client) = request_credentials(&request);

    if let Some(context) = state
        .auth
        .authorize_optional(authorization.as_deref(), &client)
        .await
    {
        request.extensions_mut().insert(context);
    }
    next.run(request).await
}
