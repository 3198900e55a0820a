//! MixLink Server - Axum-based HTTP API
//!
//! Thin adapter exposing pairing and session management over HTTP.

pub mod error;
pub mod http;
pub mod middleware;
pub mod state;

pub use error::ApiError;
pub use http::create_router;
pub use state::AppState;
