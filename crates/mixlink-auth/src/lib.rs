//! MixLink Auth - Device pairing and session authentication
//!
//! Lets an unauthenticated client pair through a short code read off the
//! operator console and hands it a long-lived session token for every
//! request after that.
//!
//! # Pairing Flow
//!
//! 1. Client calls `POST /api/pair/initiate` -> `AuthManager::initiate()`
//! 2. The code is announced on the operator console
//! 3. Client submits code + correlation id -> `AuthManager::complete()`
//! 4. Upon success, client receives a session token
//! 5. Client sends `Authorization: Bearer <token>` on every request
//!
//! # Example
//!
//! ```no_run
//! use mixlink_auth::{AuthManager, ClientInfo, PairingCompleteRequest, SessionFile};
//! use mixlink_core::AuthConfig;
//!
//! async fn example() {
//!     let file = SessionFile::new().unwrap();
//!     let manager = AuthManager::open(&AuthConfig::default(), file).await;
//!
//!     let ticket = manager.initiate(Some("phone".into()), None).await.unwrap();
//!     println!("Enter code on device: {}", ticket.code);
//!
//!     let request = PairingCompleteRequest {
//!         code: ticket.code,
//!         correlation_id: ticket.correlation_id,
//!         device_name: None,
//!     };
//!     let session = manager.complete(request, ClientInfo::default()).await.unwrap();
//!
//!     if let Some(session) = manager.validate(&session.token).await {
//!         println!("Device {} connected", session.device_name);
//!     }
//! }
//! ```

pub mod cleanup;
pub mod codegen;
pub mod error;
pub mod guard;
pub mod manager;
pub mod pairing;
pub mod rate_limit;
pub mod session;
pub mod storage;

pub use cleanup::{CleanupHandle, CleanupScheduler, SweepReport};
pub use error::{AuthError, AuthResult};
pub use guard::{parse_bearer, SessionContext, SessionGuard};
pub use manager::AuthManager;
pub use pairing::{
    ClientInfo, PairingAnnouncement, PairingCompleteRequest, PairingRegistry, PairingTicket,
};
pub use rate_limit::RateLimiter;
pub use session::{NewSession, Session, SessionInfo, SessionStore};
pub use storage::{SessionFile, StorageError, StorageResult};
