//! MixLink Core - Shared configuration and error types
//!
//! This crate provides the foundational types used across all MixLink components.

pub mod config;
pub mod error;

pub use config::{AuthConfig, Config};
pub use error::{Error, Result};
