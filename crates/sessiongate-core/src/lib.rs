//! sessiongate-core - authentication strategies and session lifecycle.
//!
//! Given a request's path, headers and cookies this crate decides whether
//! authentication is required, extracts Basic credentials or a session
//! token, and resolves the token to a user through an in-memory or
//! persisted session table with optional expiry.

pub mod auth;
pub mod config;
pub mod error;
pub mod store;
pub mod users;

pub use auth::{build_strategy, AuthRequest, AuthStrategy, RequestParts, StrategyDeps};
pub use config::{AuthConfig, StrategyKind};
pub use error::{AccountError, ConfigError, HashError, StoreError};
pub use store::{Session, SessionDuration, SessionStore, SessionToken};
pub use users::{AccountService, Argon2Hasher, Hasher, User, UserRepo};
