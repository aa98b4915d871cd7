//! Authentication for inbound requests.
//!
//! This module provides:
//! - `require_auth`: path exemption policy
//! - `credentials`: HTTP Basic header decoding and user resolution
//! - `AuthStrategy`: the plain, basic and session strategies handlers call
//!
//! Every "can't tell who this is" outcome is `None`; only storage
//! failures surface as errors.

pub mod credentials;
pub mod path_policy;
pub mod request;
pub mod strategy;

pub use credentials::Credentials;
pub use path_policy::require_auth;
pub use request::{AuthRequest, RequestParts};
pub use strategy::{
    build_strategy, AuthStrategy, BasicAuth, PlainAuth, SessionAuth, SessionDbAuth,
    SessionExpAuth, StrategyDeps,
};
