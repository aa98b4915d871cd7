//! Request-facing authentication strategies.
//!
//! One concrete strategy is chosen at startup (see [`build_strategy`]) and
//! shared by every request handler. Session variants differ only in the
//! store they wrap:
//!
//! | strategy         | store                                        |
//! |------------------|----------------------------------------------|
//! | `SessionAuth`    | `MemorySessionStore`                         |
//! | `SessionExpAuth` | `Expiring<MemorySessionStore>`               |
//! | `SessionDbAuth`  | `Expiring<PersistedSessionStore<R>>`         |

use std::sync::Arc;

use tracing::debug;

use super::credentials::{credentials_from_header, resolve_user};
use super::path_policy;
use super::request::{AuthRequest, AUTHORIZATION_HEADER};
use crate::config::{AuthConfig, StrategyKind};
use crate::error::StoreError;
use crate::store::{
    Expiring, MemorySessionStore, PersistedSessionStore, RecordStore, SessionStore, SessionToken,
};
use crate::users::{by_id, Hasher, User, UserRepo};

pub trait AuthStrategy: Send + Sync {
    /// Whether `path` needs an authenticated user.
    fn require_auth(&self, path: &str, exempt_paths: &[String]) -> bool {
        path_policy::require_auth(path, exempt_paths)
    }

    fn authorization_header<'r>(&self, request: &'r dyn AuthRequest) -> Option<&'r str> {
        request.header(AUTHORIZATION_HEADER)
    }

    /// Name of the cookie carrying the session token, for strategies that
    /// use one.
    fn cookie_name(&self) -> Option<&str> {
        None
    }

    fn session_cookie<'r>(&self, request: &'r dyn AuthRequest) -> Option<&'r str> {
        request.cookie(self.cookie_name()?)
    }

    fn current_user(&self, request: &dyn AuthRequest) -> Result<Option<User>, StoreError>;

    /// Start a session for `user_id`; `Ok(None)` when unsupported or the id
    /// is blank.
    fn create_session(&self, _user_id: &str) -> Result<Option<SessionToken>, StoreError> {
        Ok(None)
    }

    /// End the session named by the request's cookie. `Ok(false)` when
    /// there is no cookie, the token is malformed or the session is unknown.
    fn destroy_session(&self, _request: &dyn AuthRequest) -> Result<bool, StoreError> {
        Ok(false)
    }

    /// Delete sessions that have outlived the configured duration and
    /// return how many went. Hosts call this periodically; lookups never
    /// delete.
    fn sweep_expired_sessions(&self) -> Result<usize, StoreError> {
        Ok(0)
    }
}

// ============================================================================
// Plain
// ============================================================================

/// Path policy only; never identifies anyone.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainAuth;

impl AuthStrategy for PlainAuth {
    fn current_user(&self, _request: &dyn AuthRequest) -> Result<Option<User>, StoreError> {
        Ok(None)
    }
}

// ============================================================================
// Basic
// ============================================================================

/// Resolves the user from an `Authorization: Basic` header on every request.
#[derive(Clone)]
pub struct BasicAuth {
    users: Arc<dyn UserRepo>,
    hasher: Arc<dyn Hasher>,
}

impl BasicAuth {
    pub fn new(users: Arc<dyn UserRepo>, hasher: Arc<dyn Hasher>) -> Self {
        Self { users, hasher }
    }
}

impl AuthStrategy for BasicAuth {
    fn current_user(&self, request: &dyn AuthRequest) -> Result<Option<User>, StoreError> {
        let Some(credentials) = credentials_from_header(self.authorization_header(request)) else {
            return Ok(None);
        };
        resolve_user(
            &credentials.identifier,
            &credentials.secret,
            self.users.as_ref(),
            self.hasher.as_ref(),
        )
    }
}

// ============================================================================
// Session
// ============================================================================

/// Cookie-based sessions over any [`SessionStore`].
pub struct SessionAuth<S> {
    store: S,
    cookie_name: String,
    users: Arc<dyn UserRepo>,
}

/// Sessions in memory with a time-to-live
pub type SessionExpAuth = SessionAuth<Expiring<MemorySessionStore>>;

/// Sessions in a record store with a time-to-live
pub type SessionDbAuth<R> = SessionAuth<Expiring<PersistedSessionStore<R>>>;

impl<S: SessionStore> SessionAuth<S> {
    pub fn new(store: S, cookie_name: impl Into<String>, users: Arc<dyn UserRepo>) -> Self {
        Self {
            store,
            cookie_name: cookie_name.into(),
            users,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// User id bound to a raw cookie value. Malformed, unknown and expired
    /// tokens all read as `None`.
    pub fn user_id_for_session(&self, token: &str) -> Result<Option<String>, StoreError> {
        match SessionToken::parse(token) {
            Some(token) => self.store.user_id_for_session(&token),
            None => Ok(None),
        }
    }
}

impl<S: SessionStore> AuthStrategy for SessionAuth<S> {
    fn cookie_name(&self) -> Option<&str> {
        Some(&self.cookie_name)
    }

    fn current_user(&self, request: &dyn AuthRequest) -> Result<Option<User>, StoreError> {
        let Some(token) = self.session_cookie(request) else {
            return Ok(None);
        };
        let Some(user_id) = self.user_id_for_session(token)? else {
            return Ok(None);
        };
        Ok(self.users.find_by(&by_id(&user_id))?.into_iter().next())
    }

    fn create_session(&self, user_id: &str) -> Result<Option<SessionToken>, StoreError> {
        self.store.create(user_id)
    }

    fn destroy_session(&self, request: &dyn AuthRequest) -> Result<bool, StoreError> {
        let Some(token) = self.session_cookie(request).and_then(SessionToken::parse) else {
            debug!("Logout without a usable session cookie");
            return Ok(false);
        };
        self.store.destroy(&token)
    }

    fn sweep_expired_sessions(&self) -> Result<usize, StoreError> {
        self.store.sweep_expired()
    }
}

// ============================================================================
// Selection
// ============================================================================

/// Collaborators a strategy may need. Strategies ignore what they don't use.
#[derive(Clone)]
pub struct StrategyDeps {
    pub users: Arc<dyn UserRepo>,
    pub hasher: Arc<dyn Hasher>,
    /// Backing table for `session_db_auth`
    pub session_records: Arc<dyn RecordStore>,
}

/// Build the strategy named by `config.strategy`.
pub fn build_strategy(config: &AuthConfig, deps: StrategyDeps) -> Box<dyn AuthStrategy> {
    let cookie = config.session_cookie_name.clone();
    let duration = config.session_duration;
    debug!(strategy = ?config.strategy, "Building auth strategy");

    match config.strategy {
        StrategyKind::Plain => Box::new(PlainAuth),
        StrategyKind::Basic => Box::new(BasicAuth::new(deps.users, deps.hasher)),
        StrategyKind::Session => {
            Box::new(SessionAuth::new(MemorySessionStore::new(), cookie, deps.users))
        }
        StrategyKind::SessionExp => Box::new(SessionExpAuth::new(
            Expiring::new(MemorySessionStore::new(), duration),
            cookie,
            deps.users,
        )),
        StrategyKind::SessionDb => Box::new(SessionDbAuth::new(
            Expiring::new(PersistedSessionStore::new(deps.session_records), duration),
            cookie,
            deps.users,
        )),
    }
}
