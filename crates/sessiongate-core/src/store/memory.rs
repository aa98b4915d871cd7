use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;

use super::{valid_user_id, Session, SessionDuration, SessionStore, SessionToken};
use crate::error::StoreError;

/// Session table held in process memory.
///
/// Clones share the same table, so one instance can be handed to the
/// strategy and another to a background sweeper (see
/// [`SessionStore::remove_expired`]).
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionToken, Session>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn create(&self, user_id: &str) -> Result<Option<SessionToken>, StoreError> {
        if !valid_user_id(user_id) {
            return Ok(None);
        }
        let session = Session::new(user_id);
        let token = session.token;
        self.sessions.write().insert(token, session);
        debug!(token = %token.redacted(), user_id, "Created session");
        Ok(Some(token))
    }

    fn lookup(&self, token: &SessionToken) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.read().get(token).cloned())
    }

    fn destroy(&self, token: &SessionToken) -> Result<bool, StoreError> {
        let removed = self.sessions.write().remove(token).is_some();
        if removed {
            debug!(token = %token.redacted(), "Destroyed session");
        }
        Ok(removed)
    }

    fn remove_expired(
        &self,
        duration: SessionDuration,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        if duration.never_expires() {
            return Ok(0);
        }
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired_at(duration, now));
        let removed = before - sessions.len();
        if removed > 0 {
            debug!(removed, "Swept expired sessions");
        }
        Ok(removed)
    }
}
