//! Session tables and the record persistence beneath them.
//!
//! - `MemorySessionStore`: process-local table shared behind a lock
//! - `PersistedSessionStore`: sessions kept as records in a `RecordStore`
//! - `Expiring`: decorator adding a time-to-live to any `SessionStore`

pub mod expiring;
pub mod memory;
pub mod persisted;
pub mod record;
pub mod session;

pub use expiring::{Clock, Expiring, ManualClock, SystemClock};
pub use memory::MemorySessionStore;
pub use persisted::PersistedSessionStore;
pub use record::{Criteria, JsonFileRecordStore, MemoryRecordStore, Record, RecordStore};
pub use session::{Session, SessionDuration, SessionToken};

use chrono::{DateTime, Utc};

use crate::error::StoreError;

/// Token → session mapping with create/lookup/destroy semantics.
///
/// "Not found" is `Ok(None)` / `Ok(false)`; `Err` is reserved for backend
/// failures.
pub trait SessionStore: Send + Sync {
    /// Start a session for `user_id`. Returns `Ok(None)` for a blank id.
    fn create(&self, user_id: &str) -> Result<Option<SessionToken>, StoreError>;

    fn lookup(&self, token: &SessionToken) -> Result<Option<Session>, StoreError>;

    /// Remove the session. `Ok(false)` if it wasn't there.
    fn destroy(&self, token: &SessionToken) -> Result<bool, StoreError>;

    fn user_id_for_session(&self, token: &SessionToken) -> Result<Option<String>, StoreError> {
        Ok(self.lookup(token)?.map(|session| session.user_id))
    }

    /// Delete every session expired under `duration` at `now` and return
    /// how many went. Stores that can't enumerate their sessions keep
    /// everything.
    fn remove_expired(
        &self,
        _duration: SessionDuration,
        _now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        Ok(0)
    }

    /// Delete sessions that can no longer resolve under this store's own
    /// lifetime. Stores without one have nothing to sweep.
    fn sweep_expired(&self) -> Result<usize, StoreError> {
        Ok(0)
    }
}

impl<T: SessionStore + ?Sized> SessionStore for std::sync::Arc<T> {
    fn create(&self, user_id: &str) -> Result<Option<SessionToken>, StoreError> {
        (**self).create(user_id)
    }

    fn lookup(&self, token: &SessionToken) -> Result<Option<Session>, StoreError> {
        (**self).lookup(token)
    }

    fn destroy(&self, token: &SessionToken) -> Result<bool, StoreError> {
        (**self).destroy(token)
    }

    fn remove_expired(
        &self,
        duration: SessionDuration,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        (**self).remove_expired(duration, now)
    }

    fn sweep_expired(&self) -> Result<usize, StoreError> {
        (**self).sweep_expired()
    }
}

/// Shared guard for `create`: user ids must carry at least one
/// non-whitespace character.
pub(crate) fn valid_user_id(user_id: &str) -> bool {
    !user_id.trim().is_empty()
}
