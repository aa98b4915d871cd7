use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;

use super::{Session, SessionDuration, SessionStore, SessionToken};
use crate::error::StoreError;

/// Source of "now" for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Used to evaluate expiry at a chosen
/// instant.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Adds a time-to-live to any session store.
///
/// Expired sessions read as absent but stay in the inner store until
/// [`SessionStore::sweep_expired`] removes them.
#[derive(Debug, Clone)]
pub struct Expiring<S, C = SystemClock> {
    inner: S,
    duration: SessionDuration,
    clock: C,
}

impl<S: SessionStore> Expiring<S, SystemClock> {
    pub fn new(inner: S, duration: SessionDuration) -> Self {
        Self {
            inner,
            duration,
            clock: SystemClock,
        }
    }
}

impl<S: SessionStore, C: Clock> Expiring<S, C> {
    pub fn with_clock(inner: S, duration: SessionDuration, clock: C) -> Self {
        Self {
            inner,
            duration,
            clock,
        }
    }

    pub fn duration(&self) -> SessionDuration {
        self.duration
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: SessionStore, C: Clock> SessionStore for Expiring<S, C> {
    fn create(&self, user_id: &str) -> Result<Option<SessionToken>, StoreError> {
        self.inner.create(user_id)
    }

    fn lookup(&self, token: &SessionToken) -> Result<Option<Session>, StoreError> {
        let Some(session) = self.inner.lookup(token)? else {
            return Ok(None);
        };
        if session.is_expired_at(self.duration, self.clock.now()) {
            debug!(token = %token.redacted(), "Session expired");
            return Ok(None);
        }
        Ok(Some(session))
    }

    fn destroy(&self, token: &SessionToken) -> Result<bool, StoreError> {
        self.inner.destroy(token)
    }

    fn remove_expired(
        &self,
        duration: SessionDuration,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        self.inner.remove_expired(duration, now)
    }

    fn sweep_expired(&self) -> Result<usize, StoreError> {
        self.inner.remove_expired(self.duration, self.clock.now())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::store::MemorySessionStore;

    fn expiring(secs: i64) -> (Expiring<MemorySessionStore, Arc<ManualClock>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Expiring::with_clock(
            MemorySessionStore::new(),
            SessionDuration::from_secs(secs),
            clock.clone(),
        );
        (store, clock)
    }

    #[test]
    fn test_zero_duration_never_expires() {
        let (store, clock) = expiring(0);
        let token = store.create("u1").unwrap().unwrap();
        clock.advance(Duration::days(10_000));
        assert_eq!(store.user_id_for_session(&token).unwrap().as_deref(), Some("u1"));

        assert!(store.destroy(&token).unwrap());
        assert!(store.lookup(&token).unwrap().is_none());
    }

    #[test]
    fn test_expiry_is_monotonic_around_the_deadline() {
        let (store, clock) = expiring(30);
        let token = store.create("u1").unwrap().unwrap();
        let created = store.inner().lookup(&token).unwrap().unwrap().created_at.unwrap();
        let deadline = created + Duration::seconds(30);

        clock.set(deadline - Duration::milliseconds(1));
        assert!(store.lookup(&token).unwrap().is_some());

        clock.set(deadline + Duration::milliseconds(1));
        assert!(store.lookup(&token).unwrap().is_none());

        clock.advance(Duration::hours(1));
        assert!(store.lookup(&token).unwrap().is_none());
    }

    #[test]
    fn test_expired_session_is_not_deleted() {
        let (store, clock) = expiring(1);
        let token = store.create("u1").unwrap().unwrap();
        clock.advance(Duration::seconds(5));

        assert!(store.lookup(&token).unwrap().is_none());
        assert!(store.inner().lookup(&token).unwrap().is_some());
    }

    #[test]
    fn test_lookup_does_not_touch_created_at() {
        let (store, _clock) = expiring(60);
        let token = store.create("u1").unwrap().unwrap();
        let first = store.lookup(&token).unwrap().unwrap().created_at;
        let second = store.lookup(&token).unwrap().unwrap().created_at;
        assert_eq!(first, second);
    }

    #[test]
    fn test_sweep_uses_own_duration_and_clock() {
        let (store, clock) = expiring(60);
        let a = store.create("a").unwrap().unwrap();
        let b = store.create("b").unwrap().unwrap();

        clock.advance(Duration::seconds(30));
        assert_eq!(store.sweep_expired().unwrap(), 0);
        assert_eq!(store.inner().len(), 2);

        clock.advance(Duration::seconds(31));
        assert_eq!(store.sweep_expired().unwrap(), 2);
        assert!(store.inner().lookup(&a).unwrap().is_none());
        assert!(store.inner().lookup(&b).unwrap().is_none());
        assert_eq!(store.sweep_expired().unwrap(), 0);
    }

    #[test]
    fn test_sweep_without_lifetime_keeps_everything() {
        let (store, clock) = expiring(0);
        store.create("u1").unwrap().unwrap();
        clock.advance(Duration::days(10_000));
        assert_eq!(store.sweep_expired().unwrap(), 0);
        assert_eq!(store.inner().len(), 1);
        assert_eq!(MemorySessionStore::new().sweep_expired().unwrap(), 0);
    }

    #[test]
    fn test_create_delegates_blank_check() {
        let (store, _clock) = expiring(60);
        assert!(store.create("").unwrap().is_none());
    }
}
