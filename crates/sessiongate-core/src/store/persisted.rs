use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use super::record::{Criteria, Record, RecordStore};
use super::{valid_user_id, Session, SessionDuration, SessionStore, SessionToken};
use crate::error::StoreError;

const FIELD_SESSION_ID: &str = "session_id";
const FIELD_USER_ID: &str = "user_id";
const FIELD_CREATED_AT: &str = "created_at";

/// Session table persisted through a [`RecordStore`].
///
/// Atomicity of each call is the record store's job; nothing here locks.
#[derive(Debug, Clone)]
pub struct PersistedSessionStore<R> {
    records: R,
}

impl<R: RecordStore> PersistedSessionStore<R> {
    pub fn new(records: R) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &R {
        &self.records
    }

    fn find(&self, token: &SessionToken) -> Result<Vec<Record>, StoreError> {
        let token = token.to_string();
        let mut found = self
            .records
            .search(&Criteria::new().field_eq(FIELD_SESSION_ID, token.as_str()))?;
        found.retain(|r| r.get(FIELD_SESSION_ID) == Some(token.as_str()));
        Ok(found)
    }
}

fn session_to_record(session: &Session) -> Record {
    let record = Record::new(Uuid::new_v4().to_string())
        .with(FIELD_SESSION_ID, session.token.to_string())
        .with(FIELD_USER_ID, session.user_id.clone());
    match session.created_at {
        Some(created_at) => record.with(FIELD_CREATED_AT, created_at.to_rfc3339()),
        None => record,
    }
}

/// `None` when the token or user id is missing. A missing or unparsable
/// `created_at` leaves the session without a creation time, which only
/// counts against it once sessions expire.
fn record_to_session(record: &Record) -> Option<Session> {
    let token = SessionToken::parse(record.get(FIELD_SESSION_ID)?)?;
    let user_id = record.get(FIELD_USER_ID)?.to_string();
    let created_at = record
        .get(FIELD_CREATED_AT)
        .and_then(|value| DateTime::parse_from_rfc3339(value).ok())
        .map(|created_at| created_at.with_timezone(&Utc));
    if created_at.is_none() {
        debug!(record_id = %record.id, "Session record has no readable created_at");
    }
    Some(Session {
        token,
        user_id,
        created_at,
    })
}

impl<R: RecordStore> SessionStore for PersistedSessionStore<R> {
    fn create(&self, user_id: &str) -> Result<Option<SessionToken>, StoreError> {
        if !valid_user_id(user_id) {
            return Ok(None);
        }
        let session = Session::new(user_id);
        self.records.save(&session_to_record(&session))?;
        debug!(token = %session.token.redacted(), user_id, "Persisted session");
        Ok(Some(session.token))
    }

    fn lookup(&self, token: &SessionToken) -> Result<Option<Session>, StoreError> {
        let found = self.find(token)?;
        match found.as_slice() {
            [] => Ok(None),
            [record] => {
                let session = record_to_session(record);
                if session.is_none() {
                    warn!(record_id = %record.id, "Ignoring corrupt session record");
                }
                Ok(session)
            }
            records => {
                warn!(
                    token = %token.redacted(),
                    count = records.len(),
                    "Multiple records share one session token, treating as absent"
                );
                Ok(None)
            }
        }
    }

    /// Deletes every record carrying `token`. Deletes are not atomic as a
    /// group: if one fails, records removed before it stay removed and the
    /// error is returned.
    fn destroy(&self, token: &SessionToken) -> Result<bool, StoreError> {
        let found = self.find(token)?;
        if found.len() > 1 {
            warn!(
                token = %token.redacted(),
                count = found.len(),
                "Deleting duplicate session records"
            );
        }
        for record in &found {
            self.records.delete(record)?;
        }
        if !found.is_empty() {
            debug!(token = %token.redacted(), "Deleted persisted session");
        }
        Ok(!found.is_empty())
    }

    /// Scans the whole table. Records that don't decode to a session are
    /// left alone.
    fn remove_expired(
        &self,
        duration: SessionDuration,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        if duration.never_expires() {
            return Ok(0);
        }
        let mut removed = 0;
        for record in self.records.search(&Criteria::new())? {
            let expired = record_to_session(&record)
                .map(|session| session.is_expired_at(duration, now))
                .unwrap_or(false);
            if expired {
                self.records.delete(&record)?;
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(removed, "Swept expired persisted sessions");
        }
        Ok(removed)
    }
}
