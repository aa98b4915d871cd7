//! User accounts: lookup, password hashing and the account workflows
//! (registration, login check, password reset).

pub mod accounts;
pub mod hasher;

pub use accounts::AccountService;
pub use hasher::{Argon2Hasher, Hasher};

use std::fmt;

use crate::error::StoreError;
use crate::store::{Criteria, Record, RecordStore};

const FIELD_EMAIL: &str = "email";
const FIELD_HASHED_PASSWORD: &str = "hashed_password";
const FIELD_RESET_TOKEN: &str = "reset_token";

#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub hashed_password: String,
    pub reset_token: Option<String>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Criteria for a lookup by user id
pub fn by_id(id: &str) -> Criteria {
    Criteria::new().field_eq("id", id)
}

/// Criteria for a lookup by email
pub fn by_email(email: &str) -> Criteria {
    Criteria::new().field_eq(FIELD_EMAIL, email)
}

/// Criteria for a lookup by outstanding password reset token
pub fn by_reset_token(token: &str) -> Criteria {
    Criteria::new().field_eq(FIELD_RESET_TOKEN, token)
}

pub trait UserRepo: Send + Sync {
    fn find_by(&self, criteria: &Criteria) -> Result<Vec<User>, StoreError>;

    /// Insert or replace by id.
    fn save(&self, user: &User) -> Result<(), StoreError>;
}

impl<T: UserRepo + ?Sized> UserRepo for std::sync::Arc<T> {
    fn find_by(&self, criteria: &Criteria) -> Result<Vec<User>, StoreError> {
        (**self).find_by(criteria)
    }

    fn save(&self, user: &User) -> Result<(), StoreError> {
        (**self).save(user)
    }
}

/// Users kept as records in any [`RecordStore`].
#[derive(Debug, Clone)]
pub struct RecordUserRepo<R> {
    records: R,
}

impl<R: RecordStore> RecordUserRepo<R> {
    pub fn new(records: R) -> Self {
        Self { records }
    }
}

fn user_to_record(user: &User) -> Record {
    let mut record = Record::new(user.id.clone())
        .with(FIELD_EMAIL, user.email.clone())
        .with(FIELD_HASHED_PASSWORD, user.hashed_password.clone());
    if let Some(ref token) = user.reset_token {
        record = record.with(FIELD_RESET_TOKEN, token.clone());
    }
    record
}

fn record_to_user(record: Record) -> Option<User> {
    Some(User {
        email: record.get(FIELD_EMAIL)?.to_string(),
        hashed_password: record.get(FIELD_HASHED_PASSWORD)?.to_string(),
        reset_token: record.get(FIELD_RESET_TOKEN).map(str::to_string),
        id: record.id,
    })
}

impl<R: RecordStore> UserRepo for RecordUserRepo<R> {
    fn find_by(&self, criteria: &Criteria) -> Result<Vec<User>, StoreError> {
        let records = self.records.search(criteria)?;
        Ok(records.into_iter().filter_map(record_to_user).collect())
    }

    fn save(&self, user: &User) -> Result<(), StoreError> {
        self.records.save(&user_to_record(user))
    }
}
