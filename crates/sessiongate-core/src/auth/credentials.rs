//! HTTP Basic credential pipeline.
//!
//! Each stage takes the previous stage's output and returns `None` on
//! anything malformed, so a bad header simply resolves to "no user".

use std::fmt;

use base64::prelude::*;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::users::{by_email, Hasher, User, UserRepo};

/// Scheme prefix, case-sensitive with exactly one space
const BASIC_PREFIX: &str = "Basic ";

/// Identifier/secret pair decoded from a Basic header. Never stored.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub identifier: String,
    pub secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"***")
            .finish()
    }
}

/// `"Basic <token>"` → `<token>`.
pub fn extract_encoded(header: Option<&str>) -> Option<&str> {
    header?.strip_prefix(BASIC_PREFIX)
}

/// Strict standard base64 → UTF-8 text.
pub fn decode(token: Option<&str>) -> Option<String> {
    let bytes = BASE64_STANDARD.decode(token?.as_bytes()).ok()?;
    String::from_utf8(bytes).ok()
}

/// `"identifier:secret"` split on the first colon; the secret may contain
/// further colons.
pub fn split_credentials(text: Option<&str>) -> Option<Credentials> {
    let (identifier, secret) = text?.split_once(':')?;
    Some(Credentials {
        identifier: identifier.to_string(),
        secret: secret.to_string(),
    })
}

/// Run all three stages over an `Authorization` header value.
pub fn credentials_from_header(header: Option<&str>) -> Option<Credentials> {
    let decoded = decode(extract_encoded(header));
    split_credentials(decoded.as_deref())
}

/// Find the user whose stored digest verifies `secret`.
///
/// Only store failures are errors; an unknown identifier or a wrong secret
/// is `Ok(None)`.
pub fn resolve_user(
    identifier: &str,
    secret: &str,
    users: &dyn UserRepo,
    hasher: &dyn Hasher,
) -> Result<Option<User>, StoreError> {
    let candidates = users.find_by(&by_email(identifier))?;
    if candidates.is_empty() {
        debug!("No user for Basic identifier");
        return Ok(None);
    }
    if candidates.len() > 1 {
        // Registration should have prevented this
        warn!(count = candidates.len(), "Multiple users share one identifier");
    }
    Ok(candidates
        .into_iter()
        .find(|user| hasher.verify(secret, &user.hashed_password)))
}
