use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of token characters shown in logs
const REDACTED_TOKEN_LEN: usize = 8;

/// Opaque session identifier handed to the client as a cookie value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(Uuid);

impl SessionToken {
    /// Mint a fresh random token.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a client-supplied value. Only the lowercase hyphenated form
    /// tokens are issued in is accepted; other UUID spellings are malformed.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let uuid = Uuid::parse_str(value).ok()?;
        (uuid.to_string() == value).then_some(Self(uuid))
    }

    /// Short prefix safe to put in logs
    pub fn redacted(&self) -> String {
        let full = self.0.to_string();
        format!("{}…", &full[..REDACTED_TOKEN_LEN])
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Session time-to-live. Zero or negative means sessions never expire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionDuration(i64);

impl SessionDuration {
    pub const NEVER: Self = Self(0);

    pub fn from_secs(seconds: i64) -> Self {
        Self(seconds)
    }

    /// Parse a configuration value. Anything that isn't an integer falls
    /// back to [`SessionDuration::NEVER`].
    pub fn parse(value: &str) -> Self {
        value.trim().parse().map(Self).unwrap_or(Self::NEVER)
    }

    pub fn as_secs(&self) -> i64 {
        self.0
    }

    pub fn never_expires(&self) -> bool {
        self.0 <= 0
    }

    /// Instant a session created at `created_at` stops resolving, or `None`
    /// when it never does (including when the instant is past the range
    /// chrono can represent).
    pub fn expires_at(&self, created_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.never_expires() {
            return None;
        }
        Duration::try_seconds(self.0).and_then(|ttl| created_at.checked_add_signed(ttl))
    }
}

/// A token bound to a user identity.
///
/// `created_at` is always set for sessions minted here. It is `None` only
/// for stored sessions whose creation time is missing or unreadable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: SessionToken,
    pub user_id: String,
    pub created_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            token: SessionToken::generate(),
            user_id: user_id.into(),
            created_at: Some(Utc::now()),
        }
    }

    /// Whether the session is past its lifetime at `now`. A session is
    /// still valid at the exact expiry instant. Without a creation time it
    /// counts as expired unless sessions never expire.
    pub fn is_expired_at(&self, duration: SessionDuration, now: DateTime<Utc>) -> bool {
        if duration.never_expires() {
            return false;
        }
        let Some(created_at) = self.created_at else {
            return true;
        };
        match duration.expires_at(created_at) {
            Some(expiry) => expiry < now,
            None => false,
        }
    }

    pub fn is_expired(&self, duration: SessionDuration) -> bool {
        self.is_expired_at(duration, Utc::now())
    }

    /// Time left before expiry, `None` for sessions that never expire or
    /// have no creation time.
    pub fn time_until_expiry(&self, duration: SessionDuration) -> Option<Duration> {
        duration
            .expires_at(self.created_at?)
            .map(|expiry| expiry - Utc::now())
    }
}
