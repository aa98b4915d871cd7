use thiserror::Error;

/// Failure of a storage backend. Distinct from "session not found", which
/// is always `Ok(None)`.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Record store unavailable: {0}")]
    Unavailable(String),

    #[error("Record store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Record store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum HashError {
    #[error("Failed to hash password: {0}")]
    Hash(String),

    #[error("Invalid hashing parameters: {0}")]
    Params(String),
}

/// Caller-visible failures of the account workflows.
#[derive(Error, Debug)]
pub enum AccountError {
    #[error("User {0} already exists")]
    AlreadyRegistered(String),

    #[error("Email must not be empty")]
    InvalidEmail,

    #[error("No user registered with that email")]
    UnknownUser,

    #[error("Invalid reset token")]
    InvalidResetToken,

    #[error(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown AUTH_TYPE: {0}")]
    UnknownStrategy(String),
}
