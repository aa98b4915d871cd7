use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use super::{by_email, by_reset_token, Hasher, User, UserRepo};
use crate::error::AccountError;

/// Registration, login checks and password reset on top of a user repo.
///
/// Registration is where identifier uniqueness is enforced: Basic
/// authentication assumes at most one user per email. The check and the
/// save run under a lock shared by all clones of one service, so
/// uniqueness holds only while a single service writes the user table.
#[derive(Clone)]
pub struct AccountService {
    users: Arc<dyn UserRepo>,
    hasher: Arc<dyn Hasher>,
    registration: Arc<Mutex<()>>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserRepo>, hasher: Arc<dyn Hasher>) -> Self {
        Self {
            users,
            hasher,
            registration: Arc::new(Mutex::new(())),
        }
    }

    pub fn register_user(&self, email: &str, password: &str) -> Result<User, AccountError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AccountError::InvalidEmail);
        }
        let hashed_password = self.hasher.hash(password)?;

        let _guard = self.registration.lock();
        if !self.users.find_by(&by_email(email))?.is_empty() {
            return Err(AccountError::AlreadyRegistered(email.to_string()));
        }
        let user = User {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            hashed_password,
            reset_token: None,
        };
        self.users.save(&user)?;
        info!(user_id = %user.id, "Registered user");
        Ok(user)
    }

    /// `Ok(false)` for an unknown email or a wrong password.
    pub fn valid_login(&self, email: &str, password: &str) -> Result<bool, AccountError> {
        Ok(self
            .user_by_email(email)?
            .map(|user| self.hasher.verify(password, &user.hashed_password))
            .unwrap_or(false))
    }

    pub fn user_by_email(&self, email: &str) -> Result<Option<User>, AccountError> {
        Ok(self.users.find_by(&by_email(email.trim()))?.into_iter().next())
    }

    /// Issue a one-time token that authorizes [`Self::update_password`].
    pub fn reset_password_token(&self, email: &str) -> Result<String, AccountError> {
        let mut user = self.user_by_email(email)?.ok_or(AccountError::UnknownUser)?;
        let token = Uuid::new_v4().to_string();
        user.reset_token = Some(token.clone());
        self.users.save(&user)?;
        debug!(user_id = %user.id, "Issued password reset token");
        Ok(token)
    }

    /// Replace the password of the user holding `reset_token`. The token
    /// is consumed.
    pub fn update_password(&self, reset_token: &str, password: &str) -> Result<(), AccountError> {
        if reset_token.is_empty() {
            return Err(AccountError::InvalidResetToken);
        }
        let mut user = self
            .users
            .find_by(&by_reset_token(reset_token))?
            .into_iter()
            .next()
            .ok_or(AccountError::InvalidResetToken)?;

        user.hashed_password = self.hasher.hash(password)?;
        user.reset_token = None;
        self.users.save(&user)?;
        info!(user_id = %user.id, "Password updated");
        Ok(())
    }
}
