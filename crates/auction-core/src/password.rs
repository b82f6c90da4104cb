// Account passwords: Argon2id hashing and the signup/login checks built on it.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use thiserror::Error;

use crate::db::Database;
use crate::error::{AuctionError, AuctionResult};
use crate::model::User;

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("failed to hash password: {0}")]
    HashingFailed(String),

    #[error("failed to verify password: {0}")]
    VerificationFailed(String),

    #[error("invalid password hash format: {0}")]
    InvalidHashFormat(String),
}

impl From<PasswordError> for AuctionError {
    fn from(err: PasswordError) -> Self {
        AuctionError::StorageFault(err.to_string())
    }
}

/// Hash a password with Argon2id and a fresh random salt. The result is a
/// PHC string suitable for storage.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::HashingFailed(e.to_string()))
}

/// Check `password` against a stored PHC hash. A mismatch is `Ok(false)`;
/// only a malformed hash or an internal failure is an error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed =
        PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHashFormat(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerificationFailed(e.to_string())),
    }
}

fn normalize_email(email: &str) -> AuctionResult<String> {
    let email = email.trim().to_ascii_lowercase();
    let valid = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
        .unwrap_or(false);
    if !valid {
        return Err(AuctionError::validation(format!("invalid email address: {email}")));
    }
    Ok(email)
}

impl Database {
    /// Create an account. Emails are compared case-insensitively.
    pub fn register_user(&self, email: &str, password: &str) -> AuctionResult<User> {
        let email = normalize_email(email)?;
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuctionError::validation(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let hash = hash_password(password)?;
        let user = self.create_user(&email, &hash)?;
        tracing::info!(user_id = user.id, email = %user.email, "user registered");
        Ok(user)
    }

    /// Look up an account and check its password. Unknown emails and wrong
    /// passwords fail the same way.
    pub fn authenticate(&self, email: &str, password: &str) -> AuctionResult<User> {
        let email = normalize_email(email).map_err(|_| AuctionError::InvalidCredentials)?;
        let user = self
            .find_user_by_email(&email)?
            .ok_or(AuctionError::InvalidCredentials)?;
        if !verify_password(password, &user.password_hash)? {
            tracing::warn!(user_id = user.id, "login rejected: wrong password");
            return Err(AuctionError::InvalidCredentials);
        }
        Ok(user)
    }
}
