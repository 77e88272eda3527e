//! Credential handling.
//!
//! A [`PasswordHash`] can only be produced by [`PasswordHasher::hash`] or by
//! loading an existing hash from storage, so a user record never carries a
//! clear-text password.

use crate::error::{AppError, Result};

/// Dummy hash for timing-safe comparison when the account does not exist.
const DUMMY_HASH: &str = "$2b$12$LJ3m4ys3Lg2VBe.LBsDMzuCdNhJFUJShHTzu/hNRccWFEMOAb.Kze";

#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// The only way to build a credential for a new account.
    pub fn hash(&self, password: &str) -> Result<PasswordHash> {
        bcrypt::hash(password.as_bytes(), self.cost)
            .map(PasswordHash)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to hash password: {}", e)))
    }
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

#[derive(Debug, Clone)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn from_stored(hash: String) -> Self {
        PasswordHash(hash)
    }

    pub fn verify(&self, password: &str) -> Result<bool> {
        bcrypt::verify(password.as_bytes(), &self.0)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to verify password: {}", e)))
    }

    /// Burn the same amount of work as a real check.
    pub fn verify_dummy(password: &str) {
        let _ = bcrypt::verify(password.as_bytes(), DUMMY_HASH);
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Validate password meets security requirements.
pub fn validate_password(password: &str) -> std::result::Result<(), String> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }
    if password.len() > 72 {
        return Err("Password must be at most 72 characters".to_string());
    }
    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Err("Password must contain at least one letter and one digit".to_string());
    }
    Ok(())
}
