/// Password Policy, Hashing and Verification
///
/// Hashing uses bcrypt and runs on tokio's blocking pool so a slow hash never
/// stalls a worker thread.

use bcrypt::{hash, verify, BcryptError};
use tokio::task::JoinError;

const MIN_PASSWORD_LENGTH: usize = 6;
const MIN_UNIQUE_CHARS: usize = 1;

/// Check `password` against the policy, returning every rule it breaks
///
/// Requirements:
/// - Minimum 6 characters
/// - At least one non-alphanumeric character
/// - At least one digit
/// - At least one lowercase letter
/// - At least one uppercase letter
/// - At least 1 distinct character
pub fn password_policy_violations(password: &str) -> Vec<String> {
    let mut errors = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push(format!(
            "Passwords must be at least {} characters.",
            MIN_PASSWORD_LENGTH
        ));
    }
    if password.chars().all(|c| c.is_ascii_alphanumeric()) {
        errors.push("Passwords must have at least one non alphanumeric character.".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("Passwords must have at least one digit ('0'-'9').".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        errors.push("Passwords must have at least one lowercase ('a'-'z').".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        errors.push("Passwords must have at least one uppercase ('A'-'Z').".to_string());
    }

    let mut distinct: Vec<char> = password.chars().collect();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.len() < MIN_UNIQUE_CHARS {
        errors.push(format!(
            "Passwords must use at least {} different characters.",
            MIN_UNIQUE_CHARS
        ));
    }

    errors
}

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("bcrypt failed: {0}")]
    Bcrypt(#[from] BcryptError),
    #[error("password hashing task failed: {0}")]
    Task(#[from] JoinError),
}

/// Hash a password with bcrypt at `cost`
pub async fn hash_password(password: String, cost: u32) -> Result<String, PasswordError> {
    let hashed = tokio::task::spawn_blocking(move || hash(password, cost)).await??;
    Ok(hashed)
}

/// Verify a password against its bcrypt hash
///
/// A stored hash bcrypt cannot parse is an error, not a mismatch.
pub async fn verify_password(
    password: String,
    password_hash: String,
) -> Result<bool, PasswordError> {
    let matches = tokio::task::spawn_blocking(move || verify(password, &password_hash)).await??;
    Ok(matches)
}
