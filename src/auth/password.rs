//! Password hashing with bcrypt.

use tracing::error;

/// Hash a password at the given bcrypt cost.
pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, cost)
}

/// A hash of a throwaway password at `cost`.
///
/// Logins for unknown accounts verify against it so they cost the same
/// bcrypt work as a wrong password.
pub fn dummy_hash(cost: u32) -> String {
    hash_password("taskgate-unknown-account", cost).unwrap_or_else(|e| {
        error!(error = %e, "Failed to build placeholder password hash");
        String::new()
    })
}

/// Failure to hash a password off the async executor.
#[derive(Debug)]
pub enum PasswordError {
    Hash(bcrypt::BcryptError),
    TaskFailed,
}

impl std::fmt::Display for PasswordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordError::Hash(e) => write!(f, "Password hashing failed: {}", e),
            PasswordError::TaskFailed => write!(f, "Password hashing task failed"),
        }
    }
}

impl std::error::Error for PasswordError {}

/// [`hash_password`] on the blocking thread pool.
pub async fn spawn_hash(password: String, cost: u32) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_password(&password, cost))
        .await
        .map_err(|_| PasswordError::TaskFailed)?
        .map_err(PasswordError::Hash)
}

/// [`verify_password`] on the blocking thread pool.
pub async fn spawn_verify(password: String, hash: String) -> bool {
    match tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await {
        Ok(matches) => matches,
        Err(e) => {
            error!(error = %e, "Password verification task failed");
            false
        }
    }
}

/// Check a password against a stored hash.
///
/// A malformed stored hash is logged and treated as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match bcrypt::verify(password, hash) {
        Ok(matches) => matches,
        Err(e) => {
            error!(error = %e, "Stored password hash could not be verified");
            false
        }
    }
}
