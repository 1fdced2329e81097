use crate::error::{AppError, AuthError};
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use rand::{distributions::Alphanumeric, Rng};

pub const MIN_PASSWORD_LEN: usize = 8;

/// Hash a password with Argon2id on the blocking pool.
pub async fn hash_password(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::InternalError(format!("password hashing failed: {}", e)))
    })
    .await?
}

/// Which scheme a stored hash matched under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordMatch {
    Argon2,
    /// Legacy `$2a$`/`$2b$`/`$2y$` hash; re-hash with argon2.
    Bcrypt,
}

impl PasswordMatch {
    pub fn needs_rehash(self) -> bool {
        self == PasswordMatch::Bcrypt
    }
}

fn is_bcrypt_hash(hash: &str) -> bool {
    ["$2a$", "$2b$", "$2x$", "$2y$"]
        .iter()
        .any(|prefix| hash.starts_with(prefix))
}

/// Verify a password against a stored argon2 PHC string or a legacy bcrypt
/// hash. A malformed hash counts as a mismatch so callers cannot tell the
/// cases apart.
pub async fn verify_password(password: String, stored_hash: String) -> Result<PasswordMatch, AppError> {
    tokio::task::spawn_blocking(move || {
        let mismatch = || AppError::AuthError(AuthError::InvalidCredentials);

        if is_bcrypt_hash(&stored_hash) {
            return match bcrypt::verify(&password, &stored_hash) {
                Ok(true) => Ok(PasswordMatch::Bcrypt),
                _ => Err(mismatch()),
            };
        }

        let parsed = PasswordHash::new(&stored_hash).map_err(|_| mismatch())?;
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .map(|_| PasswordMatch::Argon2)
            .map_err(|_| mismatch())
    })
    .await?
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Random secret for accounts that only sign in through Firebase.
pub fn random_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}
