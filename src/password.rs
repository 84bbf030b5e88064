use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

/// Failures of the credential hasher. `Hashing` covers internal failures of
/// the hash computation itself (never valid input); `MalformedHash` means the
/// stored hash string did not parse as a PHC record.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum PasswordError {
    #[error("failed to hash password")]
    Hashing,
    #[error("stored password hash is malformed")]
    MalformedHash,
}

fn salt() -> Result<SaltString, PasswordError> {
    use rand::Rng;
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    SaltString::encode_b64(&bytes).map_err(|_| PasswordError::Hashing)
}

fn hash_blocking(plaintext: &str) -> Result<String, PasswordError> {
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt()?)
        .map(|h| h.to_string())
        .map_err(|_| PasswordError::Hashing)
}

fn verify_blocking(plaintext: &str, hashword: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hashword).map_err(|_| PasswordError::MalformedHash)?;
    match Argon2::default().verify_password(plaintext.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(_) => Err(PasswordError::MalformedHash),
    }
}

/// hash
///
/// One-way Argon2id hash of a plaintext password with a fresh 16-byte random
/// salt. The result is a self-describing PHC string (algorithm, parameters,
/// and salt embedded), so verification needs no side channel.
///
/// The computation is intentionally expensive, so it runs on the blocking
/// thread pool rather than a runtime worker.
pub async fn hash(plaintext: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || hash_blocking(&plaintext))
        .await
        .map_err(|_| PasswordError::Hashing)?
}

/// verify
///
/// Recomputes the hash using the salt and parameters embedded in `hashword`
/// and compares in constant time (inside `argon2`), so timing does not
/// correlate with the number of matching characters. `Ok(false)` is a clean
/// mismatch; a hash that fails to parse is an error, not a mismatch.
pub async fn verify(plaintext: String, hashword: String) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || verify_blocking(&plaintext, &hashword))
        .await
        .map_err(|_| PasswordError::Hashing)?
}
