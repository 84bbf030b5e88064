use jsonwebtoken::{
    DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::{Role, UserProfile};

/// Claims
///
/// The signed payload inside every issued token: a snapshot of the identity at
/// issuance time. Claims are not re-validated against the live record beyond
/// the existence lookup the authentication gate performs, so role or contact
/// changes take effect on the next request while a deleted identity kills its
/// tokens immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the UUID of the user, used to re-fetch the record on
    /// every authenticated request.
    pub sub: Uuid,
    pub username: String,
    pub email: String,
    pub role: Role,
    /// Issued At (iat): timestamp when the token was created.
    pub iat: usize,
    /// Expiration Time (exp): timestamp after which the token must not be
    /// accepted.
    pub exp: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// No signing secret configured. A startup-time fatal condition, not a
    /// per-request recoverable one.
    #[error("token signing secret is not configured")]
    MissingSecret,
    #[error("token has expired")]
    Expired,
    #[error("token is invalid")]
    Invalid,
    #[error("failed to sign token")]
    Signing,
}

/// TokenService
///
/// Issues and verifies the service's stateless bearer tokens (HS256 JWTs).
/// Built once at startup from the immutable configuration; no server-side
/// record of issued tokens exists, so a token dies only by expiry or by
/// deletion of the identity behind it.
#[derive(Clone, Debug)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: u64,
}

impl TokenService {
    /// Rejects an empty secret up front so a misconfigured deployment fails at
    /// startup instead of on the first login.
    pub fn new(secret: &str, ttl_secs: u64) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::MissingSecret);
        }
        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, TokenError> {
        Self::new(&config.jwt_secret, config.token_ttl_secs)
    }

    /// issue
    ///
    /// Builds claims from the identity's id/username/email/role, stamps
    /// expiry = now + TTL, and signs with the server-held secret.
    pub fn issue(&self, user: &UserProfile) -> Result<String, TokenError> {
        let now = unix_now();
        let claims = Claims {
            sub: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role,
            iat: now,
            exp: now + self.ttl_secs as usize,
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(|_| TokenError::Signing)
    }

    /// verify
    ///
    /// Checks signature integrity and expiry. Expiry is reported distinctly
    /// from every other failure (bad signature, malformed structure,
    /// unsupported algorithm) so callers can surface distinguishable messages.
    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();

        // Ensure expiration time validation is always active.
        validation.validate_exp = true;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }
}

fn unix_now() -> usize {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("system time before Unix epoch")
        .as_secs() as usize
}
