use axum::{
    extract::{FromRef, FromRequestParts, Request},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{errors::ApiError, models::Role, repository::RepositoryState, token::TokenService};

/// AuthUser
///
/// The resolved identity of an authenticated request: the core output of the
/// authentication gate. Handlers take it as an extractor argument; the
/// authorization gate reads it from request extensions. It never carries the
/// password hash.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Used for Role-Based Access Control by the authorization gate.
    pub role: Role,
}

/// AuthUser Extractor Implementation
///
/// Implements Axum's FromRequestParts trait, making AuthUser usable as a
/// function argument in any authenticated handler and as the basis of the
/// route-level auth middleware. The process:
/// 1. Reuse: return an identity already attached by `auth_middleware`.
/// 2. Token Extraction: standard `Authorization: Bearer <token>` parsing.
/// 3. Verification: signature + expiry via the TokenService.
/// 4. Store Lookup: re-fetch the identity by id, password excluded.
///
/// Step 4 runs on every request. That trades a store round-trip per request
/// for immediate revocation-on-delete: a token whose identity has been removed
/// dies here instead of surviving until expiry.
///
/// Rejection: 401-equivalent `ApiError::Unauthenticated`, with distinct
/// messages for absent/malformed header, expired token, invalid token, and
/// deleted identity.
impl<S> FromRequestParts<S> for AuthUser
where
    // S must allow sending across threads and sharing.
    S: Send + Sync,
    // Allows the extractor to pull the record store from the app state.
    RepositoryState: FromRef<S>,
    // Allows the extractor to pull the token verifier.
    TokenService: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // 1. Identity already resolved by the middleware on this request:
        // the store is hit once per request, not once per extraction.
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let repo = RepositoryState::from_ref(state);
        let tokens = TokenService::from_ref(state);

        // 2. Token Extraction
        // Retrieve the Authorization header and require the "Bearer " scheme.
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                ApiError::Unauthenticated(
                    "Unauthorized: No token provided or invalid format.".to_string(),
                )
            })?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            ApiError::Unauthenticated(
                "Unauthorized: No token provided or invalid format.".to_string(),
            )
        })?;

        // 3. Verify signature and expiry. Expired and invalid tokens both
        // collapse to 401 but keep distinguishable messages (via From<TokenError>).
        let claims = tokens.verify(token)?;

        // 4. Store Lookup (Final Verification)
        // The token is only as alive as the record behind it.
        let user = repo
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| ApiError::Unauthenticated("Unauthorized: User not found.".to_string()))?;

        Ok(AuthUser {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
        })
    }
}

/// require_role
///
/// The authorization gate: a pure predicate over the identity attached by the
/// authentication gate. Wired per protected route with an explicit set of
/// permitted roles; no side effects, no store access.
///
/// A missing identity (gate misordered or used standalone) is rejected as
/// 403, not 401: "you are nobody" is the upstream gate's verdict, this one
/// only ever says "you are somebody but not allowed".
pub async fn require_role(
    allowed: &'static [Role],
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(user) = request.extensions().get::<AuthUser>() else {
        return Err(ApiError::Forbidden(
            "Forbidden: User not authenticated.".to_string(),
        ));
    };
    if !allowed.contains(&user.role) {
        return Err(ApiError::Forbidden(format!(
            "Forbidden: User role '{}' is not authorized to access this route.",
            user.role
        )));
    }
    Ok(next.run(request).await)
}
