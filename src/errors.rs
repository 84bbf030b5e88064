use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{password::PasswordError, repository::StoreError, token::TokenError};

/// ApiError
///
/// The application-wide error taxonomy. Every failure a handler or gate can
/// produce is one of these variants, and each variant carries its HTTP status:
///
/// - `Validation`: bad or missing input (400)
/// - `Conflict`: uniqueness violation (400)
/// - `Unauthenticated`: missing, invalid, or expired token, or unknown principal (401)
/// - `Forbidden`: authenticated but insufficient role (403)
/// - `NotFound`: target record gone (404)
/// - `Internal`: unexpected store/config failure (500)
///
/// Authentication failures stay distinguishable by message (expired vs invalid
/// vs absent) while all collapsing to 401 externally.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    /// The payload is the server-side detail; it is logged, never sent.
    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        ApiError::Internal(detail.into())
    }
}

impl IntoResponse for ApiError {
    /// Renders the error as `{"message": ...}` JSON with the taxonomy status.
    /// Internal failures log their detail here and send only the generic
    /// message, so no store or config error text reaches the client.
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!("internal error: {detail}");
        }
        let status = self.status();
        (status, Json(json!({ "message": self.to_string() }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(_) => {
                ApiError::Conflict("Username or email is already in use.".to_string())
            }
            StoreError::Database(e) => ApiError::internal(format!("store error: {e}")),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::internal(format!("password error: {err}"))
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => {
                ApiError::Unauthenticated("Unauthorized: Token has expired.".to_string())
            }
            TokenError::Invalid => {
                ApiError::Unauthenticated("Unauthorized: Invalid token.".to_string())
            }
            TokenError::MissingSecret | TokenError::Signing => {
                ApiError::internal(format!("token error: {err}"))
            }
        }
    }
}
