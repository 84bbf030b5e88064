use crate::{AppState, handlers};
use axum::{Router, routing::{get, post}};

/// Public Router Module
///
/// Defines endpoints that are **unauthenticated** and accessible to any client.
/// Registration and login are the identity gateway: they bypass the
/// authentication gate but use the credential hasher and token issuer directly.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // A simple, unauthenticated endpoint used for monitoring and load
        // balancer checks. Returns "ok" immediately.
        .route("/health", get(|| async { "ok" }))
        // POST /register
        // New identity creation. Fails on duplicate username/email; never
        // logs the caller in.
        .route("/register", post(handlers::register))
        // POST /login
        // Credential verification and token issuance.
        .route("/login", post(handlers::login))
}
