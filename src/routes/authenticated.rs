use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Defines the routes accessible to any user who has successfully passed the
/// authentication gate: a user's view of, and control over, their own record.
///
/// Access Control Strategy:
/// Every handler in this module relies on the `auth_middleware` layer applied
/// in `create_router`. The middleware resolves the bearer token into an
/// `AuthUser` (re-fetched from the store) and attaches it to the request, so
/// handlers receive a validated identity and never see the raw token.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET/PUT/DELETE /me
        // The caller's own record: read the profile, selectively update
        // username/email/password, or remove it entirely (after which every
        // outstanding token for the identity dies at the authentication gate).
        .route(
            "/me",
            get(handlers::get_me)
                .put(handlers::update_me)
                .delete(handlers::delete_me),
        )
}
