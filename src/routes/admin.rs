use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Admin Router Module
///
/// Defines the routes exclusively accessible to users with the 'admin' role.
///
/// Access Control:
/// This entire router is wrapped (in `create_router`) first by the
/// authentication middleware and then by the `require_role` gate configured
/// with the admin role set. Handlers here contain no role checks of their own;
/// a request that reaches them has already been authenticated and authorized.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/users
        // Lists every identity (count + records, passwords excluded).
        .route("/users", get(handlers::list_users))
}
