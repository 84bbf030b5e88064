/// Router Module Index
///
/// Organizes the application's routing logic into security-segregated modules.
/// Access control is applied explicitly at the module level (via Axum layers
/// in `create_router`), preventing accidental exposure of protected endpoints.
///
/// The three modules map directly to the defined access tiers.

/// Routes accessible to all clients: liveness, registration, login.
pub mod public;

/// Routes protected by the authentication gate. Requires a valid bearer token
/// backed by a live identity record.
pub mod authenticated;

/// Routes restricted to the 'admin' role via the authorization gate.
pub mod admin;
