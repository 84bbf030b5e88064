use crate::{
    AppState,
    auth::AuthUser,
    errors::ApiError,
    models::{
        LoginRequest, LoginResponse, MessageResponse, NewUser, ProfileChanges, ProfileResponse,
        RegisterRequest, Role, UpdateProfileRequest, UpdateProfileResponse, UserListResponse,
        UserProfile,
    },
    password,
    repository::StoreError,
};
use axum::{Json, extract::State, http::StatusCode};

// Unknown username and wrong password share one external answer so the login
// endpoint cannot be used to enumerate accounts. The distinct cause is logged.
fn invalid_credentials() -> ApiError {
    ApiError::Validation("Invalid username or password".to_string())
}

// --- Handlers ---

/// register
///
/// [Public Route] Creates a new identity with the default `user` role.
///
/// *Flow*: validate presence of all three fields, pre-check uniqueness of
/// username and email, hash the password, persist. The store's unique
/// constraints remain authoritative: a concurrent duplicate that slips past
/// the pre-check loses at insert time with the same conflict answer.
///
/// Registration does not log the user in; the client follows with POST /login.
#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = MessageResponse),
        (status = 400, description = "Missing fields or duplicate", body = MessageResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    // 1. Input Validation
    if payload.username.trim().is_empty()
        || payload.email.trim().is_empty()
        || payload.password.is_empty()
    {
        return Err(ApiError::Validation("All fields are required".to_string()));
    }

    // 2. Check for Existing User
    if state
        .repo
        .find_by_username_or_email(&payload.username, &payload.email)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict(
            "Username or Email is already registered".to_string(),
        ));
    }

    // 3. Hash Password (runs on the blocking pool, see password module)
    let password_hash = password::hash(payload.password).await?;

    // 4. Persist the new identity
    let new_user = NewUser {
        username: payload.username,
        email: payload.email,
        password_hash,
        role: Role::User,
    };
    if let Err(err) = state.repo.insert(new_user).await {
        return Err(match err {
            // Write race on username/email: same answer as the pre-check.
            StoreError::Duplicate(_) => ApiError::Conflict(
                "Username or Email is already registered".to_string(),
            ),
            other => other.into(),
        });
    }

    // 5. Success Response
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "User registered successfully!".to_string(),
        }),
    ))
}

/// login
///
/// [Public Route] Verifies credentials and issues a bearer token.
///
/// Unknown user and password mismatch are distinguished internally (debug
/// logs) but surface as one identical 400, closing the account-enumeration
/// channel the status-code contract would otherwise open.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Invalid credentials", body = MessageResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    // 1. Input Validation
    if payload.username.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiError::Validation("All fields are required".to_string()));
    }

    // 2. Find User by Username
    let Some(user) = state.repo.find_by_username(&payload.username).await? else {
        tracing::debug!(username = %payload.username, "login rejected: unknown username");
        return Err(invalid_credentials());
    };

    // 3. Validate Password (constant-time comparison inside the hasher)
    if !password::verify(payload.password, user.password_hash.clone()).await? {
        tracing::debug!(username = %payload.username, "login rejected: password mismatch");
        return Err(invalid_credentials());
    }

    // 4. Issue the token from a snapshot of the identity
    let profile = UserProfile::from(&user);
    let token = state.tokens.issue(&profile)?;

    // 5. Success Response with Token
    Ok(Json(LoginResponse {
        message: "Login successful".to_string(),
        token,
    }))
}

/// get_me
///
/// [Authenticated Route] Returns the requesting user's own profile.
/// The identity was resolved (and re-fetched from the store) by the
/// authentication gate, so this is a pure projection.
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Profile", body = ProfileResponse),
        (status = 401, description = "Unauthenticated", body = MessageResponse)
    )
)]
pub async fn get_me(user: AuthUser) -> Json<ProfileResponse> {
    Json(ProfileResponse {
        id: user.id,
        username: user.username,
        email: user.email,
        role: user.role,
    })
}

/// update_me
///
/// [Authenticated Route] Selectively replaces username/email/password on the
/// requesting user's own record. Absent or empty fields are left untouched;
/// a supplied password is re-hashed before it goes anywhere near the store.
///
/// Uniqueness violations surface as 400 conflict, distinct from 404 (the
/// record disappeared between authentication and update) and 500.
#[utoipa::path(
    put,
    path = "/me",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated", body = UpdateProfileResponse),
        (status = 400, description = "Duplicate username or email", body = MessageResponse),
        (status = 404, description = "Record gone", body = MessageResponse)
    )
)]
pub async fn update_me(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<UpdateProfileResponse>, ApiError> {
    let mut changes = ProfileChanges {
        username: payload.username.filter(|s| !s.trim().is_empty()),
        email: payload.email.filter(|s| !s.trim().is_empty()),
        password_hash: None,
    };
    if let Some(plaintext) = payload.password.filter(|s| !s.is_empty()) {
        changes.password_hash = Some(password::hash(plaintext).await?);
    }

    let updated = match state.repo.update_by_id(user.id, changes).await {
        Ok(Some(profile)) => profile,
        Ok(None) => return Err(ApiError::NotFound("User not found.".to_string())),
        Err(StoreError::Duplicate(_)) => {
            return Err(ApiError::Conflict(
                "Username or email is already in use.".to_string(),
            ));
        }
        Err(other) => return Err(other.into()),
    };

    Ok(Json(UpdateProfileResponse {
        message: "Profile updated successfully!".to_string(),
        user: ProfileResponse::from(&updated),
    }))
}

/// delete_me
///
/// [Authenticated Route] Removes the requesting user's own record. Every
/// previously issued token for this identity dies at the authentication
/// gate's re-fetch from this point on.
#[utoipa::path(
    delete,
    path = "/me",
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 404, description = "Already gone", body = MessageResponse)
    )
)]
pub async fn delete_me(
    user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, ApiError> {
    if state.repo.delete_by_id(user.id).await? {
        Ok(Json(MessageResponse {
            message: "Profile deleted successfully!".to_string(),
        }))
    } else {
        Err(ApiError::NotFound("User not found.".to_string()))
    }
}

/// list_users
///
/// [Admin Route] Lists every identity, passwords excluded at the query level.
///
/// *Authorization*: the admin role check lives in the route-level
/// `require_role` gate, not here; the handler itself is a plain read.
#[utoipa::path(
    get,
    path = "/admin/users",
    responses(
        (status = 200, description = "All users", body = UserListResponse),
        (status = 403, description = "Insufficient role", body = MessageResponse)
    )
)]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<UserListResponse>, ApiError> {
    let users = state.repo.list_all().await?;
    Ok(Json(UserListResponse {
        count: users.len(),
        users,
    }))
}
