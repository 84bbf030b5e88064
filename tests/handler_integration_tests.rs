use account_portal::{
    AppState,
    config::AppConfig,
    create_router, handlers,
    models::{
        LoginRequest, NewUser, ProfileChanges, RegisterRequest, Role, UpdateProfileRequest, User,
        UserProfile,
    },
    password,
    repository::{Repository, StoreError},
    token::TokenService,
};
use async_trait::async_trait;
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode, header},
};
use chrono::Utc;
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;
use uuid::Uuid;

// --- In-Memory Repository ---

// A functional store standing in for Postgres: enforces username/email
// uniqueness the way the real table's constraints do, so handler flows
// (including write races surfaced as Duplicate) behave end-to-end.
#[derive(Default)]
struct InMemoryRepo {
    users: Mutex<Vec<User>>,
}

#[async_trait]
impl Repository for InMemoryRepo {
    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .find(|u| u.username == username || u.email == email)
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.id == id).map(UserProfile::from))
    }

    async fn insert(&self, user: NewUser) -> Result<UserProfile, StoreError> {
        let mut users = self.users.lock().unwrap();
        if users
            .iter()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(StoreError::Duplicate("users_username_key".to_string()));
        }
        let now = Utc::now();
        let record = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            role: user.role,
            created_at: now,
            updated_at: now,
        };
        users.push(record.clone());
        Ok(UserProfile::from(&record))
    }

    async fn update_by_id(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> Result<Option<UserProfile>, StoreError> {
        let mut users = self.users.lock().unwrap();
        // Unique-constraint check against every other record first.
        if let Some(new_username) = &changes.username {
            if users.iter().any(|u| u.id != id && &u.username == new_username) {
                return Err(StoreError::Duplicate("users_username_key".to_string()));
            }
        }
        if let Some(new_email) = &changes.email {
            if users.iter().any(|u| u.id != id && &u.email == new_email) {
                return Err(StoreError::Duplicate("users_email_key".to_string()));
            }
        }
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(username) = changes.username {
            user.username = username;
        }
        if let Some(email) = changes.email {
            user.email = email;
        }
        if let Some(password_hash) = changes.password_hash {
            user.password_hash = password_hash;
        }
        user.updated_at = Utc::now();
        Ok(Some(UserProfile::from(&*user)))
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut users = self.users.lock().unwrap();
        let before = users.len();
        users.retain(|u| u.id != id);
        Ok(users.len() < before)
    }

    async fn list_all(&self) -> Result<Vec<UserProfile>, StoreError> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().map(UserProfile::from).collect())
    }
}

// --- Test Utilities ---

const TEST_JWT_SECRET: &str = "handler-test-secret-0987654321";

fn create_test_state() -> AppState {
    let mut config = AppConfig::default();
    config.jwt_secret = TEST_JWT_SECRET.to_string();

    AppState {
        repo: Arc::new(InMemoryRepo::default()),
        tokens: TokenService::new(TEST_JWT_SECRET, 3600).unwrap(),
        config,
    }
}

fn register_payload(username: &str, email: &str, password: &str) -> RegisterRequest {
    RegisterRequest {
        username: username.to_string(),
        email: email.to_string(),
        password: password.to_string(),
    }
}

// Seeds an account with a real hash; the repository stores whatever role it
// is given, which is how admin accounts exist (registration only makes users).
async fn seed_user(state: &AppState, username: &str, email: &str, plaintext: &str, role: Role) {
    let password_hash = password::hash(plaintext.to_string()).await.unwrap();
    state
        .repo
        .insert(NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            role,
        })
        .await
        .unwrap();
}

// --- Direct Handler Tests ---

#[tokio::test]
async fn test_register_success() {
    let state = create_test_state();

    let result = handlers::register(
        State(state.clone()),
        Json(register_payload("alice", "a@x.com", "secret1")),
    )
    .await;

    let (status, Json(body)) = result.unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body.message, "User registered successfully!");

    // Persisted with default role and a hash, never the plaintext.
    let stored = state
        .repo
        .find_by_username("alice")
        .await
        .unwrap()
        .expect("user should be stored");
    assert_eq!(stored.role, Role::User);
    assert_ne!(stored.password_hash, "secret1");
    assert!(stored.password_hash.starts_with("$argon2"));
}

#[tokio::test]
async fn test_register_missing_fields() {
    let state = create_test_state();

    let err = handlers::register(
        State(state),
        Json(register_payload("alice", "", "secret1")),
    )
    .await
    .unwrap_err();

    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    assert_eq!(err.to_string(), "All fields are required");
}

#[tokio::test]
async fn test_register_duplicate_username() {
    let state = create_test_state();

    handlers::register(
        State(state.clone()),
        Json(register_payload("alice", "a@x.com", "secret1")),
    )
    .await
    .unwrap();

    // Same username, different email.
    let err = handlers::register(
        State(state),
        Json(register_payload("alice", "other@x.com", "secret2")),
    )
    .await
    .unwrap_err();

    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    assert_eq!(err.to_string(), "Username or Email is already registered");
}

#[tokio::test]
async fn test_register_duplicate_email_different_username() {
    let state = create_test_state();

    handlers::register(
        State(state.clone()),
        Json(register_payload("alice", "a@x.com", "secret1")),
    )
    .await
    .unwrap();

    let err = handlers::register(
        State(state),
        Json(register_payload("bob", "a@x.com", "secret2")),
    )
    .await
    .unwrap_err();

    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    assert_eq!(err.to_string(), "Username or Email is already registered");
}

#[tokio::test]
async fn test_login_success_returns_verifiable_token() {
    let state = create_test_state();
    seed_user(&state, "alice", "a@x.com", "secret1", Role::User).await;

    let Json(body) = handlers::login(
        State(state.clone()),
        Json(LoginRequest {
            username: "alice".to_string(),
            password: "secret1".to_string(),
        }),
    )
    .await
    .unwrap();

    assert_eq!(body.message, "Login successful");

    // Claims must snapshot the identity at issuance.
    let claims = state.tokens.verify(&body.token).unwrap();
    assert_eq!(claims.username, "alice");
    assert_eq!(claims.email, "a@x.com");
    assert_eq!(claims.role, Role::User);
}

#[tokio::test]
async fn test_login_unknown_user_and_bad_password_are_indistinguishable() {
    let state = create_test_state();
    seed_user(&state, "alice", "a@x.com", "secret1", Role::User).await;

    let unknown = handlers::login(
        State(state.clone()),
        Json(LoginRequest {
            username: "nobody".to_string(),
            password: "whatever".to_string(),
        }),
    )
    .await
    .unwrap_err();

    let mismatch = handlers::login(
        State(state),
        Json(LoginRequest {
            username: "alice".to_string(),
            password: "wrong".to_string(),
        }),
    )
    .await
    .unwrap_err();

    // Same status, same message: no account enumeration through login.
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);
    assert_eq!(mismatch.status(), StatusCode::BAD_REQUEST);
    assert_eq!(unknown.to_string(), mismatch.to_string());
}

#[tokio::test]
async fn test_update_me_rehashes_password() {
    let state = create_test_state();
    seed_user(&state, "alice", "a@x.com", "secret1", Role::User).await;
    let profile = state
        .repo
        .find_by_username("alice")
        .await
        .unwrap()
        .unwrap();

    let auth_user = account_portal::auth::AuthUser {
        id: profile.id,
        username: profile.username.clone(),
        email: profile.email.clone(),
        role: profile.role,
    };

    let Json(response) = handlers::update_me(
        auth_user,
        State(state.clone()),
        Json(UpdateProfileRequest {
            password: Some("newsecret".to_string()),
            ..UpdateProfileRequest::default()
        }),
    )
    .await
    .unwrap();

    assert_eq!(response.message, "Profile updated successfully!");

    // Old password dead, new password live.
    let stored = state
        .repo
        .find_by_username("alice")
        .await
        .unwrap()
        .unwrap();
    assert!(
        !password::verify("secret1".to_string(), stored.password_hash.clone())
            .await
            .unwrap()
    );
    assert!(
        password::verify("newsecret".to_string(), stored.password_hash)
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_update_me_conflict_on_taken_username() {
    let state = create_test_state();
    seed_user(&state, "alice", "a@x.com", "secret1", Role::User).await;
    seed_user(&state, "bob", "b@x.com", "secret2", Role::User).await;

    let bob = state.repo.find_by_username("bob").await.unwrap().unwrap();
    let auth_user = account_portal::auth::AuthUser {
        id: bob.id,
        username: bob.username.clone(),
        email: bob.email.clone(),
        role: bob.role,
    };

    let err = handlers::update_me(
        auth_user,
        State(state),
        Json(UpdateProfileRequest {
            username: Some("alice".to_string()),
            ..UpdateProfileRequest::default()
        }),
    )
    .await
    .unwrap_err();

    assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    assert_eq!(err.to_string(), "Username or email is already in use.");
}

#[tokio::test]
async fn test_list_users_counts_and_excludes_passwords() {
    let state = create_test_state();
    seed_user(&state, "alice", "a@x.com", "secret1", Role::User).await;
    seed_user(&state, "root", "root@x.com", "secret2", Role::Admin).await;

    let Json(listing) = handlers::list_users(State(state)).await.unwrap();

    assert_eq!(listing.count, 2);
    assert_eq!(listing.users.len(), 2);

    // The serialized listing must not leak any password material.
    let serialized = serde_json::to_string(&listing).unwrap();
    assert!(!serialized.contains("password"));
}

// --- Full Router Flow ---

fn json_request(method: Method, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn bearer_request(method: Method, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// The full account lifecycle, driven through the real router and gates:
/// register, login (good and bad), read the profile, delete it, and watch the
/// surviving token die at the authentication gate's re-fetch.
#[tokio::test]
async fn test_account_lifecycle_end_to_end() {
    let state = create_test_state();
    let app = create_router(state);

    // register -> 201
    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/register",
            serde_json::json!({"username": "alice", "email": "a@x.com", "password": "secret1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // login with the right password -> 200 + token
    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/login",
            serde_json::json!({"username": "alice", "password": "secret1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let token = body["token"].as_str().expect("token in body").to_string();

    // login with the wrong password -> 400
    let response = app
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/login",
            serde_json::json!({"username": "alice", "password": "wrong"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // GET /me with the token -> 200 {username: "alice", role: "user"}
    let response = app
        .clone()
        .oneshot(bearer_request(Method::GET, "/me", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["username"], "alice");
    assert_eq!(body["role"], "user");
    assert!(body.get("password").is_none());
    assert!(body.get("password_hash").is_none());

    // DELETE /me -> 200
    let response = app
        .clone()
        .oneshot(bearer_request(Method::DELETE, "/me", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // GET /me with the same, still-unexpired token -> 401 (identity gone)
    let response = app
        .oneshot(bearer_request(Method::GET, "/me", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_without_token_is_unauthorized() {
    let state = create_test_state();
    let app = create_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri("/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_listing_requires_admin_role() {
    let state = create_test_state();
    seed_user(&state, "alice", "a@x.com", "secret1", Role::User).await;
    seed_user(&state, "root", "root@x.com", "hunter2", Role::Admin).await;
    let app = create_router(state.clone());

    let login = |username: &str, password: &str| {
        json_request(
            Method::POST,
            "/login",
            serde_json::json!({"username": username, "password": password}),
        )
    };

    // Non-admin: authenticated but forbidden.
    let response = app.clone().oneshot(login("alice", "secret1")).await.unwrap();
    let user_token = body_json(response).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .clone()
        .oneshot(bearer_request(Method::GET, "/admin/users", &user_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Admin: full listing with count, passwords absent.
    let response = app.clone().oneshot(login("root", "hunter2")).await.unwrap();
    let admin_token = body_json(response).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .oneshot(bearer_request(Method::GET, "/admin/users", &admin_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["users"].as_array().unwrap().len(), 2);
    assert!(!body.to_string().contains("password"));
}
