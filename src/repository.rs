use crate::models::{NewUser, ProfileChanges, User, UserProfile};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

/// StoreError
///
/// Failures of the persistence layer. Uniqueness violations are surfaced as a
/// dedicated variant so callers can distinguish "username/email already taken"
/// from a genuine database failure; the store's unique constraints are also
/// what rejects write races, so this variant is the authoritative duplicate
/// signal, not the handlers' pre-checks.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    Duplicate(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

// Uniqueness violations come back from Postgres as a database error with
// SQLSTATE 23505; everything else stays a plain database failure.
fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            let constraint = db_err.constraint().unwrap_or("username or email");
            return StoreError::Duplicate(constraint.to_string());
        }
    }
    StoreError::Database(err)
}

/// Repository Trait
///
/// Defines the abstract contract for all persistence operations, allowing the
/// handlers and the authentication gate to interact with the data layer
/// without knowing the specific implementation (Postgres, in-memory mock).
///
/// **Send + Sync + async_trait** are required to make the trait object
/// (`Arc<dyn Repository>`) safely shareable across Axum's asynchronous task
/// boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Lookup ---
    // Registration uniqueness pre-check: matches either column.
    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError>;
    // Login lookup. Returns the full record including the password hash.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    /// Identity re-fetch for authenticated requests. The password column is
    /// excluded at the query level.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, StoreError>;

    // --- Mutation ---
    async fn insert(&self, user: NewUser) -> Result<UserProfile, StoreError>;
    // Selective field replacement; None leaves a column untouched.
    // Returns None when the record no longer exists.
    async fn update_by_id(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> Result<Option<UserProfile>, StoreError>;
    // Returns true only if a row was actually removed.
    async fn delete_by_id(&self, id: Uuid) -> Result<bool, StoreError>;

    // --- Admin ---
    /// All identities, passwords excluded.
    async fn list_all(&self) -> Result<Vec<UserProfile>, StoreError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer access across the
/// application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by the
/// PostgreSQL `users` table.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Column lists kept in one place so the password-excluding projection cannot
// drift between queries.
const RECORD_COLUMNS: &str = "id, username, email, password_hash, role, created_at, updated_at";
const PROFILE_COLUMNS: &str = "id, username, email, role, created_at, updated_at";

#[async_trait]
impl Repository for PostgresRepository {
    async fn find_by_username_or_email(
        &self,
        username: &str,
        email: &str,
    ) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {RECORD_COLUMNS} FROM users WHERE username = $1 OR email = $2");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(username)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let query = format!("SELECT {RECORD_COLUMNS} FROM users WHERE username = $1");
        let user = sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<UserProfile>, StoreError> {
        let query = format!("SELECT {PROFILE_COLUMNS} FROM users WHERE id = $1");
        let profile = sqlx::query_as::<_, UserProfile>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(profile)
    }

    /// insert
    ///
    /// Creates the identity record. Duplicate username/email races that slip
    /// past the handler's pre-check land here as `StoreError::Duplicate` via
    /// the table's unique constraints.
    async fn insert(&self, user: NewUser) -> Result<UserProfile, StoreError> {
        let query = format!(
            "INSERT INTO users (id, username, email, password_hash, role, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, NOW(), NOW()) \
             RETURNING {PROFILE_COLUMNS}"
        );
        sqlx::query_as::<_, UserProfile>(&query)
            .bind(Uuid::new_v4())
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
    }

    /// update_by_id
    ///
    /// Uses the PostgreSQL `COALESCE` function to handle `Option<T>` fields,
    /// only replacing a column when the corresponding change is `Some`.
    async fn update_by_id(
        &self,
        id: Uuid,
        changes: ProfileChanges,
    ) -> Result<Option<UserProfile>, StoreError> {
        let query = format!(
            "UPDATE users \
             SET username = COALESCE($2, username), \
                 email = COALESCE($3, email), \
                 password_hash = COALESCE($4, password_hash), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {PROFILE_COLUMNS}"
        );
        sqlx::query_as::<_, UserProfile>(&query)
            .bind(id)
            .bind(changes.username)
            .bind(changes.email)
            .bind(changes.password_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_all(&self) -> Result<Vec<UserProfile>, StoreError> {
        let query = format!("SELECT {PROFILE_COLUMNS} FROM users ORDER BY created_at ASC");
        let users = sqlx::query_as::<_, UserProfile>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }
}
