use bcrypt::{hash, verify, DEFAULT_COST};
use sqlx::PgPool;

use crate::error::ApiError;
use crate::models::auth::{ProfileFields, UserProfile};
use crate::token;

/// Persistent mapping of username to credentials, profile, and the single
/// active session token. Every operation is one round trip; cross-request
/// consistency comes from the unique indexes on `username` and
/// `session_token`, never from check-then-act in here.
#[derive(Clone)]
pub struct CredentialStore {
    pool: PgPool,
}

impl CredentialStore {
    pub fn new(pool: PgPool) -> Self {
        CredentialStore { pool }
    }

    /// Create a user with a bcrypt hash of the password. The insert itself
    /// arbitrates concurrent signups for the same username: the second one
    /// hits the unique index and maps to `Conflict`.
    pub async fn create(
        &self,
        username: &str,
        password: &str,
        profile: &ProfileFields,
    ) -> Result<(), ApiError> {
        let password_hash = hash(password, DEFAULT_COST)?;

        let result = sqlx::query(
            "INSERT INTO users (username, password_hash, full_name, email, phone_number, country)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(username)
        .bind(&password_hash)
        .bind(&profile.full_name)
        .bind(&profile.email)
        .bind(&profile.phone_number)
        .bind(&profile.country)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(ApiError::Conflict(
                format!("Username '{username}' already exists."),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Check the password and, on a match, rotate in a fresh session token.
    /// A missing user and a wrong password are the same `None` so callers
    /// cannot learn whether the username exists.
    pub async fn verify(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<(String, String)>, ApiError> {
        let row: Option<(String, String)> = sqlx::query_as(
            "SELECT username, password_hash FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        let (canonical_username, password_hash) = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        if !verify(password, &password_hash)? {
            return Ok(None);
        }

        let session_token = token::generate();
        sqlx::query(
            "UPDATE users SET session_token = $1, updated_at = NOW() WHERE username = $2",
        )
        .bind(&session_token)
        .bind(&canonical_username)
        .execute(&self.pool)
        .await?;

        Ok(Some((session_token, canonical_username)))
    }

    /// Resolve a bearer token to its owner. The unique index keeps tokens
    /// one-per-user; the ordering makes the lookup deterministic regardless.
    pub async fn resolve(&self, session_token: &str) -> Result<Option<String>, ApiError> {
        let username: Option<(String,)> = sqlx::query_as(
            "SELECT username FROM users WHERE session_token = $1 ORDER BY username LIMIT 1",
        )
        .bind(session_token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(username.map(|(u,)| u))
    }

    /// Rehash and store a new password, forcibly signing out any active
    /// session in the same statement.
    pub async fn update_password(
        &self,
        username: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        let password_hash = hash(new_password, DEFAULT_COST)?;

        let result = sqlx::query(
            "UPDATE users
             SET password_hash = $1, session_token = NULL, updated_at = NOW()
             WHERE username = $2",
        )
        .bind(&password_hash)
        .bind(username)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("User not found."));
        }
        Ok(())
    }

    pub async fn lookup_profile(&self, username: &str) -> Result<Option<UserProfile>, ApiError> {
        let profile = sqlx::query_as::<_, UserProfile>(
            "SELECT username, full_name, email, phone_number, country, created_at
             FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    /// Invalidate a session by rotating the stored token to a fresh value
    /// that is immediately discarded. The old token can never be replayed;
    /// an unknown token is a no-op.
    pub async fn invalidate(&self, session_token: &str) -> Result<(), ApiError> {
        sqlx::query(
            "UPDATE users SET session_token = $1, updated_at = NOW() WHERE session_token = $2",
        )
        .bind(token::generate())
        .bind(session_token)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> ProfileFields {
        ProfileFields {
            full_name: "Alice A".into(),
            email: "a@x.com".into(),
            phone_number: "555".into(),
            country: "US".into(),
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn duplicate_create_is_a_conflict(pool: PgPool) {
        let store = CredentialStore::new(pool);
        store.create("alice", "pw123456", &profile()).await.unwrap();

        let err = store
            .create("alice", "other-pw", &profile())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn concurrent_creates_admit_exactly_one(pool: PgPool) {
        let store = CredentialStore::new(pool);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.create("alice", "pw123456", &profile()).await
            }));
        }

        let mut created = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => created += 1,
                Err(ApiError::Conflict(_)) => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(conflicts, 7);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn bad_credentials_are_indistinguishable(pool: PgPool) {
        let store = CredentialStore::new(pool);
        store.create("alice", "pw123456", &profile()).await.unwrap();

        assert!(store.verify("alice", "wrong").await.unwrap().is_none());
        assert!(store.verify("nobody", "wrong").await.unwrap().is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn login_rotates_the_active_token(pool: PgPool) {
        let store = CredentialStore::new(pool);
        store.create("alice", "pw123456", &profile()).await.unwrap();

        let (t1, username) = store.verify("alice", "pw123456").await.unwrap().unwrap();
        assert_eq!(username, "alice");
        assert_eq!(store.resolve(&t1).await.unwrap().as_deref(), Some("alice"));

        let (t2, _) = store.verify("alice", "pw123456").await.unwrap().unwrap();
        assert_ne!(t1, t2);
        assert!(store.resolve(&t1).await.unwrap().is_none());
        assert_eq!(store.resolve(&t2).await.unwrap().as_deref(), Some("alice"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn password_reset_signs_out_the_session(pool: PgPool) {
        let store = CredentialStore::new(pool);
        store.create("alice", "pw123456", &profile()).await.unwrap();
        let (token, _) = store.verify("alice", "pw123456").await.unwrap().unwrap();

        store.update_password("alice", "newpw123").await.unwrap();

        assert!(store.resolve(&token).await.unwrap().is_none());
        assert!(store.verify("alice", "pw123456").await.unwrap().is_none());
        assert!(store.verify("alice", "newpw123").await.unwrap().is_some());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn update_password_for_unknown_user_is_not_found(pool: PgPool) {
        let store = CredentialStore::new(pool);
        let err = store.update_password("nobody", "newpw123").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn invalidate_rotates_away_and_is_idempotent(pool: PgPool) {
        let store = CredentialStore::new(pool);
        store.create("alice", "pw123456", &profile()).await.unwrap();
        let (token, _) = store.verify("alice", "pw123456").await.unwrap().unwrap();

        store.invalidate(&token).await.unwrap();
        assert!(store.resolve(&token).await.unwrap().is_none());

        // Unknown tokens are a silent no-op.
        store.invalidate(&token).await.unwrap();
        store.invalidate("not-a-token").await.unwrap();
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn lookup_profile_returns_everything_but_credentials(pool: PgPool) {
        let store = CredentialStore::new(pool);
        store.create("alice", "pw123456", &profile()).await.unwrap();

        let found = store.lookup_profile("alice").await.unwrap().unwrap();
        assert_eq!(found.username, "alice");
        assert_eq!(found.full_name, "Alice A");
        assert!(store.lookup_profile("nobody").await.unwrap().is_none());
    }
}
