//! User repository for database operations.

use chrono::NaiveDateTime;
use sqlx::{FromRow, SqlitePool};

use shopsmarter_core::{Email, UserId, Username};

use super::{RepositoryError, conflict_or_database};
use crate::models::User;

/// Column named in `RepositoryError::Conflict` when a username is taken.
pub const USERNAME_COLUMN: &str = "username";

/// Column named in `RepositoryError::Conflict` when an email is taken.
pub const EMAIL_COLUMN: &str = "email";

/// Raw `users` row.
#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: Option<String>,
    created_at: NaiveDateTime,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let username = Username::parse(&row.username).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid username in database: {e}"))
        })?;
        let email = row
            .email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
            })?;

        Ok(Self {
            id: UserId::new(row.id),
            username,
            email,
            created_at: row.created_at.and_utc(),
        })
    }
}

/// Row used during login: the user plus their password hash.
#[derive(Debug, FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Get a user by their ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_id(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, email, created_at FROM users WHERE id = ?",
        )
        .bind(id.as_i64())
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Get a user by username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_by_username(
        &self,
        username: &Username,
    ) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, email, created_at FROM users WHERE username = ?",
        )
        .bind(username.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Create a new user with a password hash.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` naming [`USERNAME_COLUMN`] or
    /// [`EMAIL_COLUMN`] if either is taken.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn create(
        &self,
        username: &Username,
        email: Option<&Email>,
        password_hash: &str,
    ) -> Result<User, RepositoryError> {
        let row: UserRow = sqlx::query_as(
            r"
            INSERT INTO users (username, email, password_hash)
            VALUES (?, ?, ?)
            RETURNING id, username, email, created_at
            ",
        )
        .bind(username.as_str())
        .bind(email.map(Email::as_str))
        .bind(password_hash)
        .fetch_one(self.pool)
        .await
        .map_err(|e| {
            let column = match &e {
                sqlx::Error::Database(db_err) if db_err.message().contains("users.email") => {
                    EMAIL_COLUMN
                }
                _ => USERNAME_COLUMN,
            };
            conflict_or_database(e, column)
        })?;

        User::try_from(row)
    }

    /// Get a user and their password hash by username.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get_password_hash(
        &self,
        username: &Username,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row: Option<CredentialRow> = sqlx::query_as(
            r"
            SELECT id, username, email, created_at, password_hash
            FROM users
            WHERE username = ?
            ",
        )
        .bind(username.as_str())
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some((User::try_from(r.user)?, r.password_hash))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_pool;

    #[tokio::test]
    async fn test_create_and_lookup() {
        let pool = memory_pool().await;
        let repo = UserRepository::new(&pool);
        let username = Username::parse("shopper").expect("valid");
        let email = Email::parse("Shopper@Example.com").expect("valid");

        let user = repo
            .create(&username, Some(&email), "hash")
            .await
            .expect("created");
        assert_eq!(user.username, username);
        assert_eq!(user.email.as_ref().map(Email::as_str), Some("shopper@example.com"));

        let by_id = repo.get_by_id(user.id).await.expect("query").expect("found");
        assert_eq!(by_id.username.as_str(), "shopper");

        let (found, hash) = repo
            .get_password_hash(&username)
            .await
            .expect("query")
            .expect("found");
        assert_eq!(found.id, user.id);
        assert_eq!(hash, "hash");
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let pool = memory_pool().await;
        let repo = UserRepository::new(&pool);
        let username = Username::parse("twin").expect("valid");

        repo.create(&username, None, "a").await.expect("first");
        let err = repo.create(&username, None, "b").await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(ref c) if c == USERNAME_COLUMN));
    }

    #[tokio::test]
    async fn test_duplicate_email_names_the_column() {
        let pool = memory_pool().await;
        let repo = UserRepository::new(&pool);
        let email = Email::parse("twin@example.com").expect("valid");

        repo.create(&Username::parse("first").expect("valid"), Some(&email), "a")
            .await
            .expect("first");
        let err = repo
            .create(&Username::parse("second").expect("valid"), Some(&email), "b")
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(ref c) if c == EMAIL_COLUMN));
    }

    #[tokio::test]
    async fn test_missing_user() {
        let pool = memory_pool().await;
        let repo = UserRepository::new(&pool);
        let username = Username::parse("ghost").expect("valid");
        assert!(repo.get_by_username(&username).await.expect("query").is_none());
        assert!(repo.get_password_hash(&username).await.expect("query").is_none());
    }
}
