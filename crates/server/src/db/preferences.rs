//! Per-user preference storage.
//!
//! Preferences are an opaque JSON object; the server never interprets them.

use serde_json::{Map, Value};
use sqlx::SqlitePool;

use shopsmarter_core::UserId;

use super::{RepositoryError, missing_user_or_database};

/// Repository for the `user_preferences` table.
pub struct PreferencesRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PreferencesRepository<'a> {
    /// Create a new preferences repository.
    #[must_use]
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Load preferences, returning an empty object if none were saved.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored value is not a JSON object.
    pub async fn get(&self, user_id: UserId) -> Result<Map<String, Value>, RepositoryError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT preferences_json FROM user_preferences WHERE user_id = ?")
                .bind(user_id.as_i64())
                .fetch_optional(self.pool)
                .await?;

        let Some((raw,)) = row else {
            return Ok(Map::new());
        };

        match serde_json::from_str(&raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) | Err(_) => Err(RepositoryError::DataCorruption(format!(
                "preferences for user {user_id} are not a JSON object"
            ))),
        }
    }

    /// Replace the stored preferences.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::MissingUser` if the user was deleted.
    /// Returns `RepositoryError::Database` if the upsert fails.
    pub async fn set(
        &self,
        user_id: UserId,
        preferences: &Map<String, Value>,
    ) -> Result<(), RepositoryError> {
        let raw = Value::Object(preferences.clone()).to_string();
        sqlx::query(
            r"
            INSERT INTO user_preferences (user_id, preferences_json)
            VALUES (?, ?)
            ON CONFLICT (user_id) DO UPDATE SET preferences_json = excluded.preferences_json
            ",
        )
        .bind(user_id.as_i64())
        .bind(raw)
        .execute(self.pool)
        .await
        .map_err(missing_user_or_database)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_pool;
    use crate::db::users::UserRepository;
    use serde_json::json;
    use shopsmarter_core::Username;

    #[tokio::test]
    async fn test_defaults_then_replaces() {
        let pool = memory_pool().await;
        let user = UserRepository::new(&pool)
            .create(&Username::parse("prefs").expect("valid"), None, "h")
            .await
            .expect("user");
        let repo = PreferencesRepository::new(&pool);

        assert!(repo.get(user.id).await.expect("get").is_empty());

        let Value::Object(first) = json!({"sizes": ["M"], "colors": ["navy"]}) else {
            unreachable!()
        };
        repo.set(user.id, &first).await.expect("set");
        assert_eq!(repo.get(user.id).await.expect("get"), first);

        let Value::Object(second) = json!({"sizes": ["L"]}) else {
            unreachable!()
        };
        repo.set(user.id, &second).await.expect("set");
        assert_eq!(repo.get(user.id).await.expect("get"), second);
    }
}
