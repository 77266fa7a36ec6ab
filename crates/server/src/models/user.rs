//! User domain types.
//!
//! These types represent validated domain objects separate from database row types.

use chrono::{DateTime, Utc};

use shopsmarter_core::{Email, UserId, Username};

/// A site account (domain type).
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Login name.
    pub username: Username,
    /// Optional contact email.
    pub email: Option<Email>,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}
