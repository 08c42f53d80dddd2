//! User model for Gator.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{decode_id, decode_timestamp};
use crate::{GatorError, Result};

/// Maximum length of a user name.
pub const MAX_NAME_LENGTH: usize = 64;

/// User entity representing a registered user.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// Unique user ID.
    pub id: Uuid,
    /// Unique user name.
    pub name: String,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Row type for users from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct UserRow {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<UserRow> for User {
    type Error = GatorError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: decode_id("users.id", &row.id)?,
            name: row.name,
            created_at: decode_timestamp("users.created_at", &row.created_at)?,
            updated_at: decode_timestamp("users.updated_at", &row.updated_at)?,
        })
    }
}

/// New user for registration.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// User name.
    pub name: String,
}

impl NewUser {
    /// Create a new user with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Check the name is non-empty, bounded and free of whitespace.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(GatorError::Validation("user name is empty".to_string()));
        }
        if self.name.chars().count() > MAX_NAME_LENGTH {
            return Err(GatorError::Validation(format!(
                "user name longer than {MAX_NAME_LENGTH} characters"
            )));
        }
        if self.name.chars().any(char::is_whitespace) {
            return Err(GatorError::Validation(
                "user name must not contain whitespace".to_string(),
            ));
        }
        Ok(())
    }
}
