//! User domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PER_PAGE: i64 = 10;
pub const MAX_PER_PAGE: i64 = 100;

/// User account row. Never serialized outward: it carries the password hash
/// and the reset token digest.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,

    // Password reset state (SHA-256 digest of the outstanding token)
    pub reset_token_hash: Option<String>,
    pub reset_expires_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Data needed to insert a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

/// Outward view of a user (without sensitive data)
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub is_active: bool,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn from_user(user: User, roles: Vec<String>) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            is_active: user.is_active,
            roles,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Update profile request
#[derive(Debug, Deserialize, validator::Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 255, message = "name must be 1-255 characters"))]
    pub name: Option<String>,
    #[validate(email(message = "email must be a valid address"))]
    pub email: Option<String>,
}

/// Pagination query for the user listing
#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl ListUsersQuery {
    /// Values below 1 fall back to the defaults; per_page is capped.
    pub fn normalize(&self) -> (i64, i64) {
        let page = match self.page {
            Some(p) if p >= 1 => p,
            _ => DEFAULT_PAGE,
        };
        let per_page = match self.per_page {
            Some(n) if n >= 1 => n.min(MAX_PER_PAGE),
            _ => DEFAULT_PER_PAGE,
        };
        (page, per_page)
    }
}

/// Row offset of `page`, saturating at `i64::MAX`
pub fn page_offset(page: i64, per_page: i64) -> i64 {
    (page - 1).max(0).saturating_mul(per_page.max(0))
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PageMeta {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        assert_eq!(ListUsersQuery::default().normalize(), (1, 10));

        let query = ListUsersQuery {
            page: Some(0),
            per_page: Some(-5),
        };
        assert_eq!(query.normalize(), (1, 10));
    }

    #[test]
    fn test_pagination_caps_per_page() {
        let query = ListUsersQuery {
            page: Some(3),
            per_page: Some(1000),
        };
        assert_eq!(query.normalize(), (3, MAX_PER_PAGE));
    }

    #[test]
    fn test_page_offset_saturates() {
        assert_eq!(page_offset(1, 10), 0);
        assert_eq!(page_offset(3, 10), 20);
        assert_eq!(page_offset(i64::MAX, MAX_PER_PAGE), i64::MAX);
    }
}
