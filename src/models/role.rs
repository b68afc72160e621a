//! Role domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The fixed set of role names. Role names are the only authorization currency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoleName {
    Admin,
    Teacher,
    Student,
}

impl RoleName {
    pub const ALL: [RoleName; 3] = [RoleName::Admin, RoleName::Teacher, RoleName::Student];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoleName::Admin => "ADMIN",
            RoleName::Teacher => "TEACHER",
            RoleName::Student => "STUDENT",
        }
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for RoleName {
    type Err = UnknownRole;

    /// Case-insensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoleName::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

/// Role row
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identity-role assignment
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct UserRole {
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub assigned_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Set role request
#[derive(Debug, Deserialize, validator::Validate)]
pub struct SetRoleRequest {
    #[validate(length(min = 1, message = "role is required"))]
    pub role: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_name_parse_ignores_case() {
        assert_eq!("admin".parse::<RoleName>().unwrap(), RoleName::Admin);
        assert_eq!("Teacher".parse::<RoleName>().unwrap(), RoleName::Teacher);
        assert_eq!(" STUDENT ".parse::<RoleName>().unwrap(), RoleName::Student);
        assert!("superuser".parse::<RoleName>().is_err());
    }

    #[test]
    fn test_role_name_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&RoleName::Teacher).unwrap(), "\"TEACHER\"");
        assert_eq!(RoleName::Admin.to_string(), "ADMIN");
    }
}
