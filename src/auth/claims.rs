//! Bearer token claims
//!
//! Tokens issued by this service always carry `roles` as a list of strings.
//! Older producers emitted `user_id` instead of `sub` and encoded roles as a
//! single string or a list of `{ "name": ... }` objects; those shapes are
//! normalized here so the guard only ever sees `Vec<String>`.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    #[serde(alias = "user_id")]
    pub sub: String,

    #[serde(default)]
    pub email: String,

    #[serde(default, deserialize_with = "deserialize_roles")]
    pub roles: Vec<String>,

    /// Issued at (unix seconds)
    pub iat: i64,

    /// Expiration (unix seconds)
    pub exp: i64,

    /// Unique token identifier
    #[serde(default)]
    pub jti: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RoleClaim {
    One(String),
    Many(Vec<RoleEntry>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RoleEntry {
    Name(String),
    Object { name: String },
}

fn deserialize_roles<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let claim = Option::<RoleClaim>::deserialize(deserializer)?;

    let roles = match claim {
        None => Vec::new(),
        Some(RoleClaim::One(name)) => vec![name],
        Some(RoleClaim::Many(entries)) => entries
            .into_iter()
            .map(|entry| match entry {
                RoleEntry::Name(name) | RoleEntry::Object { name } => name,
            })
            .collect(),
    };

    Ok(roles.into_iter().filter(|r| !r.trim().is_empty()).collect())
}
