//! Static role -> capability mapping
//!
//! Informational only: these strings are returned with a login response and
//! never consulted for access decisions. Access is gated on role names.

use crate::models::role::RoleName;

const ADMIN_PERMISSIONS: &[&str] = &[
    "management user (crud, activate user, deactivate user, set role)",
    "management course (crud)",
    "log book management (crud)",
    "feedback management (crud)",
    "quiz management (crud)",
];

const TEACHER_PERMISSIONS: &[&str] = &[
    "management course (crud)",
    "log book management (crud)",
    "feedback management (crud)",
    "quiz management (crud)",
];

const STUDENT_PERMISSIONS: &[&str] = &[
    "course (read)",
    "answer (create)",
    "feedback (create, read)",
    "log book (read)",
];

pub fn permissions_for(role: RoleName) -> &'static [&'static str] {
    match role {
        RoleName::Admin => ADMIN_PERMISSIONS,
        RoleName::Teacher => TEACHER_PERMISSIONS,
        RoleName::Student => STUDENT_PERMISSIONS,
    }
}

/// Union over all recognized role names, in first-seen order. Unknown names
/// contribute nothing.
pub fn permissions_for_roles<S: AsRef<str>>(roles: &[S]) -> Vec<String> {
    let mut permissions: Vec<String> = Vec::new();

    for role in roles.iter().filter_map(|r| r.as_ref().parse::<RoleName>().ok()) {
        for permission in permissions_for(role) {
            if !permissions.iter().any(|p| p == permission) {
                permissions.push(permission.to_string());
            }
        }
    }

    permissions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_counts() {
        assert_eq!(permissions_for(RoleName::Admin).len(), 5);
        assert_eq!(permissions_for(RoleName::Teacher).len(), 4);
        assert_eq!(permissions_for(RoleName::Student).len(), 4);
    }

    #[test]
    fn test_union_dedupes() {
        let perms = permissions_for_roles(&["ADMIN", "teacher"]);
        assert_eq!(perms.len(), 5);
        assert_eq!(perms[0], "management user (crud, activate user, deactivate user, set role)");
    }

    #[test]
    fn test_unknown_role_has_no_permissions() {
        assert!(permissions_for_roles(&["JANITOR"]).is_empty());
        assert!(permissions_for_roles::<&str>(&[]).is_empty());
    }
}
