//! Authentication and authorization module

pub mod claims;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod permissions;
pub mod reset;

pub use claims::Claims;
pub use jwt::{IssuedToken, JwtService, TokenError, TokenSubject};
pub use middleware::{
    authenticate, extract_token, jwt_auth_middleware, require_role_middleware, AuthContext,
    GuardRejection, RoleGuard,
};
pub use password::{validate_password_policy, PasswordHasher};
pub use permissions::{permissions_for, permissions_for_roles};
pub use reset::ResetTokenManager;
