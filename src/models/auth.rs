//! Authentication-related models

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Register request
#[derive(Debug, Deserialize, validator::Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 255, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Login request
#[derive(Debug, Deserialize, validator::Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
    #[serde(default)]
    pub remember_me: bool,
}

/// Identity summary embedded in the login response
#[derive(Debug, Clone, Serialize)]
pub struct LoginUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

/// Login response
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub token: String,
    /// RFC 3339
    pub expires_at: String,
    pub token_type: &'static str,
    pub user: LoginUser,
}

#[derive(Debug, Deserialize, validator::Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForgotPasswordResponse {
    pub email: String,
    /// Only present when `security.expose_reset_token` is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_token: Option<String>,
}

#[derive(Debug, Deserialize, validator::Validate)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 1, message = "token is required"))]
    pub token: String,
    #[validate(length(min = 1, message = "new_password is required"))]
    pub new_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn test_register_request_validation() {
        let valid = RegisterRequest {
            name: "Ana".to_string(),
            email: "ana@x.com".to_string(),
            password: "secret1".to_string(),
        };
        assert!(valid.validate().is_ok());

        let invalid = RegisterRequest {
            name: String::new(),
            email: "not-an-email".to_string(),
            password: "secret1".to_string(),
        };
        let errors = invalid.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("email"));
    }

    #[test]
    fn test_login_remember_me_defaults_false() {
        let req: LoginRequest =
            serde_json::from_str(r#"{"email":"a@b.c","password":"x"}"#).unwrap();
        assert!(!req.remember_me);
    }

    #[test]
    fn test_forgot_response_hides_absent_token() {
        let resp = ForgotPasswordResponse {
            email: "a@b.c".to_string(),
            reset_token: None,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("reset_token").is_none());
    }
}
