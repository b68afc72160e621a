//! 统一错误模型
//! 定义所有错误类型和错误响应格式

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// 结果类型别名
pub type Result<T> = std::result::Result<T, AppError>;

/// 字段级校验错误：字段名 -> 错误信息列表
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field_errors: FieldErrors,
    },

    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// 邮箱不存在与密码错误共用同一个错误，避免泄露账户是否存在
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Account is deactivated")]
    AccountDeactivated,

    #[error("Invalid reset token")]
    InvalidResetToken,

    #[error("Reset token expired")]
    ExpiredResetToken,

    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// 获取 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidCredentials
            | AppError::AccountDeactivated
            | AppError::InvalidResetToken
            | AppError::ExpiredResetToken
            | AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// 错误分类，对外暴露的稳定标识
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation { .. } | AppError::BadRequest(_) => "ValidationError",
            AppError::InvalidCredentials
            | AppError::AccountDeactivated
            | AppError::InvalidResetToken
            | AppError::ExpiredResetToken
            | AppError::Unauthorized(_) => "AuthenticationError",
            AppError::Forbidden(_) => "AuthorizationError",
            AppError::NotFound(_) => "NotFoundError",
            AppError::Conflict(_) => "ConflictError",
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                "InternalError"
            }
        }
    }

    /// 获取用户友好的错误消息（不包含敏感信息）
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation { message, .. } => message.clone(),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::InvalidCredentials => "invalid email or password".to_string(),
            AppError::AccountDeactivated => {
                "account is deactivated, please contact admin".to_string()
            }
            AppError::InvalidResetToken => "invalid or expired token".to_string(),
            AppError::ExpiredResetToken => "reset token expired".to_string(),
            AppError::Unauthorized(msg) => msg.clone(),
            AppError::Forbidden(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Conflict(msg) => msg.clone(),
            AppError::Database(_) => "Database error occurred".to_string(),
            AppError::Config(_) => "Configuration error".to_string(),
            AppError::Internal(_) => "Internal server error".to_string(),
        }
    }

    /// 获取错误码
    pub fn code(&self) -> u16 {
        self.status_code().as_u16()
    }

    // 便捷方法
    pub fn not_found(msg: &str) -> Self {
        AppError::NotFound(msg.to_string())
    }

    pub fn unauthorized(msg: &str) -> Self {
        AppError::Unauthorized(msg.to_string())
    }

    pub fn internal_error(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }

    /// 单字段校验失败
    pub fn field(field: &str, msg: &str) -> Self {
        let mut field_errors = FieldErrors::new();
        field_errors.insert(field.to_string(), vec![msg.to_string()]);
        AppError::Validation {
            message: msg.to_string(),
            field_errors,
        }
    }
}

/// 错误响应 DTO
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: u16,
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<FieldErrors>,
    pub request_id: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let request_id = crate::middleware::current_request_id();

        let field_errors = match &self {
            AppError::Validation { field_errors, .. } if !field_errors.is_empty() => {
                Some(field_errors.clone())
            }
            _ => None,
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.code(),
                kind: self.kind(),
                message: self.user_message(),
                field_errors,
                request_id,
            },
        };

        // 记录错误日志
        if status.is_server_error() {
            tracing::error!(
                code = self.code(),
                message = %self,
                request_id = %error_response.error.request_id,
                "Application error"
            );
        } else {
            tracing::debug!(
                code = self.code(),
                kind = self.kind(),
                request_id = %error_response.error.request_id,
                "Request rejected"
            );
        }

        (status, Json(error_response)).into_response()
    }
}

/// 从 config::ConfigError 转换
impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

/// 从 validator 的校验结果转换，保留每个字段的错误信息
impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut field_errors = FieldErrors::new();
        for (field, errs) in errors.field_errors() {
            let messages = errs
                .iter()
                .map(|e| {
                    e.message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| format!("{} is invalid", field))
                })
                .collect();
            field_errors.insert(field.to_string(), messages);
        }

        AppError::Validation {
            message: "Request validation failed".to_string(),
            field_errors,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::unauthorized("x").code(), 401);
        assert_eq!(AppError::InvalidCredentials.code(), 401);
        assert_eq!(AppError::AccountDeactivated.code(), 401);
        assert_eq!(AppError::Forbidden("x".to_string()).code(), 403);
        assert_eq!(AppError::not_found("test").code(), 404);
        assert_eq!(AppError::BadRequest("test".to_string()).code(), 400);
        assert_eq!(AppError::Conflict("dup".to_string()).code(), 409);
        assert_eq!(AppError::internal_error("boom").code(), 500);
    }

    #[test]
    fn test_kinds_follow_taxonomy() {
        assert_eq!(AppError::field("email", "bad").kind(), "ValidationError");
        assert_eq!(AppError::InvalidCredentials.kind(), "AuthenticationError");
        assert_eq!(AppError::ExpiredResetToken.kind(), "AuthenticationError");
        assert_eq!(AppError::Forbidden("x".to_string()).kind(), "AuthorizationError");
        assert_eq!(AppError::not_found("x").kind(), "NotFoundError");
        assert_eq!(AppError::Conflict("x".to_string()).kind(), "ConflictError");
        assert_eq!(AppError::Database(sqlx::Error::PoolClosed).kind(), "InternalError");
    }

    #[test]
    fn test_user_message_no_sensitive_info() {
        let error = AppError::Database(sqlx::Error::RowNotFound);
        let message = error.user_message();
        assert_eq!(message, "Database error occurred");
        assert!(!message.contains("sqlx"));

        let error = AppError::internal_error("connection reset by peer at 10.0.0.3");
        assert_eq!(error.user_message(), "Internal server error");
    }

    #[test]
    fn test_field_error_carries_field_name() {
        match AppError::field("password", "too short") {
            AppError::Validation { field_errors, .. } => {
                assert_eq!(field_errors["password"], vec!["too short".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
