//! 认证相关的 HTTP 处理器

use super::ValidatedJson;
use crate::{
    auth::middleware::{extract_token, AuthContext},
    error::AppError,
    middleware::AppState,
    models::auth::*,
};
use axum::{extract::State, http::HeaderMap, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

/// 注册
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state.auth_service.register(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "user registered successfully",
            "data": profile,
        })),
    ))
}

/// 登录
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = state.auth_service.login(req).await?;

    Ok(Json(json!({
        "message": "login successful",
        "data": response,
    })))
}

/// 登出（无状态令牌，仅做记录）
pub async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let token = extract_token(&headers)
        .map_err(|_| AppError::BadRequest("Authorization header required".to_string()))?;

    state.auth_service.logout(token).await?;

    Ok(Json(json!({"message": "logout successful"})))
}

/// 忘记密码
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<ForgotPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    let response = state.auth_service.forgot_password(req).await?;

    Ok(Json(json!({
        "message": "reset password link sent to email",
        "data": response,
    })))
}

/// 重置密码
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state.auth_service.reset_password(req).await?;

    Ok(Json(json!({"message": "password has been reset successfully"})))
}

/// 当前令牌携带的身份
pub async fn me(auth_context: AuthContext) -> impl IntoResponse {
    Json(json!({
        "data": {
            "user_id": auth_context.user_id,
            "email": auth_context.email,
            "roles": auth_context.roles,
        }
    }))
}
