//! 用户与个人资料处理器

use super::{parse_id, ValidatedJson};
use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    middleware::AppState,
    models::{
        role::SetRoleRequest,
        user::{ListUsersQuery, UpdateProfileRequest},
    },
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// 当前用户资料
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    let profile = state.user_service.get_user(auth_context.user_id).await?;
    Ok(Json(json!({ "data": profile })))
}

/// 修改当前用户资料
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    ValidatedJson(req): ValidatedJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state
        .user_service
        .update_profile(auth_context.user_id, req)
        .await?;

    Ok(Json(json!({
        "message": "profile updated successfully",
        "data": profile,
    })))
}

/// 用户列表（管理员）
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListUsersQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = state.user_service.list_users(&query).await?;
    Ok(Json(page))
}

/// 用户详情
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "user id")?;
    let profile = state.user_service.get_user(id).await?;
    Ok(Json(json!({ "data": profile })))
}

/// 设置用户角色（替换）
pub async fn set_role(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<SetRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "user id")?;
    let profile = state
        .user_service
        .set_role(id, &req.role, auth_context.user_id)
        .await?;

    Ok(Json(json!({
        "message": "role updated successfully",
        "data": profile,
    })))
}

/// 停用账户
pub async fn deactivate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "user id")?;
    state.user_service.deactivate(id).await?;
    Ok(Json(json!({"message": "user deactivated successfully"})))
}

/// 启用账户
pub async fn activate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "user id")?;
    state.user_service.activate(id).await?;
    Ok(Json(json!({"message": "user activated successfully"})))
}
