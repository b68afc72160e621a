//! 反馈问答处理器

use super::{parse_id, ValidatedJson};
use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    middleware::AppState,
    models::feedback::{CreateQuestionRequest, SubmitAnswerRequest},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// 教师创建问题
pub async fn create_question(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    ValidatedJson(req): ValidatedJson<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let question = state
        .feedback_service
        .create_question(auth_context.user_id, req)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "question created successfully",
            "data": question,
        })),
    ))
}

pub async fn list_questions(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let questions = state.feedback_service.list_questions().await?;
    Ok(Json(json!({ "data": questions })))
}

/// 提交回答
pub async fn submit_answer(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    ValidatedJson(req): ValidatedJson<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let answer = state
        .feedback_service
        .submit_answer(auth_context.user_id, req)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "answer submitted successfully",
            "data": answer,
        })),
    ))
}

/// 当前教师的问题及回答
pub async fn my_questions(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    let questions = state
        .feedback_service
        .questions_by_teacher(auth_context.user_id)
        .await?;
    Ok(Json(json!({ "data": questions })))
}

/// 指定教师的问题及回答
pub async fn questions_by_teacher(
    State(state): State<Arc<AppState>>,
    Path(teacher_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let teacher_id = parse_id(&teacher_id, "teacher id")?;
    let questions = state
        .feedback_service
        .questions_by_teacher(teacher_id)
        .await?;
    Ok(Json(json!({ "data": questions })))
}
