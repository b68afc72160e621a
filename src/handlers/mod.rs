//! HTTP 处理器模块

pub mod auth;
pub mod feedback;
pub mod health;
pub mod user;

use crate::error::AppError;
use axum::{
    extract::{FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use uuid::Uuid;
use validator::Validate;

/// 反序列化后立即执行 validator 校验的 JSON 提取器
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| {
                tracing::debug!(error = %rejection.body_text(), "Rejected request body");
                AppError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
            })?;

        value.validate()?;
        Ok(Self(value))
    }
}

/// 解析路径中的 UUID
pub fn parse_id(raw: &str, what: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::BadRequest(format!("invalid {}", what)))
}
