//! 健康检查处理器
//! 提供 /health 和 /ready 端点

use crate::middleware::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

static START_TIME: Lazy<Instant> = Lazy::new(Instant::now);

/// 记录启动时间（在 main 中尽早调用）
pub fn mark_start() {
    Lazy::force(&START_TIME);
}

pub fn uptime_secs() -> u64 {
    START_TIME.elapsed().as_secs()
}

/// 存活探针响应
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
}

/// 就绪探针响应
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: Vec<HealthCheck>,
}

#[derive(Serialize)]
pub struct HealthCheck {
    pub name: &'static str,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// 存活探针，不检查依赖
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: uptime_secs(),
    })
}

/// 就绪探针，检查存储连通性
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store_check = match state.store.ping().await {
        Ok(()) => HealthCheck {
            name: "store",
            status: "healthy",
            message: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            HealthCheck {
                name: "store",
                status: "unhealthy",
                message: Some(e.user_message()),
            }
        }
    };

    let checks = vec![store_check];
    let ready = checks.iter().all(|c| c.status == "healthy");
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(ReadinessResponse { ready, checks }))
}
