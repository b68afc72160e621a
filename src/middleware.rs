//! HTTP 中间件与应用状态
//! 请求追踪、IP 白名单

use crate::{
    auth::{jwt::JwtService, password::PasswordHasher, reset::ResetTokenManager},
    clock::Clock,
    config::AppConfig,
    error::AppError,
    repository::{CredentialStore, FeedbackStore},
    services::{AuthService, EmailSender, FeedbackService, UserCache, UserService},
};
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::{net::SocketAddr, sync::Arc, time::Duration, time::Instant};
use tracing::Instrument;
use uuid::Uuid;

/// 应用状态
///
/// 所有依赖在启动时构建一次，通过 `Arc` 在请求间共享。
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn CredentialStore>,
    pub jwt_service: Arc<JwtService>,
    pub auth_service: Arc<AuthService>,
    pub user_service: Arc<UserService>,
    pub feedback_service: Arc<FeedbackService>,
}

impl AppState {
    /// 按配置组装服务
    pub fn build(
        config: Arc<AppConfig>,
        store: Arc<dyn CredentialStore>,
        feedback_store: Arc<dyn FeedbackStore>,
        mailer: Arc<dyn EmailSender>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, AppError> {
        let jwt_service = Arc::new(JwtService::from_config(&config, clock.clone())?);
        let hasher = Arc::new(PasswordHasher::from_config(&config)?);

        let reset = Arc::new(ResetTokenManager::new(
            store.clone(),
            mailer,
            clock,
            hasher.clone(),
            chrono::Duration::seconds(config.security.reset_token_ttl_secs as i64),
            config.reset_link_base(),
        ));

        let cache = Arc::new(UserCache::new(
            config.cache.enabled,
            Duration::from_secs(config.cache.user_ttl_secs),
            Duration::from_secs(config.cache.list_ttl_secs),
        ));

        let auth_service = Arc::new(AuthService::new(
            store.clone(),
            jwt_service.clone(),
            hasher,
            reset,
            cache.clone(),
            config.clone(),
        ));

        let user_service = Arc::new(UserService::new(store.clone(), cache));
        let feedback_service = Arc::new(FeedbackService::new(feedback_store));

        Ok(Self {
            config,
            store,
            jwt_service,
            auth_service,
            user_service,
            feedback_service,
        })
    }
}

tokio::task_local! {
    static REQUEST_ID: String;
}

/// 当前请求的 request_id；在追踪中间件之外调用时生成新的
pub fn current_request_id() -> String {
    REQUEST_ID
        .try_with(|id| id.clone())
        .unwrap_or_else(|_| Uuid::new_v4().to_string())
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(req: Request, next: Next) -> Response {
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let method = req.method().to_string();
    let path = req.uri().path().to_string();

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        path = %path,
    );

    async move {
        let start = Instant::now();
        let mut response = REQUEST_ID.scope(request_id.clone(), next.run(req)).await;
        let elapsed = start.elapsed();

        let status = response.status().as_u16();
        metrics::counter!(
            "http_requests_total",
            "method" => method.clone(),
            "status" => status.to_string()
        )
        .increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        tracing::info!(
            status = status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Request completed"
        );

        // 非法字符的 trace_id 直接丢弃，不回写
        if let Ok(value) = HeaderValue::from_str(&trace_id) {
            response.headers_mut().insert("x-trace-id", value);
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert("x-request-id", value);
        }

        response
    }
    .instrument(span)
    .await
}

/// 从请求头中提取或生成 trace_id
fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty() && s.len() <= 128)
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// IP 白名单中间件（未配置白名单时放行所有请求）
pub async fn ip_whitelist_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(allowed_ips) = &state.config.security.allowed_ips {
        let client_ip = get_client_ip(&req, state.config.security.trust_proxy);

        if !allowed_ips.iter().any(|ip| ip == &client_ip) {
            tracing::warn!(client_ip = %client_ip, "IP not in whitelist");
            return Err(AppError::Forbidden("IP address not allowed".to_string()));
        }
    }

    Ok(next.run(req).await)
}

/// 获取客户端 IP 地址
fn get_client_ip(req: &Request, trust_proxy: bool) -> String {
    let headers = req.headers();

    if trust_proxy {
        // X-Forwarded-For 可能包含多个 IP，取第一个
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if let Some(ip) = forwarded {
            return ip;
        }

        if let Some(ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
            return ip.trim().to_string();
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_extract_or_generate_trace_id() {
        let mut headers = HeaderMap::new();
        headers.insert("x-trace-id", "test-trace-123".parse().unwrap());
        assert_eq!(extract_or_generate_trace_id(&headers), "test-trace-123");

        let generated = extract_or_generate_trace_id(&HeaderMap::new());
        assert!(!generated.is_empty());
        assert_ne!(generated, "test-trace-123");
    }

    #[test]
    fn test_client_ip_prefers_forwarded_header_behind_proxy() {
        let req = Request::builder()
            .header("x-forwarded-for", "10.0.0.1, 172.16.0.1")
            .body(Body::empty())
            .unwrap();

        assert_eq!(get_client_ip(&req, true), "10.0.0.1");
        assert_eq!(get_client_ip(&req, false), "unknown");
    }

    #[test]
    fn test_client_ip_from_connect_info() {
        let mut req = Request::builder().body(Body::empty()).unwrap();
        req.extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 7], 4000))));

        assert_eq!(get_client_ip(&req, false), "192.168.1.7");
    }

    #[tokio::test]
    async fn test_request_id_scoped_to_request() {
        let scoped = REQUEST_ID
            .scope("req-42".to_string(), async { current_request_id() })
            .await;
        assert_eq!(scoped, "req-42");

        assert_ne!(current_request_id(), "req-42");
    }
}
