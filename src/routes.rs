//! 路由注册
//! 创建所有 API 路由并应用中间件

use crate::{
    auth::middleware::{jwt_auth_middleware, require_role_middleware, RoleGuard},
    handlers,
    middleware::{ip_whitelist_middleware, request_tracking_middleware, AppState},
    models::role::RoleName,
};
use axum::{
    http::{HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    let jwt_service = state.jwt_service.clone();

    // 公开端点
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/forgot-password", post(handlers::auth::forgot_password))
        .route("/api/auth/reset-password", post(handlers::auth::reset_password));

    // 需要认证的路由
    let authenticated_routes = Router::new()
        .route("/api/auth/me", get(handlers::auth::me))
        .route(
            "/api/profile",
            get(handlers::user::get_profile).put(handlers::user::update_profile),
        )
        .route("/api/users/{id}", get(handlers::user::get_user))
        .route("/api/feedback/questions", get(handlers::feedback::list_questions))
        .route("/api/feedback/answers", post(handlers::feedback::submit_answer))
        .route(
            "/api/feedback/questions/{teacher_id}",
            get(handlers::feedback::questions_by_teacher),
        )
        .route_layer(from_fn_with_state(jwt_service.clone(), jwt_auth_middleware));

    // 仅管理员
    let admin_routes = Router::new()
        .route("/api/users", get(handlers::user::list_users))
        .route("/api/users/{id}/role", post(handlers::user::set_role))
        .route("/api/users/{id}/deactivate", post(handlers::user::deactivate))
        .route("/api/users/{id}/activate", post(handlers::user::activate))
        .route_layer(from_fn_with_state(
            RoleGuard {
                jwt: jwt_service.clone(),
                required: RoleName::Admin,
            },
            require_role_middleware,
        ));

    // 仅教师
    let teacher_routes = Router::new()
        .route("/api/feedback/questions", post(handlers::feedback::create_question))
        .route("/api/feedback/teacher", get(handlers::feedback::my_questions))
        .route_layer(from_fn_with_state(
            RoleGuard {
                jwt: jwt_service,
                required: RoleName::Teacher,
            },
            require_role_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(authenticated_routes)
        .merge(admin_routes)
        .merge(teacher_routes)
        .layer(from_fn_with_state(state.clone(), ip_whitelist_middleware))
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(cors_layer(&state))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(request_tracking_middleware))
        .with_state(state)
}

/// 只允许配置的前端来源；地址无法作为头部值时退化为任意来源
fn cors_layer(state: &AppState) -> CorsLayer {
    let origin = state.config.mail.frontend_url.trim_end_matches('/');
    let allow_origin = match HeaderValue::from_str(origin) {
        Ok(value) => AllowOrigin::exact(value),
        Err(_) => AllowOrigin::from(Any),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any)
}
