//! JWT 认证与角色守卫中间件
//!
//! 每个请求依次经过：无令牌 -> 格式错误 -> 签名/过期校验失败 -> 有效。
//! 前三种状态返回 401；角色守卫在有效令牌之上再检查角色，缺少角色返回 403。

use super::jwt::{JwtService, TokenError};
use crate::{error::AppError, models::role::RoleName};
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

/// 认证上下文（附加到请求扩展）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub email: String,
    pub roles: Vec<String>,
}

impl AuthContext {
    /// 角色名比较不区分大小写
    pub fn has_role(&self, role: RoleName) -> bool {
        self.roles
            .iter()
            .any(|r| r.trim().eq_ignore_ascii_case(role.as_str()))
    }
}

// 在 handler 中直接提取 AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized("Authentication required"))
    }
}

/// 令牌被拒绝的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardRejection {
    NoToken,
    Malformed,
    Invalid(TokenError),
    InvalidSubject,
}

impl From<GuardRejection> for AppError {
    fn from(rejection: GuardRejection) -> Self {
        let message = match rejection {
            GuardRejection::NoToken => "Authorization header required",
            GuardRejection::Malformed => "Authorization header must be: Bearer <token>",
            GuardRejection::Invalid(TokenError::Expired) => "Token has expired",
            GuardRejection::Invalid(_) => "Invalid token",
            GuardRejection::InvalidSubject => "Invalid token subject",
        };
        AppError::unauthorized(message)
    }
}

/// 从 Authorization 头提取令牌
pub fn extract_token(headers: &HeaderMap) -> Result<&str, GuardRejection> {
    let value = headers.get(AUTHORIZATION).ok_or(GuardRejection::NoToken)?;
    let value = value.to_str().map_err(|_| GuardRejection::Malformed)?;

    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(GuardRejection::Malformed),
    }
}

/// 校验请求头中的令牌并构建认证上下文
pub fn authenticate(jwt: &JwtService, headers: &HeaderMap) -> Result<AuthContext, GuardRejection> {
    let token = extract_token(headers)?;
    let claims = jwt.verify(token).map_err(GuardRejection::Invalid)?;
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| GuardRejection::InvalidSubject)?;

    Ok(AuthContext {
        user_id,
        email: claims.email,
        roles: claims.roles,
    })
}

/// JWT 认证中间件 - 必须认证
pub async fn jwt_auth_middleware(
    State(jwt_service): State<Arc<JwtService>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_context = authenticate(&jwt_service, req.headers())?;
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}

/// 角色守卫状态
#[derive(Clone)]
pub struct RoleGuard {
    pub jwt: Arc<JwtService>,
    pub required: RoleName,
}

/// 角色守卫中间件：先认证（401），再检查角色（403）
pub async fn require_role_middleware(
    State(guard): State<RoleGuard>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_context = authenticate(&guard.jwt, req.headers())?;

    if !auth_context.has_role(guard.required) {
        tracing::warn!(
            user_id = %auth_context.user_id,
            required = %guard.required,
            "Role check failed"
        );
        return Err(AppError::Forbidden(format!(
            "Access restricted to {} only",
            guard.required
        )));
    }

    req.extensions_mut().insert(auth_context);
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value.parse().unwrap());
        headers
    }

    #[test]
    fn test_extract_token_valid() {
        let headers = headers_with("Bearer test_token_123");
        assert_eq!(extract_token(&headers).unwrap(), "test_token_123");
    }

    #[test]
    fn test_extract_token_missing() {
        let headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), Err(GuardRejection::NoToken));
    }

    #[test]
    fn test_extract_token_invalid_format() {
        assert_eq!(
            extract_token(&headers_with("InvalidFormat")),
            Err(GuardRejection::Malformed)
        );
        assert_eq!(
            extract_token(&headers_with("Basic dXNlcjpwYXNz")),
            Err(GuardRejection::Malformed)
        );
        assert_eq!(
            extract_token(&headers_with("Bearer ")),
            Err(GuardRejection::Malformed)
        );
    }

    #[test]
    fn test_rejections_are_unauthorized() {
        for rejection in [
            GuardRejection::NoToken,
            GuardRejection::Malformed,
            GuardRejection::Invalid(TokenError::BadSignature),
            GuardRejection::InvalidSubject,
        ] {
            assert_eq!(AppError::from(rejection).code(), 401);
        }
    }

    #[test]
    fn test_has_role_ignores_case() {
        let ctx = AuthContext {
            user_id: Uuid::new_v4(),
            email: "t@x.com".to_string(),
            roles: vec!["teacher".to_string()],
        };
        assert!(ctx.has_role(RoleName::Teacher));
        assert!(!ctx.has_role(RoleName::Admin));
    }
}
