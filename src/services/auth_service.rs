//! 认证服务：注册、登录、登出、找回与重置密码

use super::cache::UserCache;
use crate::{
    auth::{
        jwt::{JwtService, TokenSubject},
        password::{validate_password_policy, PasswordHasher},
        permissions::permissions_for_roles,
        reset::ResetTokenManager,
    },
    config::AppConfig,
    error::AppError,
    models::{
        auth::*,
        role::RoleName,
        user::{NewUser, UserProfile},
    },
    repository::CredentialStore,
};
use chrono::SecondsFormat;
use std::sync::Arc;
use uuid::Uuid;

pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    jwt_service: Arc<JwtService>,
    hasher: Arc<PasswordHasher>,
    reset: Arc<ResetTokenManager>,
    cache: Arc<UserCache>,
    config: Arc<AppConfig>,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        jwt_service: Arc<JwtService>,
        hasher: Arc<PasswordHasher>,
        reset: Arc<ResetTokenManager>,
        cache: Arc<UserCache>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            store,
            jwt_service,
            hasher,
            reset,
            cache,
            config,
        }
    }

    /// 用户注册，默认分配 STUDENT 角色
    pub async fn register(&self, req: RegisterRequest) -> Result<UserProfile, AppError> {
        validate_password_policy(&req.password, &self.config.security)?;

        let email = req.email.trim().to_string();
        if self.store.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("email already registered".to_string()));
        }

        let password_hash = self.hasher.hash(&req.password)?;
        let user = self
            .store
            .create(NewUser {
                name: req.name.trim().to_string(),
                email,
                password_hash,
            })
            .await?;

        self.assign_default_role(user.id).await;
        self.cache.invalidate_pages();

        let roles = self.store.roles_of(user.id).await?;
        metrics::counter!("auth.register.total").increment(1);
        tracing::info!(user_id = %user.id, email = %user.email, "User registered");

        Ok(UserProfile::from_user(user, roles))
    }

    /// 默认角色分配失败不影响注册结果，但单独记录
    async fn assign_default_role(&self, user_id: Uuid) {
        let role = match self.store.find_role_by_name(RoleName::Student).await {
            Ok(Some(role)) => role,
            Ok(None) => {
                tracing::warn!(user_id = %user_id, "Default role STUDENT missing; user registered without a role");
                metrics::counter!("auth.register.default_role_failures").increment(1);
                return;
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Default role lookup failed; user registered without a role");
                metrics::counter!("auth.register.default_role_failures").increment(1);
                return;
            }
        };

        if let Err(e) = self.store.assign_role(user_id, role.id, None).await {
            tracing::warn!(user_id = %user_id, error = %e, "Default role assignment failed; user registered without a role");
            metrics::counter!("auth.register.default_role_failures").increment(1);
        }
    }

    /// 用户登录
    ///
    /// 邮箱不存在与密码错误返回同一个错误；只有在密码校验通过后才会暴露账户停用状态。
    pub async fn login(&self, req: LoginRequest) -> Result<LoginResponse, AppError> {
        let email = req.email.trim();

        let Some(user) = self.store.find_by_email(email).await? else {
            // 对不存在的账户同样执行一次哈希校验，避免响应时间泄露账户是否存在
            self.hasher.dummy_verify(&req.password);
            return Err(self.login_failed(email, "credentials"));
        };

        if !self.hasher.verify(&req.password, &user.password_hash) {
            return Err(self.login_failed(email, "credentials"));
        }

        if !user.is_active {
            tracing::warn!(user_id = %user.id, "Login attempt on deactivated account");
            metrics::counter!("auth.login.total", "outcome" => "deactivated").increment(1);
            return Err(AppError::AccountDeactivated);
        }

        let roles = self.store.roles_of(user.id).await?;
        let issued = self.jwt_service.issue(
            &TokenSubject {
                user_id: user.id,
                email: user.email.clone(),
                roles: roles.clone(),
            },
            self.jwt_service.ttl_for(req.remember_me),
        )?;

        metrics::counter!("auth.login.total", "outcome" => "success").increment(1);
        tracing::info!(user_id = %user.id, remember_me = req.remember_me, "User logged in");

        Ok(LoginResponse {
            token: issued.token,
            expires_at: issued.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            token_type: "Bearer",
            user: LoginUser {
                id: user.id,
                name: user.name,
                email: user.email,
                permissions: permissions_for_roles(&roles),
                roles,
            },
        })
    }

    fn login_failed(&self, email: &str, reason: &'static str) -> AppError {
        tracing::warn!(email = %email, reason, "Login failed");
        metrics::counter!("auth.login.total", "outcome" => "failure").increment(1);
        AppError::InvalidCredentials
    }

    /// 用户登出
    ///
    /// 令牌是无状态的，服务端无法使其失效；这里只记录事件，总是成功。
    pub async fn logout(&self, token: &str) -> Result<(), AppError> {
        match self.jwt_service.verify(token) {
            Ok(claims) => tracing::info!(user_id = %claims.sub, "User logged out"),
            Err(e) => tracing::debug!(reason = %e, "Logout with an unusable token"),
        }
        Ok(())
    }

    /// 申请重置密码
    pub async fn forgot_password(
        &self,
        req: ForgotPasswordRequest,
    ) -> Result<ForgotPasswordResponse, AppError> {
        let email = req.email.trim().to_string();
        let token = self.reset.generate(&email).await?;

        Ok(ForgotPasswordResponse {
            email,
            reset_token: self.config.security.expose_reset_token.then_some(token),
        })
    }

    /// 使用重置令牌设置新密码
    pub async fn reset_password(&self, req: ResetPasswordRequest) -> Result<(), AppError> {
        validate_password_policy(&req.new_password, &self.config.security)?;
        self.reset.consume(req.token.trim(), &req.new_password).await
    }
}
