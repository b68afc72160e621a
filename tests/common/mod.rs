//! 测试公共模块
//! 基于内存存储和可控时钟构建完整应用

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use lms_service::{
    clock::ManualClock,
    config::AppConfig,
    error::AppError,
    middleware::AppState,
    models::{
        auth::RegisterRequest,
        role::{Role, RoleName},
        user::{NewUser, User, UserProfile},
    },
    repository::{CredentialStore, InMemoryStore},
    routes,
    services::EmailSender,
};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use uuid::Uuid;

pub const SECRET: &str = "test-secret-key-for-testing-only-min-32-chars";

/// 记录所有发送的重置链接
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingMailer {
    /// 每次发送都返回错误的邮件通道
    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_link(&self) -> Option<String> {
        self.sent.lock().unwrap().last().map(|(_, link)| link.clone())
    }
}

#[async_trait]
impl EmailSender for RecordingMailer {
    async fn send_reset_link(&self, to: &str, link: &str) -> Result<(), AppError> {
        if self.fail {
            return Err(AppError::internal_error("smtp relay unreachable"));
        }
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), link.to_string()));
        Ok(())
    }
}

/// 清除重置令牌总是失败的存储，其余操作委托给内存存储
pub struct ClearFailingStore {
    inner: Arc<InMemoryStore>,
}

#[async_trait]
impl CredentialStore for ClearFailingStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.inner.find_by_email(email).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        self.inner.find_by_id(id).await
    }

    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        self.inner.create(user).await
    }

    async fn update_profile(
        &self,
        id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, AppError> {
        self.inner.update_profile(id, name, email).await
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<bool, AppError> {
        self.inner.set_active(id, active).await
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool, AppError> {
        self.inner.update_password_hash(id, password_hash).await
    }

    async fn save_reset_token(
        &self,
        id: Uuid,
        token_digest: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        self.inner.save_reset_token(id, token_digest, expires_at).await
    }

    async fn find_by_reset_token(&self, token_digest: &str) -> Result<Option<User>, AppError> {
        self.inner.find_by_reset_token(token_digest).await
    }

    async fn clear_reset_token(&self, _id: Uuid) -> Result<(), AppError> {
        Err(AppError::internal_error("connection lost"))
    }

    async fn list_page(&self, page: i64, per_page: i64) -> Result<(Vec<User>, i64), AppError> {
        self.inner.list_page(page, per_page).await
    }

    async fn find_role_by_name(&self, name: RoleName) -> Result<Option<Role>, AppError> {
        self.inner.find_role_by_name(name).await
    }

    async fn assign_role(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        assigned_by: Option<Uuid>,
    ) -> Result<(), AppError> {
        self.inner.assign_role(user_id, role_id, assigned_by).await
    }

    async fn remove_all_roles(&self, user_id: Uuid) -> Result<(), AppError> {
        self.inner.remove_all_roles(user_id).await
    }

    async fn replace_roles(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        assigned_by: Option<Uuid>,
    ) -> Result<(), AppError> {
        self.inner.replace_roles(user_id, role_id, assigned_by).await
    }

    async fn roles_of(&self, user_id: Uuid) -> Result<Vec<String>, AppError> {
        self.inner.roles_of(user_id).await
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.inner.ping().await
    }
}

/// 创建测试配置（低成本 Argon2 参数）
pub fn create_test_config() -> AppConfig {
    let mut config = AppConfig::in_memory(SECRET);
    config.mail.frontend_url = "https://lms.test".to_string();
    config.security.hash_memory_kib = 8;
    config.security.hash_iterations = 1;
    config.security.hash_parallelism = 1;
    config
}

fn start_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
    ))
}

pub struct TestApp {
    pub config: Arc<AppConfig>,
    pub clock: Arc<ManualClock>,
    pub store: Arc<InMemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub state: Arc<AppState>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(customize: impl FnOnce(&mut AppConfig)) -> Self {
        let clock = start_clock();
        Self::build(customize, Arc::new(InMemoryStore::new(clock.clone())), clock)
    }

    /// 角色表为空的部署
    pub fn without_roles() -> Self {
        let clock = start_clock();
        Self::build(
            |_| {},
            Arc::new(InMemoryStore::without_roles(clock.clone())),
            clock,
        )
    }

    /// 清除重置令牌失败的部署（暴露重置令牌）
    pub fn with_failing_reset_clear() -> Self {
        let clock = start_clock();
        let store = Arc::new(InMemoryStore::new(clock.clone()));
        let credentials = Arc::new(ClearFailingStore {
            inner: store.clone(),
        });
        Self::assemble(
            |c| c.security.expose_reset_token = true,
            store,
            credentials,
            Arc::new(RecordingMailer::default()),
            clock,
        )
    }

    /// 邮件发送失败的部署
    pub fn with_failing_mailer() -> Self {
        let clock = start_clock();
        let store = Arc::new(InMemoryStore::new(clock.clone()));
        Self::assemble(
            |_| {},
            store.clone(),
            store,
            Arc::new(RecordingMailer::failing()),
            clock,
        )
    }

    fn build(
        customize: impl FnOnce(&mut AppConfig),
        store: Arc<InMemoryStore>,
        clock: Arc<ManualClock>,
    ) -> Self {
        Self::assemble(
            customize,
            store.clone(),
            store,
            Arc::new(RecordingMailer::default()),
            clock,
        )
    }

    fn assemble(
        customize: impl FnOnce(&mut AppConfig),
        store: Arc<InMemoryStore>,
        credentials: Arc<dyn CredentialStore>,
        mailer: Arc<RecordingMailer>,
        clock: Arc<ManualClock>,
    ) -> Self {
        let mut config = create_test_config();
        customize(&mut config);
        let config = Arc::new(config);

        let state = AppState::build(
            config.clone(),
            credentials,
            store.clone(),
            mailer.clone(),
            clock.clone(),
        )
        .expect("Failed to build app state");

        Self {
            config,
            clock,
            store,
            mailer,
            state: Arc::new(state),
        }
    }

    pub fn router(&self) -> Router {
        routes::create_router(self.state.clone())
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> UserProfile {
        self.state
            .auth_service
            .register(RegisterRequest {
                name: name.to_string(),
                email: email.to_string(),
                password: password.to_string(),
            })
            .await
            .expect("Failed to register test user")
    }

    /// 注册用户并设置角色，返回 (用户 ID, 令牌)
    pub async fn user_with_role(&self, name: &str, email: &str, role: &str) -> (Uuid, String) {
        let profile = self.register(name, email, "secret1").await;
        self.state
            .user_service
            .set_role(profile.id, role, profile.id)
            .await
            .expect("Failed to set role");
        let token = self.login_token(email, "secret1").await;
        (profile.id, token)
    }

    pub async fn login_token(&self, email: &str, password: &str) -> String {
        self.state
            .auth_service
            .login(lms_service::models::auth::LoginRequest {
                email: email.to_string(),
                password: password.to_string(),
                remember_me: false,
            })
            .await
            .expect("Failed to log in test user")
            .token
    }
}

/// 构造 JSON 请求
pub fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// 构造无请求体的请求
pub fn empty_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

/// 发送请求并解析 JSON 响应
pub async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}
