//! 数据库连接池与迁移管理

use crate::config::DatabaseConfig;
use secrecy::ExposeSecret;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

/// 创建数据库连接池
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, DbError> {
    tracing::debug!("Creating database connection pool...");

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .connect(config.url.expose_secret())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create database pool");
            DbError::ConnectionFailed(e.to_string())
        })?;

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Database pool created"
    );

    Ok(pool)
}

/// 运行数据库迁移（建表并写入 ADMIN / TEACHER / STUDENT 三个角色）
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    tracing::info!("Running database migrations...");

    sqlx::migrate!("./migrations").run(pool).await.map_err(|e| {
        tracing::error!(error = %e, "Migration failed");
        DbError::MigrationFailed(e.to_string())
    })?;

    tracing::info!("Migrations completed");
    Ok(())
}

/// 数据库健康检查
pub async fn health_check(pool: &PgPool) -> HealthStatus {
    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => HealthStatus::Healthy,
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            HealthStatus::Unhealthy(e.to_string())
        }
    }
}

/// 数据库错误类型
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

/// 健康状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}
