//! User repository (数据库访问层)

use super::{role_repo::RoleRepository, store::CredentialStore};
use crate::{
    db::{self, HealthStatus},
    error::AppError,
    models::{
        role::{Role, RoleName},
        user::{page_offset, NewUser, User},
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, name, email, password_hash, is_active, reset_token_hash, \
     reset_expires_at, created_at, updated_at, deleted_at";

pub struct UserRepository {
    db: PgPool,
    roles: RoleRepository,
}

impl UserRepository {
    pub fn new(db: PgPool) -> Self {
        let roles = RoleRepository::new(db.clone());
        Self { db, roles }
    }
}

/// 唯一约束冲突转换为 Conflict，其余保持数据库错误
fn map_email_conflict(e: sqlx::Error) -> AppError {
    match &e {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::Conflict("email already registered".to_string())
        }
        _ => AppError::Database(e),
    }
}

#[async_trait]
impl CredentialStore for UserRepository {
    /// 根据邮箱查找用户
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND deleted_at IS NULL"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    /// 根据 ID 查找用户
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    /// 创建用户
    async fn create(&self, user: NewUser) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, name, email, password_hash, is_active)
            VALUES ($1, $2, $3, $4, TRUE)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.db)
        .await
        .map_err(map_email_conflict)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(name)
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(map_email_conflict)
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE users SET is_active = $2, updated_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(active)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// 更新密码
    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = $2, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn save_reset_token(
        &self,
        id: Uuid,
        token_digest: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE users
            SET reset_token_hash = $2, reset_expires_at = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token_digest)
        .bind(expires_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn find_by_reset_token(&self, token_digest: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE reset_token_hash = $1 AND deleted_at IS NULL"
        ))
        .bind(token_digest)
        .fetch_optional(&self.db)
        .await?;

        Ok(user)
    }

    async fn clear_reset_token(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE users
            SET reset_token_hash = NULL, reset_expires_at = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn list_page(&self, page: i64, per_page: i64) -> Result<(Vec<User>, i64), AppError> {
        let offset = page_offset(page, per_page);

        let users = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE deleted_at IS NULL
            ORDER BY created_at DESC, id
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(per_page)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL")
                .fetch_one(&self.db)
                .await?;

        Ok((users, total))
    }

    async fn find_role_by_name(&self, name: RoleName) -> Result<Option<Role>, AppError> {
        self.roles.find_by_name(name).await
    }

    async fn assign_role(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        assigned_by: Option<Uuid>,
    ) -> Result<(), AppError> {
        self.roles.assign(user_id, role_id, assigned_by).await
    }

    async fn remove_all_roles(&self, user_id: Uuid) -> Result<(), AppError> {
        self.roles.remove_all(user_id).await
    }

    async fn replace_roles(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        assigned_by: Option<Uuid>,
    ) -> Result<(), AppError> {
        self.roles.replace(user_id, role_id, assigned_by).await
    }

    async fn roles_of(&self, user_id: Uuid) -> Result<Vec<String>, AppError> {
        self.roles.names_for_user(user_id).await
    }

    async fn ping(&self) -> Result<(), AppError> {
        match db::health_check(&self.db).await {
            HealthStatus::Healthy => Ok(()),
            HealthStatus::Unhealthy(msg) => Err(AppError::Internal(msg)),
        }
    }
}
