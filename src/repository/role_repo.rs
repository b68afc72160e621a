//! Role repository (数据库访问层)

use crate::{
    error::AppError,
    models::role::{Role, RoleName},
};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

#[derive(Clone)]
pub struct RoleRepository {
    db: PgPool,
}

impl RoleRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 根据名称查找角色
    pub async fn find_by_name(&self, name: RoleName) -> Result<Option<Role>, AppError> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT id, name, description, created_at, updated_at FROM roles WHERE name = $1",
        )
        .bind(name.as_str())
        .fetch_optional(&self.db)
        .await?;

        Ok(role)
    }

    /// 用户当前拥有的角色名
    pub async fn names_for_user(&self, user_id: Uuid) -> Result<Vec<String>, AppError> {
        let names = sqlx::query_scalar::<_, String>(
            r#"
            SELECT r.name
            FROM roles r
            INNER JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            ORDER BY r.name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(names)
    }

    pub async fn assign(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        assigned_by: Option<Uuid>,
    ) -> Result<(), AppError> {
        let mut conn = self.db.acquire().await?;
        insert_assignment(&mut conn, user_id, role_id, assigned_by).await
    }

    pub async fn remove_all(&self, user_id: Uuid) -> Result<(), AppError> {
        let mut conn = self.db.acquire().await?;
        delete_assignments(&mut conn, user_id).await
    }

    /// 在同一事务中删除旧角色并分配新角色，并发读取方不会看到无角色的中间状态
    pub async fn replace(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        assigned_by: Option<Uuid>,
    ) -> Result<(), AppError> {
        let mut tx = self.db.begin().await?;

        delete_assignments(&mut tx, user_id).await?;
        insert_assignment(&mut tx, user_id, role_id, assigned_by).await?;

        tx.commit().await?;
        Ok(())
    }
}

async fn insert_assignment(
    conn: &mut PgConnection,
    user_id: Uuid,
    role_id: Uuid,
    assigned_by: Option<Uuid>,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO user_roles (user_id, role_id, assigned_by)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, role_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(role_id)
    .bind(assigned_by)
    .execute(conn)
    .await?;

    Ok(())
}

async fn delete_assignments(conn: &mut PgConnection, user_id: Uuid) -> Result<(), AppError> {
    sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
        .bind(user_id)
        .execute(conn)
        .await?;

    Ok(())
}
