//! 用户服务：资料查询与修改、用户列表、角色与启用状态管理

use super::cache::UserCache;
use crate::{
    error::AppError,
    models::{
        role::RoleName,
        user::{ListUsersQuery, PageMeta, Paginated, UpdateProfileRequest, User, UserProfile},
    },
    repository::CredentialStore,
};
use std::sync::Arc;
use uuid::Uuid;

pub struct UserService {
    store: Arc<dyn CredentialStore>,
    cache: Arc<UserCache>,
}

impl UserService {
    pub fn new(store: Arc<dyn CredentialStore>, cache: Arc<UserCache>) -> Self {
        Self { store, cache }
    }

    async fn load_user(&self, id: Uuid) -> Result<User, AppError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))
    }

    async fn to_profile(&self, user: User) -> Result<UserProfile, AppError> {
        let roles = self.store.roles_of(user.id).await?;
        Ok(UserProfile::from_user(user, roles))
    }

    /// 查询用户资料（先查缓存）
    pub async fn get_user(&self, id: Uuid) -> Result<UserProfile, AppError> {
        if let Some(profile) = self.cache.get_user(id) {
            return Ok(profile);
        }

        let user = self.load_user(id).await?;
        let profile = self.to_profile(user).await?;
        self.cache.put_user(profile.clone());

        Ok(profile)
    }

    /// 分页列出用户
    pub async fn list_users(&self, query: &ListUsersQuery) -> Result<Paginated<UserProfile>, AppError> {
        let (page, per_page) = query.normalize();

        if let Some((data, meta)) = self.cache.get_page(page, per_page) {
            return Ok(Paginated { data, meta });
        }

        let (users, total) = self.store.list_page(page, per_page).await?;
        let mut data = Vec::with_capacity(users.len());
        for user in users {
            data.push(self.to_profile(user).await?);
        }

        let meta = PageMeta {
            page,
            per_page,
            total,
        };
        self.cache.put_page(page, per_page, data.clone(), meta);

        Ok(Paginated { data, meta })
    }

    /// 修改本人资料（姓名、邮箱）
    pub async fn update_profile(
        &self,
        id: Uuid,
        req: UpdateProfileRequest,
    ) -> Result<UserProfile, AppError> {
        let name = req.name.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let email = req.email.as_deref().map(str::trim).filter(|s| !s.is_empty());

        if let Some(email) = email {
            if let Some(existing) = self.store.find_by_email(email).await? {
                if existing.id != id {
                    return Err(AppError::Conflict("email already registered".to_string()));
                }
            }
        }

        let user = self
            .store
            .update_profile(id, name, email)
            .await?
            .ok_or_else(|| AppError::not_found("user not found"))?;

        self.cache.invalidate_user(id);
        tracing::info!(user_id = %id, "Profile updated");

        self.to_profile(user).await
    }

    /// 替换用户角色（先删除全部旧角色，再分配新角色）
    pub async fn set_role(
        &self,
        target: Uuid,
        role: &str,
        actor: Uuid,
    ) -> Result<UserProfile, AppError> {
        let role_name: RoleName = role
            .parse()
            .map_err(|_| AppError::field("role", "role must be one of ADMIN, TEACHER, STUDENT"))?;

        let user = self.load_user(target).await?;
        let role = self
            .store
            .find_role_by_name(role_name)
            .await?
            .ok_or_else(|| AppError::BadRequest(format!("role {} not found", role_name)))?;

        self.store
            .replace_roles(user.id, role.id, Some(actor))
            .await?;
        self.cache.invalidate_user(user.id);

        tracing::info!(user_id = %user.id, role = %role_name, actor = %actor, "Role replaced");
        self.to_profile(user).await
    }

    pub async fn activate(&self, id: Uuid) -> Result<(), AppError> {
        self.set_active(id, true).await
    }

    pub async fn deactivate(&self, id: Uuid) -> Result<(), AppError> {
        self.set_active(id, false).await
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<(), AppError> {
        if !self.store.set_active(id, active).await? {
            return Err(AppError::not_found("user not found"));
        }
        self.cache.invalidate_user(id);

        tracing::info!(user_id = %id, active, "Account status changed");
        Ok(())
    }
}
