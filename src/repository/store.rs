//! Storage contracts consumed by the services
//!
//! Two backends implement these traits: PostgreSQL (`UserRepository`,
//! `FeedbackRepository`) and the process-local `InMemoryStore`.

use crate::{
    error::AppError,
    models::{
        feedback::{FeedbackAnswer, FeedbackQuestion, QuestionWithAnswers},
        role::{Role, RoleName},
        user::{NewUser, User},
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Users, password hashes, role assignments and reset-token state.
///
/// Soft-deleted users are invisible to every lookup.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// Fails with `Conflict` when the email belongs to a live user
    async fn create(&self, user: NewUser) -> Result<User, AppError>;

    /// `None` fields are left unchanged. Fails with `Conflict` on a taken email.
    async fn update_profile(
        &self,
        id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, AppError>;

    /// Returns false when the user does not exist
    async fn set_active(&self, id: Uuid, active: bool) -> Result<bool, AppError>;

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool, AppError>;

    /// Overwrites any outstanding token for the user
    async fn save_reset_token(
        &self,
        id: Uuid,
        token_digest: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn find_by_reset_token(&self, token_digest: &str) -> Result<Option<User>, AppError>;

    async fn clear_reset_token(&self, id: Uuid) -> Result<(), AppError>;

    /// One page of live users, newest first, plus the total count
    async fn list_page(&self, page: i64, per_page: i64) -> Result<(Vec<User>, i64), AppError>;

    async fn find_role_by_name(&self, name: RoleName) -> Result<Option<Role>, AppError>;

    async fn assign_role(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        assigned_by: Option<Uuid>,
    ) -> Result<(), AppError>;

    async fn remove_all_roles(&self, user_id: Uuid) -> Result<(), AppError>;

    /// Remove every assignment and add `role_id` as one atomic write
    async fn replace_roles(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        assigned_by: Option<Uuid>,
    ) -> Result<(), AppError>;

    async fn roles_of(&self, user_id: Uuid) -> Result<Vec<String>, AppError>;

    /// Connectivity probe for readiness checks
    async fn ping(&self) -> Result<(), AppError>;
}

/// Feedback questions and answers
#[async_trait]
pub trait FeedbackStore: Send + Sync {
    async fn create_question(
        &self,
        created_by: Uuid,
        question: &str,
    ) -> Result<FeedbackQuestion, AppError>;

    async fn list_questions(&self) -> Result<Vec<FeedbackQuestion>, AppError>;

    async fn find_question(&self, id: Uuid) -> Result<Option<FeedbackQuestion>, AppError>;

    async fn submit_answer(
        &self,
        question_id: Uuid,
        student_id: Uuid,
        answer: &str,
    ) -> Result<FeedbackAnswer, AppError>;

    /// Questions authored by `teacher_id`, each with its answers and their authors
    async fn questions_with_answers_by_teacher(
        &self,
        teacher_id: Uuid,
    ) -> Result<Vec<QuestionWithAnswers>, AppError>;
}
