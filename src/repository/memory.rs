//! 进程内存储
//!
//! 与 PostgreSQL 后端实现相同的存储契约，用于本地开发和测试。
//! 所有写操作在同一把写锁内完成，因此角色替换等组合写入是原子的。

use super::store::{CredentialStore, FeedbackStore};
use crate::{
    clock::Clock,
    error::AppError,
    models::{
        feedback::{
            AnswerWithStudent, FeedbackAnswer, FeedbackQuestion, QuestionWithAnswers,
            StudentSummary,
        },
        role::{Role, RoleName, UserRole},
        user::{page_offset, NewUser, User},
    },
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct State {
    users: Vec<User>,
    roles: Vec<Role>,
    assignments: Vec<UserRole>,
    questions: Vec<FeedbackQuestion>,
    answers: Vec<FeedbackAnswer>,
}

impl State {
    fn live_user(&self, id: Uuid) -> Option<&User> {
        self.users
            .iter()
            .find(|u| u.id == id && u.deleted_at.is_none())
    }

    fn live_user_mut(&mut self, id: Uuid) -> Option<&mut User> {
        self.users
            .iter_mut()
            .find(|u| u.id == id && u.deleted_at.is_none())
    }

    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .iter()
            .any(|u| u.deleted_at.is_none() && u.email == email && Some(u.id) != except)
    }
}

pub struct InMemoryStore {
    state: RwLock<State>,
    clock: Arc<dyn Clock>,
}

impl InMemoryStore {
    /// 创建存储并写入 ADMIN / TEACHER / STUDENT 三个角色
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        let roles = RoleName::ALL
            .into_iter()
            .map(|name| Role {
                id: Uuid::new_v4(),
                name: name.as_str().to_string(),
                description: None,
                created_at: now,
                updated_at: now,
            })
            .collect();

        Self {
            state: RwLock::new(State {
                roles,
                ..State::default()
            }),
            clock,
        }
    }

    /// 不写入任何角色（用于模拟角色缺失的部署）
    pub fn without_roles(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: RwLock::new(State::default()),
            clock,
        }
    }

    /// 软删除用户
    pub async fn soft_delete(&self, id: Uuid) -> bool {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        match state.live_user_mut(id) {
            Some(user) => {
                user.deleted_at = Some(now);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.email == email && u.deleted_at.is_none())
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.state.read().await.live_user(id).cloned())
    }

    async fn create(&self, new_user: NewUser) -> Result<User, AppError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        if state.email_taken(&new_user.email, None) {
            return Err(AppError::Conflict("email already registered".to_string()));
        }

        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name,
            email: new_user.email,
            password_hash: new_user.password_hash,
            is_active: true,
            reset_token_hash: None,
            reset_expires_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        state.users.push(user.clone());

        Ok(user)
    }

    async fn update_profile(
        &self,
        id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, AppError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        if let Some(email) = email {
            if state.email_taken(email, Some(id)) {
                return Err(AppError::Conflict("email already registered".to_string()));
            }
        }

        let Some(user) = state.live_user_mut(id) else {
            return Ok(None);
        };
        if let Some(name) = name {
            user.name = name.to_string();
        }
        if let Some(email) = email {
            user.email = email.to_string();
        }
        user.updated_at = now;

        Ok(Some(user.clone()))
    }

    async fn set_active(&self, id: Uuid, active: bool) -> Result<bool, AppError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        Ok(match state.live_user_mut(id) {
            Some(user) => {
                user.is_active = active;
                user.updated_at = now;
                true
            }
            None => false,
        })
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> Result<bool, AppError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        Ok(match state.live_user_mut(id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                user.updated_at = now;
                true
            }
            None => false,
        })
    }

    async fn save_reset_token(
        &self,
        id: Uuid,
        token_digest: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if let Some(user) = state.live_user_mut(id) {
            user.reset_token_hash = Some(token_digest.to_string());
            user.reset_expires_at = Some(expires_at);
        }
        Ok(())
    }

    async fn find_by_reset_token(&self, token_digest: &str) -> Result<Option<User>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .find(|u| {
                u.deleted_at.is_none() && u.reset_token_hash.as_deref() == Some(token_digest)
            })
            .cloned())
    }

    async fn clear_reset_token(&self, id: Uuid) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        if let Some(user) = state.users.iter_mut().find(|u| u.id == id) {
            user.reset_token_hash = None;
            user.reset_expires_at = None;
        }
        Ok(())
    }

    async fn list_page(&self, page: i64, per_page: i64) -> Result<(Vec<User>, i64), AppError> {
        let state = self.state.read().await;

        // 新用户在前；时间相同时按插入顺序倒序
        let mut live: Vec<&User> = state
            .users
            .iter()
            .rev()
            .filter(|u| u.deleted_at.is_none())
            .collect();
        live.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = live.len() as i64;
        let offset = usize::try_from(page_offset(page, per_page)).unwrap_or(usize::MAX);
        let items = live
            .into_iter()
            .skip(offset)
            .take(per_page.max(0) as usize)
            .cloned()
            .collect();

        Ok((items, total))
    }

    async fn find_role_by_name(&self, name: RoleName) -> Result<Option<Role>, AppError> {
        let state = self.state.read().await;
        Ok(state
            .roles
            .iter()
            .find(|r| r.name == name.as_str())
            .cloned())
    }

    async fn assign_role(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        assigned_by: Option<Uuid>,
    ) -> Result<(), AppError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;
        insert_assignment(&mut state, user_id, role_id, assigned_by, now)
    }

    async fn remove_all_roles(&self, user_id: Uuid) -> Result<(), AppError> {
        let mut state = self.state.write().await;
        state.assignments.retain(|a| a.user_id != user_id);
        Ok(())
    }

    async fn replace_roles(
        &self,
        user_id: Uuid,
        role_id: Uuid,
        assigned_by: Option<Uuid>,
    ) -> Result<(), AppError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        // 先校验，保证失败时不留下半完成的状态
        if !state.roles.iter().any(|r| r.id == role_id) {
            return Err(AppError::not_found("role not found"));
        }
        state.assignments.retain(|a| a.user_id != user_id);
        insert_assignment(&mut state, user_id, role_id, assigned_by, now)
    }

    async fn roles_of(&self, user_id: Uuid) -> Result<Vec<String>, AppError> {
        let state = self.state.read().await;
        let mut names: Vec<String> = state
            .assignments
            .iter()
            .filter(|a| a.user_id == user_id)
            .filter_map(|a| state.roles.iter().find(|r| r.id == a.role_id))
            .map(|r| r.name.clone())
            .collect();
        names.sort();

        Ok(names)
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}

fn insert_assignment(
    state: &mut State,
    user_id: Uuid,
    role_id: Uuid,
    assigned_by: Option<Uuid>,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    if state.live_user(user_id).is_none() {
        return Err(AppError::not_found("user not found"));
    }
    if !state.roles.iter().any(|r| r.id == role_id) {
        return Err(AppError::not_found("role not found"));
    }

    let exists = state
        .assignments
        .iter()
        .any(|a| a.user_id == user_id && a.role_id == role_id);
    if !exists {
        state.assignments.push(UserRole {
            user_id,
            role_id,
            assigned_by,
            created_at: now,
        });
    }

    Ok(())
}

#[async_trait]
impl FeedbackStore for InMemoryStore {
    async fn create_question(
        &self,
        created_by: Uuid,
        question: &str,
    ) -> Result<FeedbackQuestion, AppError> {
        let now = self.clock.now();
        let row = FeedbackQuestion {
            id: Uuid::new_v4(),
            question: question.to_string(),
            created_by,
            created_at: now,
            updated_at: now,
        };

        self.state.write().await.questions.push(row.clone());
        Ok(row)
    }

    async fn list_questions(&self) -> Result<Vec<FeedbackQuestion>, AppError> {
        let state = self.state.read().await;
        Ok(state.questions.iter().rev().cloned().collect())
    }

    async fn find_question(&self, id: Uuid) -> Result<Option<FeedbackQuestion>, AppError> {
        let state = self.state.read().await;
        Ok(state.questions.iter().find(|q| q.id == id).cloned())
    }

    async fn submit_answer(
        &self,
        question_id: Uuid,
        student_id: Uuid,
        answer: &str,
    ) -> Result<FeedbackAnswer, AppError> {
        let now = self.clock.now();
        let mut state = self.state.write().await;

        if !state.questions.iter().any(|q| q.id == question_id) {
            return Err(AppError::not_found("question not found"));
        }

        let row = FeedbackAnswer {
            id: Uuid::new_v4(),
            question_id,
            student_id,
            answer: answer.to_string(),
            created_at: now,
        };
        state.answers.push(row.clone());

        Ok(row)
    }

    async fn questions_with_answers_by_teacher(
        &self,
        teacher_id: Uuid,
    ) -> Result<Vec<QuestionWithAnswers>, AppError> {
        let state = self.state.read().await;

        Ok(state
            .questions
            .iter()
            .rev()
            .filter(|q| q.created_by == teacher_id)
            .map(|q| {
                let answers = state
                    .answers
                    .iter()
                    .filter(|a| a.question_id == q.id)
                    .filter_map(|a| {
                        let student = state.users.iter().find(|u| u.id == a.student_id)?;
                        Some(AnswerWithStudent {
                            id: a.id,
                            question_id: a.question_id,
                            answer: a.answer.clone(),
                            created_at: a.created_at,
                            student: StudentSummary {
                                id: student.id,
                                name: student.name.clone(),
                                email: student.email.clone(),
                            },
                        })
                    })
                    .collect();

                QuestionWithAnswers {
                    question: q.clone(),
                    answers,
                }
            })
            .collect())
    }
}
