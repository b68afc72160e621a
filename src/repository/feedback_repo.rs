//! Feedback repository (数据库访问层)

use super::store::FeedbackStore;
use crate::{
    error::AppError,
    models::feedback::{
        AnswerRow, AnswerWithStudent, FeedbackAnswer, FeedbackQuestion, QuestionWithAnswers,
    },
};
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

pub struct FeedbackRepository {
    db: PgPool,
}

impl FeedbackRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl FeedbackStore for FeedbackRepository {
    async fn create_question(
        &self,
        created_by: Uuid,
        question: &str,
    ) -> Result<FeedbackQuestion, AppError> {
        let row = sqlx::query_as::<_, FeedbackQuestion>(
            r#"
            INSERT INTO feedback_questions (id, question, created_by)
            VALUES ($1, $2, $3)
            RETURNING id, question, created_by, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(question)
        .bind(created_by)
        .fetch_one(&self.db)
        .await?;

        Ok(row)
    }

    async fn list_questions(&self) -> Result<Vec<FeedbackQuestion>, AppError> {
        let rows = sqlx::query_as::<_, FeedbackQuestion>(
            r#"
            SELECT id, question, created_by, created_at, updated_at
            FROM feedback_questions
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    async fn find_question(&self, id: Uuid) -> Result<Option<FeedbackQuestion>, AppError> {
        let row = sqlx::query_as::<_, FeedbackQuestion>(
            "SELECT id, question, created_by, created_at, updated_at FROM feedback_questions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row)
    }

    async fn submit_answer(
        &self,
        question_id: Uuid,
        student_id: Uuid,
        answer: &str,
    ) -> Result<FeedbackAnswer, AppError> {
        let row = sqlx::query_as::<_, FeedbackAnswer>(
            r#"
            INSERT INTO feedback_answers (id, question_id, student_id, answer)
            VALUES ($1, $2, $3, $4)
            RETURNING id, question_id, student_id, answer, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(question_id)
        .bind(student_id)
        .bind(answer)
        .fetch_one(&self.db)
        .await?;

        Ok(row)
    }

    async fn questions_with_answers_by_teacher(
        &self,
        teacher_id: Uuid,
    ) -> Result<Vec<QuestionWithAnswers>, AppError> {
        let questions = sqlx::query_as::<_, FeedbackQuestion>(
            r#"
            SELECT id, question, created_by, created_at, updated_at
            FROM feedback_questions
            WHERE created_by = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(teacher_id)
        .fetch_all(&self.db)
        .await?;

        if questions.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = questions.iter().map(|q| q.id).collect();
        let answers = sqlx::query_as::<_, AnswerRow>(
            r#"
            SELECT a.id, a.question_id, a.student_id, a.answer, a.created_at,
                   u.name AS student_name, u.email AS student_email
            FROM feedback_answers a
            INNER JOIN users u ON u.id = a.student_id
            WHERE a.question_id = ANY($1)
            ORDER BY a.created_at
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let mut grouped: HashMap<Uuid, Vec<AnswerWithStudent>> = HashMap::new();
        for row in answers {
            grouped
                .entry(row.question_id)
                .or_default()
                .push(AnswerWithStudent::from(row));
        }

        Ok(questions
            .into_iter()
            .map(|question| {
                let answers = grouped.remove(&question.id).unwrap_or_default();
                QuestionWithAnswers { question, answers }
            })
            .collect())
    }
}
