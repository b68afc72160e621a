//! Feedback question/answer models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FeedbackQuestion {
    pub id: Uuid,
    pub question: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct FeedbackAnswer {
    pub id: Uuid,
    pub question_id: Uuid,
    pub student_id: Uuid,
    pub answer: String,
    pub created_at: DateTime<Utc>,
}

/// Answering student, as shown to teachers
#[derive(Debug, Clone, Serialize)]
pub struct StudentSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// Answer row joined with its author
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnswerRow {
    pub id: Uuid,
    pub question_id: Uuid,
    pub student_id: Uuid,
    pub answer: String,
    pub created_at: DateTime<Utc>,
    pub student_name: String,
    pub student_email: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerWithStudent {
    pub id: Uuid,
    pub question_id: Uuid,
    pub answer: String,
    pub created_at: DateTime<Utc>,
    pub student: StudentSummary,
}

impl From<AnswerRow> for AnswerWithStudent {
    fn from(row: AnswerRow) -> Self {
        Self {
            id: row.id,
            question_id: row.question_id,
            answer: row.answer,
            created_at: row.created_at,
            student: StudentSummary {
                id: row.student_id,
                name: row.student_name,
                email: row.student_email,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QuestionWithAnswers {
    #[serde(flatten)]
    pub question: FeedbackQuestion,
    pub answers: Vec<AnswerWithStudent>,
}

#[derive(Debug, Deserialize, validator::Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 2000, message = "question must be 1-2000 characters"))]
    pub question: String,
}

#[derive(Debug, Deserialize, validator::Validate)]
pub struct SubmitAnswerRequest {
    #[validate(length(min = 1, message = "question_id is required"))]
    pub question_id: String,
    #[validate(length(min = 1, max = 5000, message = "answer must be 1-5000 characters"))]
    pub answer: String,
}
