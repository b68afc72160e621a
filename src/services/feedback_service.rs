//! 反馈问答服务

use crate::{
    error::AppError,
    models::feedback::{
        CreateQuestionRequest, FeedbackAnswer, FeedbackQuestion, QuestionWithAnswers,
        SubmitAnswerRequest,
    },
    repository::FeedbackStore,
};
use std::sync::Arc;
use uuid::Uuid;

pub struct FeedbackService {
    store: Arc<dyn FeedbackStore>,
}

impl FeedbackService {
    pub fn new(store: Arc<dyn FeedbackStore>) -> Self {
        Self { store }
    }

    pub async fn create_question(
        &self,
        teacher_id: Uuid,
        req: CreateQuestionRequest,
    ) -> Result<FeedbackQuestion, AppError> {
        let question = req.question.trim();
        if question.is_empty() {
            return Err(AppError::field("question", "question is required"));
        }

        let created = self.store.create_question(teacher_id, question).await?;
        tracing::info!(question_id = %created.id, teacher_id = %teacher_id, "Feedback question created");

        Ok(created)
    }

    pub async fn list_questions(&self) -> Result<Vec<FeedbackQuestion>, AppError> {
        self.store.list_questions().await
    }

    pub async fn submit_answer(
        &self,
        student_id: Uuid,
        req: SubmitAnswerRequest,
    ) -> Result<FeedbackAnswer, AppError> {
        let question_id = Uuid::parse_str(req.question_id.trim())
            .map_err(|_| AppError::field("question_id", "question_id must be a valid UUID"))?;

        if self.store.find_question(question_id).await?.is_none() {
            return Err(AppError::not_found("question not found"));
        }

        let answer = req.answer.trim();
        if answer.is_empty() {
            return Err(AppError::field("answer", "answer is required"));
        }

        let created = self
            .store
            .submit_answer(question_id, student_id, answer)
            .await?;
        tracing::info!(answer_id = %created.id, question_id = %question_id, "Feedback answer submitted");

        Ok(created)
    }

    /// 某位教师的所有问题及其回答
    pub async fn questions_by_teacher(
        &self,
        teacher_id: Uuid,
    ) -> Result<Vec<QuestionWithAnswers>, AppError> {
        self.store.questions_with_answers_by_teacher(teacher_id).await
    }
}
