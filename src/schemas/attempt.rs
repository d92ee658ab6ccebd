use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Attempt;
use crate::db::types::{AttemptStatus, QuestionKind};

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct AnswerSubmit {
    #[validate(length(min = 1, message = "values must not be empty"))]
    pub(crate) values: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptResponse {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) student_id: String,
    pub(crate) question_order: Vec<String>,
    pub(crate) option_orders: HashMap<String, Vec<String>>,
    pub(crate) started_at: String,
    pub(crate) submitted_at: Option<String>,
    pub(crate) expires_at: String,
    pub(crate) status: AttemptStatus,
    pub(crate) score: Option<i32>,
    pub(crate) percentage: Option<f64>,
}

/// Question as presented to the student: personalized option order, no
/// correct answers.
#[derive(Debug, Serialize)]
pub(crate) struct AttemptQuestionResponse {
    pub(crate) id: String,
    pub(crate) kind: QuestionKind,
    pub(crate) prompt: String,
    pub(crate) options: Vec<String>,
    pub(crate) marks: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptContextResponse {
    pub(crate) attempt: AttemptResponse,
    pub(crate) resumed: bool,
    pub(crate) questions: Vec<AttemptQuestionResponse>,
    pub(crate) time_remaining: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnswerAcceptedResponse {
    pub(crate) attempt_id: String,
    pub(crate) question_id: String,
    pub(crate) answered_at: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmitReceiptResponse {
    pub(crate) attempt_id: String,
    pub(crate) status: AttemptStatus,
    pub(crate) submitted_at: Option<String>,
    /// Present only when the quiz reveals results immediately.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) result: Option<AttemptResultResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionResultResponse {
    pub(crate) question_id: String,
    pub(crate) prompt: String,
    pub(crate) kind: QuestionKind,
    pub(crate) response: Vec<String>,
    pub(crate) correct_answers: Vec<String>,
    pub(crate) is_correct: bool,
    pub(crate) marks: i32,
    pub(crate) marks_awarded: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptResultResponse {
    pub(crate) attempt_id: String,
    pub(crate) quiz_id: String,
    pub(crate) student_id: String,
    pub(crate) score: i32,
    pub(crate) total_marks: i32,
    pub(crate) percentage: f64,
    pub(crate) submitted_at: Option<String>,
    pub(crate) questions: Vec<QuestionResultResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptOverviewResponse {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) student_email: String,
    pub(crate) student_name: String,
    pub(crate) started_at: String,
    pub(crate) submitted_at: Option<String>,
    pub(crate) status: AttemptStatus,
    pub(crate) score: Option<i32>,
    pub(crate) percentage: Option<f64>,
}

pub(crate) fn attempt_to_response(attempt: Attempt) -> AttemptResponse {
    AttemptResponse {
        id: attempt.id,
        quiz_id: attempt.quiz_id,
        student_id: attempt.student_id,
        question_order: attempt.question_order.0,
        option_orders: attempt.option_orders.0,
        started_at: format_primitive(attempt.started_at),
        submitted_at: attempt.submitted_at.map(format_primitive),
        expires_at: format_primitive(attempt.expires_at),
        status: attempt.status,
        score: attempt.score,
        percentage: attempt.percentage,
    }
}
