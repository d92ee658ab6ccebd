use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use time::OffsetDateTime;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentUser;
use crate::core::state::AppState;
use crate::core::time::format_primitive;
use crate::db::models::{Attempt, Question, Quiz, User};
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::attempt::{
    attempt_to_response, AnswerAcceptedResponse, AnswerSubmit, AttemptContextResponse,
    AttemptQuestionResponse, AttemptResultResponse, QuestionResultResponse,
    SubmitReceiptResponse,
};
use crate::services::access_policy;
use crate::services::attempt_flow;
use crate::services::quiz_timing;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/quiz/:quiz_id/start", post(start_attempt))
        .route("/:attempt_id", get(get_attempt))
        .route("/:attempt_id/answers/:question_id", put(record_answer))
        .route("/:attempt_id/submit", post(submit_attempt))
        .route("/:attempt_id/result", get(get_result))
}

async fn start_attempt(
    Path(quiz_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AttemptContextResponse>, ApiError> {
    let quiz = repositories::quizzes::find_by_id(state.db(), &quiz_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch quiz"))?
        .ok_or_else(|| ApiError::NotFound("Quiz not found".to_string()))?;

    let started = attempt_flow::start_attempt(state.db(), &user, &quiz).await?;

    let questions = build_question_context(&state, &quiz, &started.attempt).await?;
    let time_remaining = remaining_seconds(&started.attempt, &quiz);

    Ok(Json(AttemptContextResponse {
        attempt: attempt_to_response(started.attempt),
        resumed: started.resumed,
        questions,
        time_remaining,
    }))
}

async fn get_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AttemptContextResponse>, ApiError> {
    let (attempt, quiz) = fetch_attempt_and_quiz(&state, &attempt_id).await?;
    ensure_attempt_access(&state, &user, &attempt, &quiz).await?;

    let questions = build_question_context(&state, &quiz, &attempt).await?;
    let time_remaining = remaining_seconds(&attempt, &quiz);

    Ok(Json(AttemptContextResponse {
        attempt: attempt_to_response(attempt),
        resumed: true,
        questions,
        time_remaining,
    }))
}

async fn record_answer(
    Path((attempt_id, question_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<AnswerSubmit>,
) -> Result<Json<AnswerAcceptedResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let (attempt, quiz) = fetch_attempt_and_quiz(&state, &attempt_id).await?;
    if attempt.student_id != user.id {
        return Err(ApiError::forbidden("Access denied"));
    }

    let answer =
        attempt_flow::record_answer(state.db(), &attempt, &quiz, &question_id, payload.values)
            .await?;

    Ok(Json(AnswerAcceptedResponse {
        attempt_id: answer.attempt_id,
        question_id: answer.question_id,
        answered_at: format_primitive(answer.answered_at),
    }))
}

async fn submit_attempt(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<SubmitReceiptResponse>, ApiError> {
    let (attempt, quiz) = fetch_attempt_and_quiz(&state, &attempt_id).await?;
    if attempt.student_id != user.id {
        return Err(ApiError::forbidden("Access denied"));
    }

    let (finalized, _graded) = attempt_flow::submit_attempt(state.db(), &attempt, &quiz).await?;

    let result = if quiz.show_results_immediately {
        Some(build_result(&state, &quiz, &finalized).await?)
    } else {
        None
    };

    Ok(Json(SubmitReceiptResponse {
        attempt_id: finalized.id.clone(),
        status: finalized.status,
        submitted_at: finalized.submitted_at.map(format_primitive),
        result,
    }))
}

async fn get_result(
    Path(attempt_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<AttemptResultResponse>, ApiError> {
    let (attempt, quiz) = fetch_attempt_and_quiz(&state, &attempt_id).await?;

    if matches!(user.role, UserRole::Student) && attempt.student_id != user.id {
        return Err(ApiError::forbidden("Access denied"));
    }

    let owns_batch = match user.role {
        UserRole::Teacher => {
            let batch = repositories::batches::find_by_id(state.db(), &quiz.batch_id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to fetch batch"))?;
            batch.is_some_and(|batch| batch.teacher_id == user.id)
        }
        _ => false,
    };
    let enrolled = match user.role {
        UserRole::Student => {
            repositories::enrollments::is_active_member(state.db(), &quiz.batch_id, &user.id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to fetch enrollment"))?
        }
        _ => false,
    };

    if !access_policy::can_view_results(&user, &quiz, owns_batch, enrolled) {
        return Err(ApiError::forbidden("Results are not available for this quiz"));
    }

    if attempt.submitted_at.is_none() {
        return Err(ApiError::BadRequest("Attempt has not been submitted".to_string()));
    }

    Ok(Json(build_result(&state, &quiz, &attempt).await?))
}

async fn fetch_attempt_and_quiz(
    state: &AppState,
    attempt_id: &str,
) -> Result<(Attempt, Quiz), ApiError> {
    let attempt = repositories::attempts::find_by_id(state.db(), attempt_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch attempt"))?
        .ok_or_else(|| ApiError::NotFound("Attempt not found".to_string()))?;

    let quiz = repositories::quizzes::fetch_one_by_id(state.db(), &attempt.quiz_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch quiz"))?;

    Ok((attempt, quiz))
}

async fn ensure_attempt_access(
    state: &AppState,
    user: &User,
    attempt: &Attempt,
    quiz: &Quiz,
) -> Result<(), ApiError> {
    if attempt.student_id == user.id {
        return Ok(());
    }

    match user.role {
        UserRole::Admin => Ok(()),
        UserRole::Teacher => {
            let batch = repositories::batches::find_by_id(state.db(), &quiz.batch_id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to fetch batch"))?;
            if batch.is_some_and(|batch| batch.teacher_id == user.id) {
                Ok(())
            } else {
                Err(ApiError::forbidden("Access denied"))
            }
        }
        UserRole::Student => Err(ApiError::forbidden("Access denied")),
    }
}

/// Questions in the attempt's frozen order, options in the attempt's frozen
/// per-question order, correct answers stripped.
async fn build_question_context(
    state: &AppState,
    quiz: &Quiz,
    attempt: &Attempt,
) -> Result<Vec<AttemptQuestionResponse>, ApiError> {
    let questions = repositories::questions::list_by_quiz(state.db(), &quiz.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch questions"))?;

    let mut by_id: HashMap<String, Question> =
        questions.into_iter().map(|question| (question.id.clone(), question)).collect();

    let mut context = Vec::with_capacity(by_id.len());
    for question_id in &attempt.question_order.0 {
        if let Some(question) = by_id.remove(question_id) {
            let options = attempt
                .option_orders
                .0
                .get(question_id)
                .cloned()
                .unwrap_or_else(|| question.options.0.clone());
            context.push(AttemptQuestionResponse {
                id: question.id,
                kind: question.kind,
                prompt: question.prompt,
                options,
                marks: question.marks,
            });
        }
    }

    Ok(context)
}

async fn build_result(
    state: &AppState,
    quiz: &Quiz,
    attempt: &Attempt,
) -> Result<AttemptResultResponse, ApiError> {
    let questions = repositories::questions::list_by_quiz(state.db(), &quiz.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch questions"))?;
    let answers = repositories::answers::list_by_attempt(state.db(), &attempt.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch answers"))?;

    let answers_by_question: HashMap<String, _> =
        answers.into_iter().map(|answer| (answer.question_id.clone(), answer)).collect();

    let mut by_id: HashMap<String, Question> =
        questions.into_iter().map(|question| (question.id.clone(), question)).collect();

    let mut ordered: Vec<Question> = attempt
        .question_order
        .0
        .iter()
        .filter_map(|question_id| by_id.remove(question_id))
        .collect();
    let mut leftovers: Vec<Question> = by_id.into_values().collect();
    leftovers.sort_by_key(|question| question.position);
    ordered.extend(leftovers);

    let mut total_marks = 0;
    let results: Vec<QuestionResultResponse> = ordered
        .into_iter()
        .map(|question| {
            total_marks += question.marks;
            let answer = answers_by_question.get(&question.id);
            QuestionResultResponse {
                question_id: question.id,
                prompt: question.prompt,
                kind: question.kind,
                response: answer.map(|a| a.response.0.clone()).unwrap_or_default(),
                correct_answers: question.correct_answers.0,
                is_correct: answer.and_then(|a| a.is_correct).unwrap_or(false),
                marks: question.marks,
                marks_awarded: answer.and_then(|a| a.marks_awarded).unwrap_or(0),
            }
        })
        .collect();

    Ok(AttemptResultResponse {
        attempt_id: attempt.id.clone(),
        quiz_id: quiz.id.clone(),
        student_id: attempt.student_id.clone(),
        score: attempt.score.unwrap_or(0),
        total_marks,
        percentage: attempt.percentage.unwrap_or(0.0),
        submitted_at: attempt.submitted_at.map(format_primitive),
        questions: results,
    })
}

fn remaining_seconds(attempt: &Attempt, quiz: &Quiz) -> i64 {
    if attempt.submitted_at.is_some() {
        return 0;
    }

    let deadline = quiz_timing::hard_deadline(attempt.expires_at, quiz.end_time);
    let remaining =
        deadline.assume_utc().unix_timestamp() - OffsetDateTime::now_utc().unix_timestamp();
    remaining.max(0)
}
