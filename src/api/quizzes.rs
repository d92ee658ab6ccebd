use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_batch_teacher, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::{primitive_now_utc, to_primitive_utc};
use crate::db::models::{Quiz, User};
use crate::db::types::{QuizStatus, UserRole};
use crate::repositories;
use crate::schemas::attempt::AttemptOverviewResponse;
use crate::schemas::quiz::{
    question_to_response, quiz_to_response, QuestionCreate, QuestionResponse, QuizCreate,
    QuizResponse, QuizUpdate,
};
use crate::services::access_policy;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/:batch_id", post(create_quiz).get(list_quizzes))
        .route(
            "/:batch_id/:quiz_id",
            get(get_quiz).patch(update_quiz).delete(delete_quiz),
        )
        .route("/:batch_id/:quiz_id/publish", post(publish_quiz))
        .route("/:batch_id/:quiz_id/archive", post(archive_quiz))
        .route("/:batch_id/:quiz_id/questions", post(add_question))
        .route(
            "/:batch_id/:quiz_id/questions/:question_id",
            put(update_question).delete(delete_question),
        )
        .route("/:batch_id/:quiz_id/attempts", get(list_attempts))
}

async fn create_quiz(
    Path(batch_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<QuizCreate>,
) -> Result<(StatusCode, Json<QuizResponse>), ApiError> {
    let batch = require_batch_teacher(&state, &user, &batch_id).await?;

    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    if payload.end_time <= payload.start_time {
        return Err(ApiError::BadRequest("end_time must be after start_time".to_string()));
    }

    let limits = state.settings().quiz();
    if payload.questions.len() as u64 > limits.max_questions_per_quiz {
        return Err(ApiError::BadRequest(format!(
            "A quiz can hold at most {} questions",
            limits.max_questions_per_quiz
        )));
    }
    for question in &payload.questions {
        validate_question_payload(&state, question)?;
    }

    let now = primitive_now_utc();
    let quiz_id = Uuid::new_v4().to_string();

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let quiz = repositories::quizzes::create(
        &mut *tx,
        repositories::quizzes::CreateQuiz {
            id: &quiz_id,
            batch_id: &batch.id,
            title: &payload.title,
            description: payload.description.as_deref(),
            start_time: to_primitive_utc(payload.start_time),
            end_time: to_primitive_utc(payload.end_time),
            duration_minutes: payload.duration_minutes,
            randomize_questions: payload.randomize_questions,
            randomize_options: payload.randomize_options,
            show_results_immediately: payload.show_results_immediately,
            max_attempts: payload.max_attempts,
            created_by: &user.id,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create quiz"))?;

    let mut questions = Vec::with_capacity(payload.questions.len());
    let mut total_marks = 0;
    for (index, question) in payload.questions.iter().enumerate() {
        total_marks += question.marks;
        let created = repositories::questions::create(
            &mut *tx,
            repositories::questions::CreateQuestion {
                id: &Uuid::new_v4().to_string(),
                quiz_id: &quiz_id,
                kind: question.kind,
                prompt: &question.prompt,
                options: serde_json::json!(question.effective_options()),
                correct_answers: serde_json::json!(question.correct_answers),
                marks: question.marks,
                position: if question.position > 0 { question.position } else { index as i32 },
                created_at: now,
                updated_at: now,
            },
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to create question"))?;
        questions.push(created);
    }

    repositories::quizzes::set_total_marks(&mut *tx, &quiz_id, total_marks, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update total marks"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    tracing::info!(
        user_id = %user.id,
        batch_id = %batch.id,
        quiz_id = %quiz_id,
        action = "quiz_create",
        "Quiz created"
    );

    let quiz = Quiz { total_marks, ..quiz };
    Ok((StatusCode::CREATED, Json(quiz_to_response(quiz, questions))))
}

async fn list_quizzes(
    Path(batch_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<QuizResponse>>, ApiError> {
    ensure_batch_visible(&state, &user, &batch_id).await?;

    let quizzes = repositories::quizzes::list_by_batch(state.db(), &batch_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list quizzes"))?;

    let visible: Vec<QuizResponse> = quizzes
        .into_iter()
        .filter(|quiz| {
            !matches!(user.role, UserRole::Student) || quiz.status != QuizStatus::Draft
        })
        .map(|quiz| quiz_to_response(quiz, Vec::new()))
        .collect();

    Ok(Json(visible))
}

async fn get_quiz(
    Path((batch_id, quiz_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<QuizResponse>, ApiError> {
    ensure_batch_visible(&state, &user, &batch_id).await?;
    let quiz = fetch_quiz_in_batch(&state, &batch_id, &quiz_id).await?;

    // Students never see the question bank here; their personalized view
    // comes from the attempt endpoints and carries no correct answers.
    if matches!(user.role, UserRole::Student) {
        if quiz.status == QuizStatus::Draft {
            return Err(ApiError::NotFound("Quiz not found".to_string()));
        }
        return Ok(Json(quiz_to_response(quiz, Vec::new())));
    }

    let questions = repositories::questions::list_by_quiz(state.db(), &quiz.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch questions"))?;

    Ok(Json(quiz_to_response(quiz, questions)))
}

async fn update_quiz(
    Path((batch_id, quiz_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<QuizUpdate>,
) -> Result<Json<QuizResponse>, ApiError> {
    require_batch_teacher(&state, &user, &batch_id).await?;
    let quiz = fetch_quiz_in_batch(&state, &batch_id, &quiz_id).await?;

    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    require_structure_unlocked(&state, &user, &quiz).await?;

    let effective_start =
        payload.start_time.map(to_primitive_utc).unwrap_or(quiz.start_time);
    let effective_end = payload.end_time.map(to_primitive_utc).unwrap_or(quiz.end_time);
    if effective_end <= effective_start {
        return Err(ApiError::BadRequest("end_time must be after start_time".to_string()));
    }

    let now = primitive_now_utc();
    repositories::quizzes::update(
        state.db(),
        &quiz.id,
        repositories::quizzes::UpdateQuiz {
            title: payload.title,
            description: payload.description,
            start_time: payload.start_time.map(to_primitive_utc),
            end_time: payload.end_time.map(to_primitive_utc),
            duration_minutes: payload.duration_minutes,
            randomize_questions: payload.randomize_questions,
            randomize_options: payload.randomize_options,
            show_results_immediately: payload.show_results_immediately,
            max_attempts: payload.max_attempts,
        },
        now,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update quiz"))?;

    let updated = repositories::quizzes::fetch_one_by_id(state.db(), &quiz.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch updated quiz"))?;
    let questions = repositories::questions::list_by_quiz(state.db(), &quiz.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch questions"))?;

    Ok(Json(quiz_to_response(updated, questions)))
}

async fn delete_quiz(
    Path((batch_id, quiz_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    require_batch_teacher(&state, &user, &batch_id).await?;
    let quiz = fetch_quiz_in_batch(&state, &batch_id, &quiz_id).await?;

    let attempt_count = repositories::attempts::count_by_quiz(state.db(), &quiz.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count attempts"))?;
    if attempt_count > 0 {
        return Err(ApiError::Conflict(
            "Cannot delete a quiz with existing attempts".to_string(),
        ));
    }

    repositories::quizzes::delete_by_id(state.db(), &quiz.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete quiz"))?;

    Ok(StatusCode::NO_CONTENT)
}

async fn publish_quiz(
    Path((batch_id, quiz_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<QuizResponse>, ApiError> {
    require_batch_teacher(&state, &user, &batch_id).await?;
    let quiz = fetch_quiz_in_batch(&state, &batch_id, &quiz_id).await?;

    if quiz.status != QuizStatus::Draft {
        return Err(ApiError::BadRequest("Quiz is not in draft status".to_string()));
    }

    let question_count = repositories::questions::count_by_quiz(state.db(), &quiz.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count questions"))?;
    if question_count == 0 {
        return Err(ApiError::BadRequest("Quiz must have at least one question".to_string()));
    }

    let now = primitive_now_utc();
    repositories::quizzes::set_status(state.db(), &quiz.id, QuizStatus::Published, Some(now), now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to publish quiz"))?;

    tracing::info!(
        user_id = %user.id,
        quiz_id = %quiz.id,
        action = "quiz_publish",
        "Quiz published"
    );

    respond_with_quiz(&state, &quiz.id).await
}

async fn archive_quiz(
    Path((batch_id, quiz_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<QuizResponse>, ApiError> {
    require_batch_teacher(&state, &user, &batch_id).await?;
    let quiz = fetch_quiz_in_batch(&state, &batch_id, &quiz_id).await?;

    if quiz.status != QuizStatus::Published {
        return Err(ApiError::BadRequest("Only published quizzes can be archived".to_string()));
    }

    let now = primitive_now_utc();
    repositories::quizzes::set_status(state.db(), &quiz.id, QuizStatus::Archived, None, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to archive quiz"))?;

    tracing::info!(
        user_id = %user.id,
        quiz_id = %quiz.id,
        action = "quiz_archive",
        "Quiz archived"
    );

    respond_with_quiz(&state, &quiz.id).await
}

async fn add_question(
    Path((batch_id, quiz_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<QuestionCreate>,
) -> Result<(StatusCode, Json<QuestionResponse>), ApiError> {
    require_batch_teacher(&state, &user, &batch_id).await?;
    let quiz = fetch_quiz_in_batch(&state, &batch_id, &quiz_id).await?;
    require_structure_unlocked(&state, &user, &quiz).await?;

    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    validate_question_payload(&state, &payload)?;

    let question_count = repositories::questions::count_by_quiz(state.db(), &quiz.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count questions"))?;
    if question_count as u64 >= state.settings().quiz().max_questions_per_quiz {
        return Err(ApiError::BadRequest(format!(
            "A quiz can hold at most {} questions",
            state.settings().quiz().max_questions_per_quiz
        )));
    }

    let now = primitive_now_utc();

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let question = repositories::questions::create(
        &mut *tx,
        repositories::questions::CreateQuestion {
            id: &Uuid::new_v4().to_string(),
            quiz_id: &quiz.id,
            kind: payload.kind,
            prompt: &payload.prompt,
            options: serde_json::json!(payload.effective_options()),
            correct_answers: serde_json::json!(payload.correct_answers),
            marks: payload.marks,
            position: if payload.position > 0 { payload.position } else { question_count as i32 },
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create question"))?;

    refresh_total_marks(&mut tx, &quiz.id, now).await?;
    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    Ok((StatusCode::CREATED, Json(question_to_response(question))))
}

async fn update_question(
    Path((batch_id, quiz_id, question_id)): Path<(String, String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<QuestionCreate>,
) -> Result<Json<QuestionResponse>, ApiError> {
    require_batch_teacher(&state, &user, &batch_id).await?;
    let quiz = fetch_quiz_in_batch(&state, &batch_id, &quiz_id).await?;
    require_structure_unlocked(&state, &user, &quiz).await?;

    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    validate_question_payload(&state, &payload)?;

    let existing = repositories::questions::find_by_id(state.db(), &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question"))?
        .filter(|question| question.quiz_id == quiz.id);
    let Some(existing) = existing else {
        return Err(ApiError::NotFound("Question not found".to_string()));
    };

    let now = primitive_now_utc();

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let question = repositories::questions::update(
        &mut *tx,
        &existing.id,
        repositories::questions::UpdateQuestion {
            kind: payload.kind,
            prompt: payload.prompt.clone(),
            options: serde_json::json!(payload.effective_options()),
            correct_answers: serde_json::json!(payload.correct_answers),
            marks: payload.marks,
            position: payload.position,
        },
        now,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to update question"))?;

    refresh_total_marks(&mut tx, &quiz.id, now).await?;
    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    Ok(Json(question_to_response(question)))
}

async fn delete_question(
    Path((batch_id, quiz_id, question_id)): Path<(String, String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    require_batch_teacher(&state, &user, &batch_id).await?;
    let quiz = fetch_quiz_in_batch(&state, &batch_id, &quiz_id).await?;
    require_structure_unlocked(&state, &user, &quiz).await?;

    let existing = repositories::questions::find_by_id(state.db(), &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch question"))?
        .filter(|question| question.quiz_id == quiz.id);
    if existing.is_none() {
        return Err(ApiError::NotFound("Question not found".to_string()));
    }

    let now = primitive_now_utc();

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    repositories::questions::delete(&mut *tx, &question_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to delete question"))?;
    refresh_total_marks(&mut tx, &quiz.id, now).await?;
    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    Ok(StatusCode::NO_CONTENT)
}

async fn list_attempts(
    Path((batch_id, quiz_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<AttemptOverviewResponse>>, ApiError> {
    require_batch_teacher(&state, &user, &batch_id).await?;
    let quiz = fetch_quiz_in_batch(&state, &batch_id, &quiz_id).await?;

    let rows = repositories::attempts::list_overview_by_quiz(state.db(), &quiz.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list attempts"))?;

    let overview = rows
        .into_iter()
        .map(|row| AttemptOverviewResponse {
            id: row.id,
            student_id: row.student_id,
            student_email: row.student_email,
            student_name: row.student_name,
            started_at: crate::core::time::format_primitive(row.started_at),
            submitted_at: row.submitted_at.map(crate::core::time::format_primitive),
            status: row.status,
            score: row.score,
            percentage: row.percentage,
        })
        .collect();

    Ok(Json(overview))
}

/// `total_marks` mirrors the live question set; recomputed inside the same
/// transaction as any question mutation.
async fn refresh_total_marks(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    quiz_id: &str,
    now: time::PrimitiveDateTime,
) -> Result<(), ApiError> {
    let total = repositories::questions::sum_marks(&mut **tx, quiz_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to sum question marks"))?;

    repositories::quizzes::set_total_marks(&mut **tx, quiz_id, total as i32, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to update total marks"))?;

    Ok(())
}

async fn fetch_quiz_in_batch(
    state: &AppState,
    batch_id: &str,
    quiz_id: &str,
) -> Result<Quiz, ApiError> {
    let quiz = repositories::quizzes::find_by_id(state.db(), quiz_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch quiz"))?
        .filter(|quiz| quiz.batch_id == batch_id);

    quiz.ok_or_else(|| ApiError::NotFound("Quiz not found".to_string()))
}

/// Every structural mutation funnels through this single check.
async fn require_structure_unlocked(
    state: &AppState,
    user: &User,
    quiz: &Quiz,
) -> Result<(), ApiError> {
    let attempt_count = repositories::attempts::count_by_quiz(state.db(), &quiz.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to count attempts"))?;

    if access_policy::can_edit_quiz_structure(user, quiz, true, attempt_count) {
        Ok(())
    } else {
        Err(ApiError::Conflict(
            "Quiz structure is locked once attempts exist".to_string(),
        ))
    }
}

async fn ensure_batch_visible(
    state: &AppState,
    user: &User,
    batch_id: &str,
) -> Result<(), ApiError> {
    let batch = repositories::batches::find_by_id(state.db(), batch_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch batch"))?;
    let Some(batch) = batch else {
        return Err(ApiError::NotFound("Batch not found".to_string()));
    };

    match user.role {
        UserRole::Admin => Ok(()),
        UserRole::Teacher if batch.teacher_id == user.id => Ok(()),
        _ => {
            let enrolled =
                repositories::enrollments::is_active_member(state.db(), &batch.id, &user.id)
                    .await
                    .map_err(|e| ApiError::internal(e, "Failed to fetch enrollment"))?;
            if enrolled {
                Ok(())
            } else {
                Err(ApiError::forbidden("Enrollment required for this batch"))
            }
        }
    }
}

fn validate_question_payload(
    state: &AppState,
    question: &QuestionCreate,
) -> Result<(), ApiError> {
    question.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    question.validate_shape().map_err(ApiError::BadRequest)?;

    let max_options = state.settings().quiz().max_options_per_question;
    if question.effective_options().len() as u64 > max_options {
        return Err(ApiError::BadRequest(format!(
            "A question can hold at most {max_options} options"
        )));
    }

    Ok(())
}

async fn respond_with_quiz(state: &AppState, quiz_id: &str) -> Result<Json<QuizResponse>, ApiError> {
    let quiz = repositories::quizzes::fetch_one_by_id(state.db(), quiz_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch updated quiz"))?;
    let questions = repositories::questions::list_by_quiz(state.db(), quiz_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch questions"))?;

    Ok(Json(quiz_to_response(quiz, questions)))
}
