use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, post};
use axum::{Json, Router};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::{require_batch_teacher, CurrentUser};
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::UserRole;
use crate::repositories;
use crate::schemas::batch::{BatchCreate, BatchResponse, EnrollmentCreate, RosterEntryResponse};

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_batch).get(list_batches))
        .route("/:batch_id/enrollments", post(enroll_student).get(list_roster))
        .route("/:batch_id/enrollments/:student_id", delete(remove_student))
}

async fn create_batch(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<BatchCreate>,
) -> Result<(StatusCode, Json<BatchResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let teacher_id = match user.role {
        UserRole::Teacher => {
            if payload.teacher_id.as_deref().is_some_and(|id| id != user.id) {
                return Err(ApiError::forbidden("Teachers own the batches they create"));
            }
            user.id.clone()
        }
        UserRole::Admin => payload.teacher_id.clone().unwrap_or_else(|| user.id.clone()),
        UserRole::Student => {
            return Err(ApiError::forbidden("Not enough permissions to create batches"))
        }
    };

    if teacher_id != user.id {
        let teacher = repositories::users::find_by_id(state.db(), &teacher_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to fetch teacher"))?;
        match teacher {
            Some(teacher) if matches!(teacher.role, UserRole::Teacher) => {}
            Some(_) => {
                return Err(ApiError::BadRequest("teacher_id must reference a teacher".to_string()))
            }
            None => return Err(ApiError::NotFound("Teacher not found".to_string())),
        }
    }

    let now = primitive_now_utc();
    let batch = repositories::batches::create(
        state.db(),
        repositories::batches::CreateBatch {
            id: &Uuid::new_v4().to_string(),
            name: &payload.name,
            description: payload.description.as_deref(),
            teacher_id: &teacher_id,
            is_active: true,
            created_at: now,
            updated_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to create batch"))?;

    tracing::info!(
        user_id = %user.id,
        batch_id = %batch.id,
        action = "batch_create",
        "Batch created"
    );

    Ok((StatusCode::CREATED, Json(batch.into())))
}

async fn list_batches(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<BatchResponse>>, ApiError> {
    let batches = match user.role {
        UserRole::Admin => repositories::batches::list_all(state.db()).await,
        UserRole::Teacher => repositories::batches::list_by_teacher(state.db(), &user.id).await,
        UserRole::Student => repositories::batches::list_by_student(state.db(), &user.id).await,
    }
    .map_err(|e| ApiError::internal(e, "Failed to list batches"))?;

    Ok(Json(batches.into_iter().map(Into::into).collect()))
}

async fn enroll_student(
    Path(batch_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(payload): Json<EnrollmentCreate>,
) -> Result<(StatusCode, Json<RosterEntryResponse>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let batch = require_batch_teacher(&state, &user, &batch_id).await?;

    let student = repositories::users::find_by_id(state.db(), &payload.student_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch student"))?;
    let student = match student {
        Some(student) if matches!(student.role, UserRole::Student) => student,
        Some(_) => {
            return Err(ApiError::BadRequest("Only students can be enrolled".to_string()))
        }
        None => return Err(ApiError::NotFound("Student not found".to_string())),
    };

    let now = primitive_now_utc();
    let enrollment = repositories::enrollments::ensure_active(
        state.db(),
        repositories::enrollments::EnsureEnrollment {
            id: &Uuid::new_v4().to_string(),
            batch_id: &batch.id,
            student_id: &student.id,
            joined_at: now,
        },
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to enroll student"))?;

    tracing::info!(
        user_id = %user.id,
        batch_id = %batch.id,
        student_id = %student.id,
        action = "enrollment_create",
        "Student enrolled"
    );

    Ok((
        StatusCode::CREATED,
        Json(RosterEntryResponse {
            student_id: student.id,
            student_email: student.email,
            student_name: student.full_name,
            status: enrollment.status,
            joined_at: crate::core::time::format_primitive(enrollment.joined_at),
        }),
    ))
}

async fn list_roster(
    Path(batch_id): Path<String>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<RosterEntryResponse>>, ApiError> {
    let batch = require_batch_teacher(&state, &user, &batch_id).await?;

    let roster = repositories::enrollments::roster_by_batch(state.db(), &batch.id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch roster"))?;

    Ok(Json(roster.into_iter().map(Into::into).collect()))
}

async fn remove_student(
    Path((batch_id, student_id)): Path<(String, String)>,
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let batch = require_batch_teacher(&state, &user, &batch_id).await?;

    let removed = repositories::enrollments::mark_removed(
        state.db(),
        &batch.id,
        &student_id,
        primitive_now_utc(),
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to remove enrollment"))?;

    if !removed {
        return Err(ApiError::NotFound("Enrollment not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
