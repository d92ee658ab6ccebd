use sqlx::{FromRow, PgPool};
use time::PrimitiveDateTime;

use crate::db::models::Attempt;
use crate::db::types::AttemptStatus;

pub(crate) const COLUMNS: &str = "\
    id, quiz_id, student_id, question_order, option_orders, started_at, \
    submitted_at, expires_at, status, score, percentage, created_at, updated_at";

pub(crate) struct CreateAttempt<'a> {
    pub(crate) id: &'a str,
    pub(crate) quiz_id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) question_order: serde_json::Value,
    pub(crate) option_orders: serde_json::Value,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) expires_at: PrimitiveDateTime,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, FromRow)]
pub(crate) struct AttemptOverviewRow {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) student_email: String,
    pub(crate) student_name: String,
    pub(crate) started_at: PrimitiveDateTime,
    pub(crate) submitted_at: Option<PrimitiveDateTime>,
    pub(crate) status: AttemptStatus,
    pub(crate) score: Option<i32>,
    pub(crate) percentage: Option<f64>,
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!("SELECT {COLUMNS} FROM attempts WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn fetch_one_by_id(pool: &PgPool, id: &str) -> Result<Attempt, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!("SELECT {COLUMNS} FROM attempts WHERE id = $1"))
        .bind(id)
        .fetch_one(pool)
        .await
}

pub(crate) async fn find_for_quiz_and_student(
    pool: &PgPool,
    quiz_id: &str,
    student_id: &str,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM attempts WHERE quiz_id = $1 AND student_id = $2"
    ))
    .bind(quiz_id)
    .bind(student_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn fetch_for_quiz_and_student(
    pool: &PgPool,
    quiz_id: &str,
    student_id: &str,
) -> Result<Attempt, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "SELECT {COLUMNS} FROM attempts WHERE quiz_id = $1 AND student_id = $2"
    ))
    .bind(quiz_id)
    .bind(student_id)
    .fetch_one(pool)
    .await
}

/// Returns false when the (quiz, student) uniqueness constraint already holds
/// an attempt; the caller resolves the race by loading that row.
pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    attempt: CreateAttempt<'_>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO attempts (
            id, quiz_id, student_id, question_order, option_orders,
            started_at, expires_at, status, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
        ON CONFLICT DO NOTHING",
    )
    .bind(attempt.id)
    .bind(attempt.quiz_id)
    .bind(attempt.student_id)
    .bind(attempt.question_order)
    .bind(attempt.option_orders)
    .bind(attempt.started_at)
    .bind(attempt.expires_at)
    .bind(AttemptStatus::InProgress)
    .bind(attempt.created_at)
    .bind(attempt.updated_at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Stamps the terminal state once; a second submit matches zero rows.
pub(crate) async fn finalize(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    score: i32,
    percentage: f64,
    now: PrimitiveDateTime,
) -> Result<Option<Attempt>, sqlx::Error> {
    sqlx::query_as::<_, Attempt>(&format!(
        "UPDATE attempts SET status = $1, submitted_at = $2, score = $3,
            percentage = $4, updated_at = $2
         WHERE id = $5 AND submitted_at IS NULL
         RETURNING {COLUMNS}"
    ))
    .bind(AttemptStatus::Submitted)
    .bind(now)
    .bind(score)
    .bind(percentage)
    .bind(id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn count_by_quiz(
    executor: impl sqlx::PgExecutor<'_>,
    quiz_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM attempts WHERE quiz_id = $1")
        .bind(quiz_id)
        .fetch_one(executor)
        .await
}

pub(crate) async fn list_overview_by_quiz(
    pool: &PgPool,
    quiz_id: &str,
) -> Result<Vec<AttemptOverviewRow>, sqlx::Error> {
    sqlx::query_as::<_, AttemptOverviewRow>(
        "SELECT a.id, \
                a.student_id, \
                u.email AS student_email, \
                u.full_name AS student_name, \
                a.started_at, \
                a.submitted_at, \
                a.status, \
                a.score, \
                a.percentage \
         FROM attempts a \
         JOIN users u ON u.id = a.student_id \
         WHERE a.quiz_id = $1 \
         ORDER BY a.started_at",
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await
}
