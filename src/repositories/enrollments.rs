use sqlx::{FromRow, PgPool};
use time::PrimitiveDateTime;

use crate::db::models::Enrollment;
use crate::db::types::EnrollmentStatus;

pub(crate) const COLUMNS: &str = "id, batch_id, student_id, status, joined_at, updated_at";

#[derive(Debug, FromRow)]
pub(crate) struct RosterRow {
    pub(crate) student_id: String,
    pub(crate) student_email: String,
    pub(crate) student_name: String,
    pub(crate) status: EnrollmentStatus,
    pub(crate) joined_at: PrimitiveDateTime,
}

pub(crate) struct EnsureEnrollment<'a> {
    pub(crate) id: &'a str,
    pub(crate) batch_id: &'a str,
    pub(crate) student_id: &'a str,
    pub(crate) joined_at: PrimitiveDateTime,
}

/// Re-enrolling a previously removed student reactivates the original row.
pub(crate) async fn ensure_active(
    pool: &PgPool,
    enrollment: EnsureEnrollment<'_>,
) -> Result<Enrollment, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(&format!(
        "INSERT INTO enrollments (id, batch_id, student_id, status, joined_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $5)
         ON CONFLICT (batch_id, student_id)
         DO UPDATE SET status = EXCLUDED.status, updated_at = EXCLUDED.updated_at
         RETURNING {COLUMNS}"
    ))
    .bind(enrollment.id)
    .bind(enrollment.batch_id)
    .bind(enrollment.student_id)
    .bind(EnrollmentStatus::Active)
    .bind(enrollment.joined_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn mark_removed(
    pool: &PgPool,
    batch_id: &str,
    student_id: &str,
    now: PrimitiveDateTime,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE enrollments SET status = $1, updated_at = $2 \
         WHERE batch_id = $3 AND student_id = $4 AND status = $5",
    )
    .bind(EnrollmentStatus::Removed)
    .bind(now)
    .bind(batch_id)
    .bind(student_id)
    .bind(EnrollmentStatus::Active)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn is_active_member(
    pool: &PgPool,
    batch_id: &str,
    student_id: &str,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT EXISTS( \
             SELECT 1 FROM enrollments \
             WHERE batch_id = $1 AND student_id = $2 AND status = $3)",
    )
    .bind(batch_id)
    .bind(student_id)
    .bind(EnrollmentStatus::Active)
    .fetch_one(pool)
    .await
}

pub(crate) async fn roster_by_batch(
    pool: &PgPool,
    batch_id: &str,
) -> Result<Vec<RosterRow>, sqlx::Error> {
    sqlx::query_as::<_, RosterRow>(
        "SELECT e.student_id, \
                u.email AS student_email, \
                u.full_name AS student_name, \
                e.status, \
                e.joined_at \
         FROM enrollments e \
         JOIN users u ON u.id = e.student_id \
         WHERE e.batch_id = $1 \
         ORDER BY e.joined_at",
    )
    .bind(batch_id)
    .fetch_all(pool)
    .await
}
