use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Batch;
use crate::db::types::EnrollmentStatus;

pub(crate) const COLUMNS: &str =
    "id, name, description, teacher_id, is_active, created_at, updated_at";

pub(crate) struct CreateBatch<'a> {
    pub(crate) id: &'a str,
    pub(crate) name: &'a str,
    pub(crate) description: Option<&'a str>,
    pub(crate) teacher_id: &'a str,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Batch>, sqlx::Error> {
    sqlx::query_as::<_, Batch>(&format!("SELECT {COLUMNS} FROM batches WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn create(
    pool: &PgPool,
    batch: CreateBatch<'_>,
) -> Result<Batch, sqlx::Error> {
    sqlx::query_as::<_, Batch>(&format!(
        "INSERT INTO batches (id, name, description, teacher_id, is_active, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING {COLUMNS}"
    ))
    .bind(batch.id)
    .bind(batch.name)
    .bind(batch.description)
    .bind(batch.teacher_id)
    .bind(batch.is_active)
    .bind(batch.created_at)
    .bind(batch.updated_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn list_all(pool: &PgPool) -> Result<Vec<Batch>, sqlx::Error> {
    sqlx::query_as::<_, Batch>(&format!(
        "SELECT {COLUMNS} FROM batches ORDER BY created_at DESC"
    ))
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_by_teacher(
    pool: &PgPool,
    teacher_id: &str,
) -> Result<Vec<Batch>, sqlx::Error> {
    sqlx::query_as::<_, Batch>(&format!(
        "SELECT {COLUMNS} FROM batches WHERE teacher_id = $1 ORDER BY created_at DESC"
    ))
    .bind(teacher_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_by_student(
    pool: &PgPool,
    student_id: &str,
) -> Result<Vec<Batch>, sqlx::Error> {
    sqlx::query_as::<_, Batch>(
        "SELECT b.id, b.name, b.description, b.teacher_id, b.is_active, b.created_at, b.updated_at \
         FROM batches b \
         JOIN enrollments e ON e.batch_id = b.id \
         WHERE e.student_id = $1 AND e.status = $2 \
         ORDER BY b.created_at DESC",
    )
    .bind(student_id)
    .bind(EnrollmentStatus::Active)
    .fetch_all(pool)
    .await
}
