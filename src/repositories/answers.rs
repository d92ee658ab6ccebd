use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Answer;

pub(crate) const COLUMNS: &str = "\
    id, attempt_id, question_id, response, is_correct, marks_awarded, \
    answered_at, updated_at";

pub(crate) struct UpsertAnswer<'a> {
    pub(crate) id: &'a str,
    pub(crate) attempt_id: &'a str,
    pub(crate) question_id: &'a str,
    pub(crate) response: serde_json::Value,
    pub(crate) answered_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// Overwrites any previous response for the question and clears grading
/// fields, which are only populated at submission.
pub(crate) async fn upsert(
    pool: &PgPool,
    answer: UpsertAnswer<'_>,
) -> Result<Answer, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!(
        "INSERT INTO answers (
            id, attempt_id, question_id, response, answered_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6)
        ON CONFLICT (attempt_id, question_id)
        DO UPDATE SET response = EXCLUDED.response,
            is_correct = NULL,
            marks_awarded = NULL,
            answered_at = EXCLUDED.answered_at,
            updated_at = EXCLUDED.updated_at
        RETURNING {COLUMNS}"
    ))
    .bind(answer.id)
    .bind(answer.attempt_id)
    .bind(answer.question_id)
    .bind(answer.response)
    .bind(answer.answered_at)
    .bind(answer.updated_at)
    .fetch_one(pool)
    .await
}

pub(crate) async fn list_by_attempt(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
) -> Result<Vec<Answer>, sqlx::Error> {
    sqlx::query_as::<_, Answer>(&format!(
        "SELECT {COLUMNS} FROM answers WHERE attempt_id = $1 ORDER BY answered_at"
    ))
    .bind(attempt_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn record_grade(
    executor: impl sqlx::PgExecutor<'_>,
    attempt_id: &str,
    question_id: &str,
    is_correct: bool,
    marks_awarded: i32,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE answers SET is_correct = $1, marks_awarded = $2, updated_at = $3 \
         WHERE attempt_id = $4 AND question_id = $5",
    )
    .bind(is_correct)
    .bind(marks_awarded)
    .bind(now)
    .bind(attempt_id)
    .bind(question_id)
    .execute(executor)
    .await?;
    Ok(())
}
