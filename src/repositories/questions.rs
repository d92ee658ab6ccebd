use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Question;
use crate::db::types::QuestionKind;

pub(crate) const COLUMNS: &str = "\
    id, quiz_id, kind, prompt, options, correct_answers, marks, position, \
    created_at, updated_at";

pub(crate) struct CreateQuestion<'a> {
    pub(crate) id: &'a str,
    pub(crate) quiz_id: &'a str,
    pub(crate) kind: QuestionKind,
    pub(crate) prompt: &'a str,
    pub(crate) options: serde_json::Value,
    pub(crate) correct_answers: serde_json::Value,
    pub(crate) marks: i32,
    pub(crate) position: i32,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

pub(crate) struct UpdateQuestion {
    pub(crate) kind: QuestionKind,
    pub(crate) prompt: String,
    pub(crate) options: serde_json::Value,
    pub(crate) correct_answers: serde_json::Value,
    pub(crate) marks: i32,
    pub(crate) position: i32,
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!("SELECT {COLUMNS} FROM questions WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list_by_quiz(
    executor: impl sqlx::PgExecutor<'_>,
    quiz_id: &str,
) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {COLUMNS} FROM questions WHERE quiz_id = $1 ORDER BY position, created_at"
    ))
    .bind(quiz_id)
    .fetch_all(executor)
    .await
}

pub(crate) async fn count_by_quiz(
    executor: impl sqlx::PgExecutor<'_>,
    quiz_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE quiz_id = $1")
        .bind(quiz_id)
        .fetch_one(executor)
        .await
}

pub(crate) async fn sum_marks(
    executor: impl sqlx::PgExecutor<'_>,
    quiz_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COALESCE(SUM(marks), 0) FROM questions WHERE quiz_id = $1")
        .bind(quiz_id)
        .fetch_one(executor)
        .await
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    question: CreateQuestion<'_>,
) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "INSERT INTO questions (
            id, quiz_id, kind, prompt, options, correct_answers, marks, position,
            created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
        RETURNING {COLUMNS}"
    ))
    .bind(question.id)
    .bind(question.quiz_id)
    .bind(question.kind)
    .bind(question.prompt)
    .bind(question.options)
    .bind(question.correct_answers)
    .bind(question.marks)
    .bind(question.position)
    .bind(question.created_at)
    .bind(question.updated_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn update(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    update: UpdateQuestion,
    now: PrimitiveDateTime,
) -> Result<Question, sqlx::Error> {
    sqlx::query_as::<_, Question>(&format!(
        "UPDATE questions SET kind = $1, prompt = $2, options = $3, correct_answers = $4,
            marks = $5, position = $6, updated_at = $7
         WHERE id = $8
         RETURNING {COLUMNS}"
    ))
    .bind(update.kind)
    .bind(update.prompt)
    .bind(update.options)
    .bind(update.correct_answers)
    .bind(update.marks)
    .bind(update.position)
    .bind(now)
    .bind(id)
    .fetch_one(executor)
    .await
}

pub(crate) async fn delete(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1").bind(id).execute(executor).await?;
    Ok(result.rows_affected() > 0)
}
