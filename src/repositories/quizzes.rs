use sqlx::{PgPool, Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::Quiz;
use crate::db::types::QuizStatus;

pub(crate) const COLUMNS: &str = "\
    id, batch_id, title, description, start_time, end_time, duration_minutes, \
    total_marks, randomize_questions, randomize_options, show_results_immediately, \
    max_attempts, status, created_by, created_at, updated_at, published_at";

pub(crate) struct CreateQuiz<'a> {
    pub(crate) id: &'a str,
    pub(crate) batch_id: &'a str,
    pub(crate) title: &'a str,
    pub(crate) description: Option<&'a str>,
    pub(crate) start_time: PrimitiveDateTime,
    pub(crate) end_time: PrimitiveDateTime,
    pub(crate) duration_minutes: i32,
    pub(crate) randomize_questions: bool,
    pub(crate) randomize_options: bool,
    pub(crate) show_results_immediately: bool,
    pub(crate) max_attempts: i32,
    pub(crate) created_by: &'a str,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Default)]
pub(crate) struct UpdateQuiz {
    pub(crate) title: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) start_time: Option<PrimitiveDateTime>,
    pub(crate) end_time: Option<PrimitiveDateTime>,
    pub(crate) duration_minutes: Option<i32>,
    pub(crate) randomize_questions: Option<bool>,
    pub(crate) randomize_options: Option<bool>,
    pub(crate) show_results_immediately: Option<bool>,
    pub(crate) max_attempts: Option<i32>,
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Quiz>, sqlx::Error> {
    sqlx::query_as::<_, Quiz>(&format!("SELECT {COLUMNS} FROM quizzes WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn fetch_one_by_id(pool: &PgPool, id: &str) -> Result<Quiz, sqlx::Error> {
    sqlx::query_as::<_, Quiz>(&format!("SELECT {COLUMNS} FROM quizzes WHERE id = $1"))
        .bind(id)
        .fetch_one(pool)
        .await
}

pub(crate) async fn create(
    executor: impl sqlx::PgExecutor<'_>,
    quiz: CreateQuiz<'_>,
) -> Result<Quiz, sqlx::Error> {
    sqlx::query_as::<_, Quiz>(&format!(
        "INSERT INTO quizzes (
            id, batch_id, title, description, start_time, end_time, duration_minutes,
            randomize_questions, randomize_options, show_results_immediately,
            max_attempts, status, created_by, created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)
        RETURNING {COLUMNS}"
    ))
    .bind(quiz.id)
    .bind(quiz.batch_id)
    .bind(quiz.title)
    .bind(quiz.description)
    .bind(quiz.start_time)
    .bind(quiz.end_time)
    .bind(quiz.duration_minutes)
    .bind(quiz.randomize_questions)
    .bind(quiz.randomize_options)
    .bind(quiz.show_results_immediately)
    .bind(quiz.max_attempts)
    .bind(QuizStatus::Draft)
    .bind(quiz.created_by)
    .bind(quiz.created_at)
    .bind(quiz.updated_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn list_by_batch(
    pool: &PgPool,
    batch_id: &str,
) -> Result<Vec<Quiz>, sqlx::Error> {
    sqlx::query_as::<_, Quiz>(&format!(
        "SELECT {COLUMNS} FROM quizzes WHERE batch_id = $1 ORDER BY start_time"
    ))
    .bind(batch_id)
    .fetch_all(pool)
    .await
}

pub(crate) async fn update(
    pool: &PgPool,
    id: &str,
    update: UpdateQuiz,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new("UPDATE quizzes SET updated_at = ");
    builder.push_bind(now);

    if let Some(title) = update.title {
        builder.push(", title = ");
        builder.push_bind(title);
    }
    if let Some(description) = update.description {
        builder.push(", description = ");
        builder.push_bind(description);
    }
    if let Some(start_time) = update.start_time {
        builder.push(", start_time = ");
        builder.push_bind(start_time);
    }
    if let Some(end_time) = update.end_time {
        builder.push(", end_time = ");
        builder.push_bind(end_time);
    }
    if let Some(duration_minutes) = update.duration_minutes {
        builder.push(", duration_minutes = ");
        builder.push_bind(duration_minutes);
    }
    if let Some(randomize_questions) = update.randomize_questions {
        builder.push(", randomize_questions = ");
        builder.push_bind(randomize_questions);
    }
    if let Some(randomize_options) = update.randomize_options {
        builder.push(", randomize_options = ");
        builder.push_bind(randomize_options);
    }
    if let Some(show_results_immediately) = update.show_results_immediately {
        builder.push(", show_results_immediately = ");
        builder.push_bind(show_results_immediately);
    }
    if let Some(max_attempts) = update.max_attempts {
        builder.push(", max_attempts = ");
        builder.push_bind(max_attempts);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    builder.build().execute(pool).await?;
    Ok(())
}

pub(crate) async fn set_status(
    pool: &PgPool,
    id: &str,
    status: QuizStatus,
    published_at: Option<PrimitiveDateTime>,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE quizzes SET status = $1, \
         published_at = COALESCE($2, published_at), updated_at = $3 WHERE id = $4",
    )
    .bind(status)
    .bind(published_at)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub(crate) async fn set_total_marks(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    total_marks: i32,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE quizzes SET total_marks = $1, updated_at = $2 WHERE id = $3")
        .bind(total_marks)
        .bind(now)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn delete_by_id(pool: &PgPool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM quizzes WHERE id = $1").bind(id).execute(pool).await?;
    Ok(())
}
