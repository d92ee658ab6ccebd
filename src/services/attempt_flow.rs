use std::collections::HashMap;

use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::core::time::primitive_now_utc;
use crate::db::models::{Answer, Attempt, Question, Quiz, User};
use crate::db::types::QuestionKind;
use crate::repositories;
use crate::services::access_policy::{self, AttemptEligibility};
use crate::services::scoring::{self, GradedAttempt};
use crate::services::{quiz_timing, shuffle};

#[derive(Debug, Error)]
pub(crate) enum AttemptError {
    #[error("{0}")]
    NotEligible(String),
    #[error("Attempt has already been submitted")]
    AlreadySubmitted,
    #[error("{0}")]
    InvalidArgument(String),
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

#[derive(Debug)]
pub(crate) struct StartedAttempt {
    pub(crate) attempt: Attempt,
    pub(crate) resumed: bool,
}

/// Starts (or resumes) the student's attempt. The personalized question and
/// option ordering is computed once here and frozen on the attempt row, so
/// retries and resumes always see the same sequence. A concurrent duplicate
/// start loses the insert on the (quiz, student) uniqueness constraint and
/// falls back to loading the winner's row instead of surfacing a conflict.
pub(crate) async fn start_attempt(
    pool: &PgPool,
    student: &User,
    quiz: &Quiz,
) -> Result<StartedAttempt, AttemptError> {
    let now = primitive_now_utc();

    let enrolled =
        repositories::enrollments::is_active_member(pool, &quiz.batch_id, &student.id).await?;
    let existing =
        repositories::attempts::find_for_quiz_and_student(pool, &quiz.id, &student.id).await?;

    let (submitted_attempts, has_open_attempt) = match &existing {
        Some(attempt) if attempt.submitted_at.is_some() => (1, false),
        Some(_) => (0, true),
        None => (0, false),
    };
    let eligibility = AttemptEligibility { enrolled, submitted_attempts, has_open_attempt };

    access_policy::check_attempt(student, quiz, &eligibility, now)
        .map_err(|denial| AttemptError::NotEligible(denial.to_string()))?;

    match existing {
        Some(attempt) if attempt.submitted_at.is_none() => {
            return Ok(StartedAttempt { attempt, resumed: true });
        }
        // The (quiz, student) slot is single-use: a submitted attempt
        // occupies it for good, whatever the configured cap.
        Some(_) => return Err(AttemptError::NotEligible("Maximum attempts reached".to_string())),
        None => {}
    }

    let questions = repositories::questions::list_by_quiz(pool, &quiz.id).await?;
    if questions.is_empty() {
        return Err(AttemptError::NotEligible("Quiz has no questions".to_string()));
    }

    let question_ids: Vec<String> = questions.iter().map(|question| question.id.clone()).collect();
    let question_order = if quiz.randomize_questions {
        shuffle::shuffled(&question_ids, shuffle::question_seed(&quiz.id, &student.id))
    } else {
        question_ids
    };

    let mut option_orders: HashMap<String, Vec<String>> = HashMap::new();
    for question in &questions {
        if question.options.0.is_empty() {
            continue;
        }
        let ordered = if quiz.randomize_options {
            shuffle::shuffled(&question.options.0, shuffle::option_seed(&question.id, &student.id))
        } else {
            question.options.0.clone()
        };
        option_orders.insert(question.id.clone(), ordered);
    }

    let attempt_id = Uuid::new_v4().to_string();
    let expires_at = quiz_timing::attempt_expiration(now, quiz.end_time, quiz.duration_minutes);

    let inserted = repositories::attempts::create(
        pool,
        repositories::attempts::CreateAttempt {
            id: &attempt_id,
            quiz_id: &quiz.id,
            student_id: &student.id,
            question_order: serde_json::json!(question_order),
            option_orders: serde_json::json!(option_orders),
            started_at: now,
            expires_at,
            created_at: now,
            updated_at: now,
        },
    )
    .await?;

    if !inserted {
        // Lost the race; reuse whichever attempt won the unique constraint.
        let attempt =
            repositories::attempts::fetch_for_quiz_and_student(pool, &quiz.id, &student.id)
                .await?;
        if attempt.submitted_at.is_some() {
            return Err(AttemptError::NotEligible("Maximum attempts reached".to_string()));
        }
        return Ok(StartedAttempt { attempt, resumed: true });
    }

    metrics::counter!("quiz_attempts_started_total").increment(1);
    tracing::info!(
        student_id = %student.id,
        quiz_id = %quiz.id,
        attempt_id = %attempt_id,
        action = "attempt_start",
        "Attempt started"
    );

    let attempt = repositories::attempts::fetch_one_by_id(pool, &attempt_id).await?;
    Ok(StartedAttempt { attempt, resumed: false })
}

/// Upserts the raw response for one question. Correctness is not evaluated
/// until submission; rewriting the same question overwrites the prior value.
pub(crate) async fn record_answer(
    pool: &PgPool,
    attempt: &Attempt,
    quiz: &Quiz,
    question_id: &str,
    values: Vec<String>,
) -> Result<Answer, AttemptError> {
    if attempt.submitted_at.is_some() {
        return Err(AttemptError::AlreadySubmitted);
    }

    let now = primitive_now_utc();
    let deadline = quiz_timing::hard_deadline(attempt.expires_at, quiz.end_time);
    if now >= deadline {
        return Err(AttemptError::NotEligible("The quiz window has closed".to_string()));
    }

    let question = repositories::questions::find_by_id(pool, question_id)
        .await?
        .filter(|question| question.quiz_id == quiz.id)
        .ok_or_else(|| {
            AttemptError::InvalidArgument("Question does not belong to this quiz".to_string())
        })?;

    validate_response(&question, &values)?;

    let answer = repositories::answers::upsert(
        pool,
        repositories::answers::UpsertAnswer {
            id: &Uuid::new_v4().to_string(),
            attempt_id: &attempt.id,
            question_id: &question.id,
            response: serde_json::json!(values),
            answered_at: now,
            updated_at: now,
        },
    )
    .await?;

    Ok(answer)
}

/// Finalizes the attempt: grades every question, persists per-answer
/// correctness and the aggregate score, and stamps `submitted_at` exactly
/// once. The conditional update makes a concurrent double submit lose
/// cleanly instead of overwriting the first result.
pub(crate) async fn submit_attempt(
    pool: &PgPool,
    attempt: &Attempt,
    quiz: &Quiz,
) -> Result<(Attempt, GradedAttempt), AttemptError> {
    if attempt.submitted_at.is_some() {
        return Err(AttemptError::AlreadySubmitted);
    }

    let questions = repositories::questions::list_by_quiz(pool, &quiz.id).await?;
    let answers = repositories::answers::list_by_attempt(pool, &attempt.id).await?;
    let responses: HashMap<String, Vec<String>> = answers
        .iter()
        .map(|answer| (answer.question_id.clone(), answer.response.0.clone()))
        .collect();

    let graded = scoring::grade_attempt(&questions, &responses);
    let now = primitive_now_utc();

    let mut tx = pool.begin().await?;

    let finalized = repositories::attempts::finalize(
        &mut *tx,
        &attempt.id,
        graded.score,
        graded.percentage,
        now,
    )
    .await?;
    let Some(finalized) = finalized else {
        // Someone else submitted between our read and the update.
        return Err(AttemptError::AlreadySubmitted);
    };

    for result in &graded.questions {
        repositories::answers::record_grade(
            &mut *tx,
            &attempt.id,
            &result.question_id,
            result.is_correct,
            result.marks_awarded,
            now,
        )
        .await?;
    }

    tx.commit().await?;

    metrics::counter!("quiz_attempts_submitted_total").increment(1);
    tracing::info!(
        student_id = %attempt.student_id,
        quiz_id = %quiz.id,
        attempt_id = %attempt.id,
        score = graded.score,
        action = "attempt_submit",
        "Attempt submitted"
    );

    Ok((finalized, graded))
}

fn validate_response(question: &Question, values: &[String]) -> Result<(), AttemptError> {
    if values.is_empty() || values.iter().any(|value| value.trim().is_empty()) {
        return Err(AttemptError::InvalidArgument("Answer must not be empty".to_string()));
    }

    match question.kind {
        QuestionKind::SingleChoice => {
            if values.len() != 1 {
                return Err(AttemptError::InvalidArgument(
                    "Exactly one option must be selected".to_string(),
                ));
            }
            if !question.options.0.contains(&values[0]) {
                return Err(AttemptError::InvalidArgument("Unknown option".to_string()));
            }
        }
        QuestionKind::TrueFalse => {
            if values.len() != 1 {
                return Err(AttemptError::InvalidArgument(
                    "Exactly one option must be selected".to_string(),
                ));
            }
            let submitted = scoring::normalize_answer(&values[0]);
            let known = question
                .options
                .0
                .iter()
                .any(|option| scoring::normalize_answer(option) == submitted);
            if !known {
                return Err(AttemptError::InvalidArgument("Unknown option".to_string()));
            }
        }
        QuestionKind::MultipleChoice => {
            for value in values {
                if !question.options.0.contains(value) {
                    return Err(AttemptError::InvalidArgument("Unknown option".to_string()));
                }
            }
        }
        QuestionKind::ShortAnswer => {
            if values.len() != 1 {
                return Err(AttemptError::InvalidArgument(
                    "Short answers take a single value".to_string(),
                ));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;
    use time::macros::datetime;

    fn question(kind: QuestionKind, options: &[&str]) -> Question {
        let stamp = datetime!(2026-01-10 09:00);
        Question {
            id: "q1".to_string(),
            quiz_id: "quiz-1".to_string(),
            kind,
            prompt: "prompt".to_string(),
            options: Json(options.iter().map(|value| value.to_string()).collect()),
            correct_answers: Json(vec!["A".to_string()]),
            marks: 5,
            position: 0,
            created_at: stamp,
            updated_at: stamp,
        }
    }

    fn values(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn empty_responses_are_rejected() {
        let question = question(QuestionKind::ShortAnswer, &[]);
        assert!(matches!(
            validate_response(&question, &[]),
            Err(AttemptError::InvalidArgument(_))
        ));
        assert!(matches!(
            validate_response(&question, &values(&["  "])),
            Err(AttemptError::InvalidArgument(_))
        ));
    }

    #[test]
    fn single_choice_takes_exactly_one_known_option() {
        let question = question(QuestionKind::SingleChoice, &["A", "B"]);
        assert!(validate_response(&question, &values(&["A"])).is_ok());
        assert!(validate_response(&question, &values(&["A", "B"])).is_err());
        assert!(validate_response(&question, &values(&["C"])).is_err());
    }

    #[test]
    fn true_false_matches_options_case_insensitively() {
        let question = question(QuestionKind::TrueFalse, &["True", "False"]);
        assert!(validate_response(&question, &values(&["true"])).is_ok());
        assert!(validate_response(&question, &values(&[" FALSE "])).is_ok());
        assert!(validate_response(&question, &values(&["maybe"])).is_err());
    }

    #[test]
    fn multi_select_requires_known_options() {
        let question = question(QuestionKind::MultipleChoice, &["A", "B", "C"]);
        assert!(validate_response(&question, &values(&["A", "C"])).is_ok());
        assert!(validate_response(&question, &values(&["A", "D"])).is_err());
    }

    #[test]
    fn short_answer_takes_one_value() {
        let question = question(QuestionKind::ShortAnswer, &[]);
        assert!(validate_response(&question, &values(&["Paris"])).is_ok());
        assert!(validate_response(&question, &values(&["Paris", "Rome"])).is_err());
    }
}
