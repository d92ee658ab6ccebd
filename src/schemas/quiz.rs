use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, OffsetDateTime,
    PrimitiveDateTime,
};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{Question, Quiz};
use crate::db::types::{QuestionKind, QuizStatus};
use crate::services::scoring::normalize_answer;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuestionCreate {
    pub(crate) kind: QuestionKind,
    #[validate(length(min = 1, message = "prompt must not be empty"))]
    pub(crate) prompt: String,
    #[serde(default)]
    pub(crate) options: Vec<String>,
    #[serde(alias = "correctAnswers")]
    pub(crate) correct_answers: Vec<String>,
    #[validate(range(min = 1, message = "marks must be positive"))]
    pub(crate) marks: i32,
    #[serde(default)]
    #[validate(range(min = 0, message = "position must be non-negative"))]
    pub(crate) position: i32,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuizCreate {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(alias = "startTime", deserialize_with = "deserialize_offset_datetime_flexible")]
    pub(crate) start_time: OffsetDateTime,
    #[serde(alias = "endTime", deserialize_with = "deserialize_offset_datetime_flexible")]
    pub(crate) end_time: OffsetDateTime,
    #[serde(alias = "durationMinutes")]
    #[validate(range(min = 1, message = "duration_minutes must be positive"))]
    pub(crate) duration_minutes: i32,
    #[serde(default)]
    #[serde(alias = "randomizeQuestions")]
    pub(crate) randomize_questions: bool,
    #[serde(default)]
    #[serde(alias = "randomizeOptions")]
    pub(crate) randomize_options: bool,
    #[serde(default = "default_enabled_true", alias = "showResultsImmediately")]
    pub(crate) show_results_immediately: bool,
    #[serde(default = "default_max_attempts")]
    #[serde(alias = "maxAttempts")]
    #[validate(range(min = 1, message = "max_attempts must be positive"))]
    pub(crate) max_attempts: i32,
    #[serde(default)]
    #[validate(nested)]
    pub(crate) questions: Vec<QuestionCreate>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuizUpdate {
    #[serde(default)]
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub(crate) title: Option<String>,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(
        default,
        alias = "startTime",
        deserialize_with = "deserialize_option_offset_datetime_flexible"
    )]
    pub(crate) start_time: Option<OffsetDateTime>,
    #[serde(
        default,
        alias = "endTime",
        deserialize_with = "deserialize_option_offset_datetime_flexible"
    )]
    pub(crate) end_time: Option<OffsetDateTime>,
    #[serde(default)]
    #[serde(alias = "durationMinutes")]
    #[validate(range(min = 1, message = "duration_minutes must be positive"))]
    pub(crate) duration_minutes: Option<i32>,
    #[serde(default, alias = "randomizeQuestions")]
    pub(crate) randomize_questions: Option<bool>,
    #[serde(default, alias = "randomizeOptions")]
    pub(crate) randomize_options: Option<bool>,
    #[serde(default, alias = "showResultsImmediately")]
    pub(crate) show_results_immediately: Option<bool>,
    #[serde(default)]
    #[serde(alias = "maxAttempts")]
    #[validate(range(min = 1, message = "max_attempts must be positive"))]
    pub(crate) max_attempts: Option<i32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionResponse {
    pub(crate) id: String,
    pub(crate) quiz_id: String,
    pub(crate) kind: QuestionKind,
    pub(crate) prompt: String,
    pub(crate) options: Vec<String>,
    pub(crate) correct_answers: Vec<String>,
    pub(crate) marks: i32,
    pub(crate) position: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuizResponse {
    pub(crate) id: String,
    pub(crate) batch_id: String,
    pub(crate) title: String,
    pub(crate) description: Option<String>,
    pub(crate) start_time: String,
    pub(crate) end_time: String,
    pub(crate) duration_minutes: i32,
    pub(crate) total_marks: i32,
    pub(crate) randomize_questions: bool,
    pub(crate) randomize_options: bool,
    pub(crate) show_results_immediately: bool,
    pub(crate) max_attempts: i32,
    pub(crate) status: QuizStatus,
    pub(crate) created_by: String,
    pub(crate) created_at: String,
    pub(crate) published_at: Option<String>,
    pub(crate) questions: Vec<QuestionResponse>,
}

impl QuestionCreate {
    /// True/false questions default their option pair when none is provided.
    pub(crate) fn effective_options(&self) -> Vec<String> {
        if matches!(self.kind, QuestionKind::TrueFalse) && self.options.is_empty() {
            return vec!["True".to_string(), "False".to_string()];
        }
        self.options.clone()
    }

    /// Cross-field shape rules the derive cannot express: the option set is
    /// empty exactly for short answers, and correct answers must come from
    /// the option set.
    pub(crate) fn validate_shape(&self) -> Result<(), String> {
        let options = self.effective_options();

        if self.correct_answers.is_empty()
            || self.correct_answers.iter().any(|value| value.trim().is_empty())
        {
            return Err("correct_answers must not be empty".to_string());
        }

        match self.kind {
            QuestionKind::ShortAnswer => {
                if !self.options.is_empty() {
                    return Err("short_answer questions take no options".to_string());
                }
                if self.correct_answers.len() != 1 {
                    return Err("short_answer questions take one correct answer".to_string());
                }
            }
            QuestionKind::SingleChoice => {
                check_option_set(&options, 2)?;
                if self.correct_answers.len() != 1 {
                    return Err("single_choice questions take one correct answer".to_string());
                }
                if !options.contains(&self.correct_answers[0]) {
                    return Err("correct answer must be one of the options".to_string());
                }
            }
            QuestionKind::MultipleChoice => {
                check_option_set(&options, 2)?;
                for value in &self.correct_answers {
                    if !options.contains(value) {
                        return Err("correct answers must come from the options".to_string());
                    }
                }
            }
            QuestionKind::TrueFalse => {
                if options.len() != 2 {
                    return Err("true_false questions take exactly two options".to_string());
                }
                if self.correct_answers.len() != 1 {
                    return Err("true_false questions take one correct answer".to_string());
                }
                let submitted = normalize_answer(&self.correct_answers[0]);
                if !options.iter().any(|option| normalize_answer(option) == submitted) {
                    return Err("correct answer must be one of the options".to_string());
                }
            }
        }

        Ok(())
    }
}

fn check_option_set(options: &[String], min_len: usize) -> Result<(), String> {
    if options.len() < min_len {
        return Err(format!("at least {min_len} options are required"));
    }
    if options.iter().any(|option| option.trim().is_empty()) {
        return Err("options must not be empty".to_string());
    }
    for (index, option) in options.iter().enumerate() {
        if options[..index].contains(option) {
            return Err("options must be distinct".to_string());
        }
    }
    Ok(())
}

pub(crate) fn question_to_response(question: Question) -> QuestionResponse {
    QuestionResponse {
        id: question.id,
        quiz_id: question.quiz_id,
        kind: question.kind,
        prompt: question.prompt,
        options: question.options.0,
        correct_answers: question.correct_answers.0,
        marks: question.marks,
        position: question.position,
    }
}

pub(crate) fn quiz_to_response(quiz: Quiz, questions: Vec<Question>) -> QuizResponse {
    QuizResponse {
        id: quiz.id,
        batch_id: quiz.batch_id,
        title: quiz.title,
        description: quiz.description,
        start_time: format_primitive(quiz.start_time),
        end_time: format_primitive(quiz.end_time),
        duration_minutes: quiz.duration_minutes,
        total_marks: quiz.total_marks,
        randomize_questions: quiz.randomize_questions,
        randomize_options: quiz.randomize_options,
        show_results_immediately: quiz.show_results_immediately,
        max_attempts: quiz.max_attempts,
        status: quiz.status,
        created_by: quiz.created_by,
        created_at: format_primitive(quiz.created_at),
        published_at: quiz.published_at.map(format_primitive),
        questions: questions.into_iter().map(question_to_response).collect(),
    }
}

fn default_enabled_true() -> bool {
    true
}

fn default_max_attempts() -> i32 {
    1
}

fn parse_offset_datetime_flexible(raw: &str) -> Option<OffsetDateTime> {
    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(value);
    }

    // Frontend's datetime-local often sends without timezone.
    if raw.len() == 16 && raw.as_bytes().get(10) == Some(&b'T') {
        let candidate = format!("{raw}:00Z");
        if let Ok(value) = OffsetDateTime::parse(&candidate, &Rfc3339) {
            return Some(value);
        }
    }

    if raw.len() == 19 && raw.as_bytes().get(10) == Some(&b'T') {
        let candidate = format!("{raw}Z");
        if let Ok(value) = OffsetDateTime::parse(&candidate, &Rfc3339) {
            return Some(value);
        }
    }

    if let Ok(value) =
        PrimitiveDateTime::parse(raw, &format_description!("[year]-[month]-[day]T[hour]:[minute]"))
    {
        return Some(value.assume_utc());
    }
    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    ) {
        return Some(value.assume_utc());
    }

    None
}

fn deserialize_offset_datetime_flexible<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_offset_datetime_flexible(&raw)
        .ok_or_else(|| D::Error::custom(format!("invalid datetime: {raw}")))
}

fn deserialize_option_offset_datetime_flexible<'de, D>(
    deserializer: D,
) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        Some(value) => parse_offset_datetime_flexible(&value)
            .ok_or_else(|| D::Error::custom(format!("invalid datetime: {value}")))
            .map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn payload(kind: QuestionKind, options: &[&str], correct: &[&str]) -> QuestionCreate {
        QuestionCreate {
            kind,
            prompt: "prompt".to_string(),
            options: strings(options),
            correct_answers: strings(correct),
            marks: 5,
            position: 0,
        }
    }

    #[test]
    fn short_answer_rejects_options() {
        assert!(payload(QuestionKind::ShortAnswer, &[], &["Paris"]).validate_shape().is_ok());
        assert!(payload(QuestionKind::ShortAnswer, &["A"], &["Paris"])
            .validate_shape()
            .is_err());
    }

    #[test]
    fn single_choice_requires_correct_from_options() {
        assert!(payload(QuestionKind::SingleChoice, &["A", "B"], &["B"])
            .validate_shape()
            .is_ok());
        assert!(payload(QuestionKind::SingleChoice, &["A", "B"], &["C"])
            .validate_shape()
            .is_err());
        assert!(payload(QuestionKind::SingleChoice, &["A", "B"], &["A", "B"])
            .validate_shape()
            .is_err());
        assert!(payload(QuestionKind::SingleChoice, &["A"], &["A"]).validate_shape().is_err());
    }

    #[test]
    fn multiple_choice_rejects_unknown_and_duplicate_options() {
        assert!(payload(QuestionKind::MultipleChoice, &["A", "B", "C"], &["A", "C"])
            .validate_shape()
            .is_ok());
        assert!(payload(QuestionKind::MultipleChoice, &["A", "B"], &["A", "C"])
            .validate_shape()
            .is_err());
        assert!(payload(QuestionKind::MultipleChoice, &["A", "A"], &["A"])
            .validate_shape()
            .is_err());
    }

    #[test]
    fn true_false_defaults_its_option_pair() {
        let question = payload(QuestionKind::TrueFalse, &[], &["true"]);
        assert_eq!(question.effective_options(), strings(&["True", "False"]));
        assert!(question.validate_shape().is_ok());
        assert!(payload(QuestionKind::TrueFalse, &[], &["maybe"]).validate_shape().is_err());
    }

    #[test]
    fn empty_correct_answers_are_rejected() {
        assert!(payload(QuestionKind::SingleChoice, &["A", "B"], &[]).validate_shape().is_err());
    }

    #[test]
    fn flexible_datetime_parsing_accepts_common_shapes() {
        assert!(parse_offset_datetime_flexible("2026-03-01T10:00:00Z").is_some());
        assert!(parse_offset_datetime_flexible("2026-03-01T10:00").is_some());
        assert!(parse_offset_datetime_flexible("2026-03-01T10:00:00").is_some());
        assert!(parse_offset_datetime_flexible("not-a-date").is_none());
    }
}
