use std::collections::{BTreeSet, HashMap};

use crate::db::models::Question;
use crate::db::types::QuestionKind;

#[derive(Debug, Clone)]
pub(crate) struct QuestionResult {
    pub(crate) question_id: String,
    pub(crate) is_correct: bool,
    pub(crate) marks_awarded: i32,
}

#[derive(Debug, Clone)]
pub(crate) struct GradedAttempt {
    pub(crate) score: i32,
    pub(crate) total_marks: i32,
    pub(crate) percentage: f64,
    pub(crate) questions: Vec<QuestionResult>,
}

pub(crate) fn normalize_answer(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Grades every question of the quiz. Unanswered questions count as
/// incorrect, never as skipped.
pub(crate) fn grade_attempt(
    questions: &[Question],
    responses: &HashMap<String, Vec<String>>,
) -> GradedAttempt {
    let mut score = 0;
    let mut total_marks = 0;
    let mut results = Vec::with_capacity(questions.len());

    for question in questions {
        total_marks += question.marks;

        let is_correct = responses
            .get(&question.id)
            .map(|values| response_matches(question, values))
            .unwrap_or(false);
        let marks_awarded = if is_correct { question.marks } else { 0 };
        score += marks_awarded;

        results.push(QuestionResult { question_id: question.id.clone(), is_correct, marks_awarded });
    }

    GradedAttempt {
        score,
        total_marks,
        percentage: percentage_of(score, total_marks),
        questions: results,
    }
}

fn response_matches(question: &Question, submitted: &[String]) -> bool {
    if submitted.is_empty() {
        return false;
    }

    let correct = &question.correct_answers.0;
    match question.kind {
        QuestionKind::SingleChoice => {
            submitted.len() == 1
                && correct.first().map(|value| value == &submitted[0]).unwrap_or(false)
        }
        QuestionKind::TrueFalse | QuestionKind::ShortAnswer => {
            submitted.len() == 1
                && correct
                    .first()
                    .map(|value| normalize_answer(value) == normalize_answer(&submitted[0]))
                    .unwrap_or(false)
        }
        QuestionKind::MultipleChoice => {
            // All-or-nothing: the submitted set must equal the correct set.
            let submitted: BTreeSet<&str> = submitted.iter().map(String::as_str).collect();
            let correct: BTreeSet<&str> = correct.iter().map(String::as_str).collect();
            !correct.is_empty() && submitted == correct
        }
    }
}

pub(crate) fn percentage_of(score: i32, total_marks: i32) -> f64 {
    if total_marks <= 0 {
        return 0.0;
    }

    f64::from(score) * 100.0 / f64::from(total_marks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;
    use time::macros::datetime;

    fn question(
        id: &str,
        kind: QuestionKind,
        options: &[&str],
        correct: &[&str],
        marks: i32,
    ) -> Question {
        let stamp = datetime!(2026-01-10 09:00);
        Question {
            id: id.to_string(),
            quiz_id: "quiz-1".to_string(),
            kind,
            prompt: format!("prompt for {id}"),
            options: Json(options.iter().map(|value| value.to_string()).collect()),
            correct_answers: Json(correct.iter().map(|value| value.to_string()).collect()),
            marks,
            position: 0,
            created_at: stamp,
            updated_at: stamp,
        }
    }

    fn responses(entries: &[(&str, &[&str])]) -> HashMap<String, Vec<String>> {
        entries
            .iter()
            .map(|(id, values)| {
                (id.to_string(), values.iter().map(|value| value.to_string()).collect())
            })
            .collect()
    }

    #[test]
    fn grades_mixed_quiz_with_case_insensitive_short_answer() {
        let questions = vec![
            question("q1", QuestionKind::SingleChoice, &["A", "B", "C"], &["B"], 5),
            question("q2", QuestionKind::ShortAnswer, &[], &["Paris"], 5),
        ];
        let graded =
            grade_attempt(&questions, &responses(&[("q1", &["B"]), ("q2", &["paris"])]));

        assert_eq!(graded.score, 10);
        assert_eq!(graded.total_marks, 10);
        assert_eq!(graded.percentage, 100.0);
        assert!(graded.questions.iter().all(|result| result.is_correct));
    }

    #[test]
    fn unanswered_questions_score_zero() {
        let questions = vec![
            question("q1", QuestionKind::SingleChoice, &["A", "B", "C"], &["B"], 5),
            question("q2", QuestionKind::ShortAnswer, &[], &["Paris"], 5),
        ];
        let graded = grade_attempt(&questions, &responses(&[("q1", &["A"])]));

        assert_eq!(graded.score, 0);
        assert_eq!(graded.percentage, 0.0);
        assert_eq!(graded.questions.len(), 2);
        assert!(graded.questions.iter().all(|result| !result.is_correct));
    }

    #[test]
    fn multi_select_awards_nothing_for_partial_answers() {
        let questions =
            vec![question("q1", QuestionKind::MultipleChoice, &["A", "B", "C"], &["A", "C"], 4)];

        let partial = grade_attempt(&questions, &responses(&[("q1", &["A"])]));
        assert_eq!(partial.score, 0);
        assert!(!partial.questions[0].is_correct);

        let superset = grade_attempt(&questions, &responses(&[("q1", &["A", "B", "C"])]));
        assert_eq!(superset.score, 0);

        let exact = grade_attempt(&questions, &responses(&[("q1", &["C", "A"])]));
        assert_eq!(exact.score, 4);
        assert!(exact.questions[0].is_correct);
    }

    #[test]
    fn true_false_normalizes_text() {
        let questions =
            vec![question("q1", QuestionKind::TrueFalse, &["True", "False"], &["True"], 2)];
        let graded = grade_attempt(&questions, &responses(&[("q1", &[" true "])]));

        assert_eq!(graded.score, 2);
    }

    #[test]
    fn single_choice_requires_exact_value() {
        let questions = vec![question("q1", QuestionKind::SingleChoice, &["A", "B"], &["B"], 3)];

        let wrong = grade_attempt(&questions, &responses(&[("q1", &["A"])]));
        assert_eq!(wrong.score, 0);

        let doubled = grade_attempt(&questions, &responses(&[("q1", &["A", "B"])]));
        assert_eq!(doubled.score, 0);
    }

    #[test]
    fn empty_quiz_is_not_an_error() {
        let graded = grade_attempt(&[], &HashMap::new());

        assert_eq!(graded.score, 0);
        assert_eq!(graded.total_marks, 0);
        assert_eq!(graded.percentage, 0.0);
        assert!(graded.questions.is_empty());
    }

    #[test]
    fn zero_total_marks_does_not_divide() {
        assert_eq!(percentage_of(0, 0), 0.0);
        assert_eq!(percentage_of(5, 10), 50.0);
    }
}
