use thiserror::Error;
use time::PrimitiveDateTime;

use crate::db::models::{Quiz, User};
use crate::db::types::{QuizStatus, UserRole};
use crate::services::quiz_timing;

/// Facts the attempt policy needs, prefetched by the caller so the checks
/// themselves stay pure and synchronous.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AttemptEligibility {
    pub(crate) enrolled: bool,
    pub(crate) submitted_attempts: i64,
    pub(crate) has_open_attempt: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub(crate) enum AttemptDenial {
    #[error("Only students can take quizzes")]
    NotStudent,
    #[error("Enrollment in the quiz's batch is required")]
    NotEnrolled,
    #[error("Quiz is not open for attempts")]
    QuizNotPublished,
    #[error("Quiz is outside its scheduled window")]
    OutsideWindow,
    #[error("Maximum attempts reached")]
    AttemptLimitReached,
}

pub(crate) fn check_attempt(
    user: &User,
    quiz: &Quiz,
    eligibility: &AttemptEligibility,
    now: PrimitiveDateTime,
) -> Result<(), AttemptDenial> {
    if !matches!(user.role, UserRole::Student) {
        return Err(AttemptDenial::NotStudent);
    }
    if !eligibility.enrolled {
        return Err(AttemptDenial::NotEnrolled);
    }
    if quiz.status != QuizStatus::Published {
        return Err(AttemptDenial::QuizNotPublished);
    }
    if !quiz_timing::window_contains(quiz, now) {
        return Err(AttemptDenial::OutsideWindow);
    }

    // An unsubmitted attempt is always resumable; only submitted attempts
    // count against the cap.
    if eligibility.has_open_attempt
        || eligibility.submitted_attempts < i64::from(quiz.max_attempts)
    {
        Ok(())
    } else {
        Err(AttemptDenial::AttemptLimitReached)
    }
}

pub(crate) fn can_attempt(
    user: &User,
    quiz: &Quiz,
    eligibility: &AttemptEligibility,
    now: PrimitiveDateTime,
) -> bool {
    check_attempt(user, quiz, eligibility, now).is_ok()
}

/// Structural edits cover the question set and the quiz configuration. Once
/// any attempt exists against a published quiz they are permanently blocked:
/// mutating questions under recorded answers would corrupt computed scores.
pub(crate) fn can_edit_quiz_structure(
    user: &User,
    quiz: &Quiz,
    owns_batch: bool,
    attempt_count: i64,
) -> bool {
    let unlocked = quiz.status == QuizStatus::Draft || attempt_count == 0;
    match user.role {
        UserRole::Admin => unlocked,
        UserRole::Teacher => owns_batch && unlocked,
        UserRole::Student => false,
    }
}

pub(crate) fn can_view_results(
    user: &User,
    quiz: &Quiz,
    owns_batch: bool,
    enrolled: bool,
) -> bool {
    match user.role {
        UserRole::Admin => true,
        UserRole::Teacher => owns_batch,
        UserRole::Student => quiz.show_results_immediately && enrolled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn user(role: UserRole) -> User {
        let stamp = datetime!(2026-01-10 09:00);
        User {
            id: "user-1".to_string(),
            email: "user@example.com".to_string(),
            full_name: "Test User".to_string(),
            role,
            is_active: true,
            created_at: stamp,
            updated_at: stamp,
        }
    }

    fn quiz(status: QuizStatus) -> Quiz {
        let stamp = datetime!(2026-01-10 09:00);
        Quiz {
            id: "quiz-1".to_string(),
            batch_id: "batch-1".to_string(),
            title: "Midterm".to_string(),
            description: None,
            start_time: datetime!(2026-03-01 10:00),
            end_time: datetime!(2026-03-01 12:00),
            duration_minutes: 30,
            total_marks: 10,
            randomize_questions: true,
            randomize_options: false,
            show_results_immediately: true,
            max_attempts: 1,
            status,
            created_by: "teacher-1".to_string(),
            created_at: stamp,
            updated_at: stamp,
            published_at: None,
        }
    }

    fn eligibility() -> AttemptEligibility {
        AttemptEligibility { enrolled: true, submitted_attempts: 0, has_open_attempt: false }
    }

    const IN_WINDOW: PrimitiveDateTime = datetime!(2026-03-01 11:00);

    #[test]
    fn enrolled_student_can_attempt_published_quiz() {
        let student = user(UserRole::Student);
        assert!(can_attempt(&student, &quiz(QuizStatus::Published), &eligibility(), IN_WINDOW));
    }

    #[test]
    fn teachers_and_admins_cannot_attempt() {
        let quiz = quiz(QuizStatus::Published);
        assert_eq!(
            check_attempt(&user(UserRole::Teacher), &quiz, &eligibility(), IN_WINDOW),
            Err(AttemptDenial::NotStudent)
        );
        assert_eq!(
            check_attempt(&user(UserRole::Admin), &quiz, &eligibility(), IN_WINDOW),
            Err(AttemptDenial::NotStudent)
        );
    }

    #[test]
    fn unenrolled_student_is_denied() {
        let student = user(UserRole::Student);
        let facts = AttemptEligibility { enrolled: false, ..eligibility() };
        assert_eq!(
            check_attempt(&student, &quiz(QuizStatus::Published), &facts, IN_WINDOW),
            Err(AttemptDenial::NotEnrolled)
        );
    }

    #[test]
    fn draft_and_archived_quizzes_are_closed() {
        let student = user(UserRole::Student);
        assert_eq!(
            check_attempt(&student, &quiz(QuizStatus::Draft), &eligibility(), IN_WINDOW),
            Err(AttemptDenial::QuizNotPublished)
        );
        assert_eq!(
            check_attempt(&student, &quiz(QuizStatus::Archived), &eligibility(), IN_WINDOW),
            Err(AttemptDenial::QuizNotPublished)
        );
    }

    #[test]
    fn attempts_outside_the_window_are_denied() {
        let student = user(UserRole::Student);
        let quiz = quiz(QuizStatus::Published);
        assert_eq!(
            check_attempt(&student, &quiz, &eligibility(), datetime!(2026-03-01 09:59)),
            Err(AttemptDenial::OutsideWindow)
        );
        assert_eq!(
            check_attempt(&student, &quiz, &eligibility(), datetime!(2026-03-01 12:01)),
            Err(AttemptDenial::OutsideWindow)
        );
    }

    #[test]
    fn submitted_attempt_exhausts_a_single_attempt_cap() {
        let student = user(UserRole::Student);
        let facts = AttemptEligibility {
            enrolled: true,
            submitted_attempts: 1,
            has_open_attempt: false,
        };
        assert_eq!(
            check_attempt(&student, &quiz(QuizStatus::Published), &facts, IN_WINDOW),
            Err(AttemptDenial::AttemptLimitReached)
        );
    }

    #[test]
    fn open_attempt_can_always_be_resumed() {
        let student = user(UserRole::Student);
        let facts = AttemptEligibility {
            enrolled: true,
            submitted_attempts: 1,
            has_open_attempt: true,
        };
        assert!(can_attempt(&student, &quiz(QuizStatus::Published), &facts, IN_WINDOW));
    }

    #[test]
    fn structure_edits_follow_draft_or_zero_attempts() {
        let teacher = user(UserRole::Teacher);

        assert!(can_edit_quiz_structure(&teacher, &quiz(QuizStatus::Draft), true, 0));
        assert!(can_edit_quiz_structure(&teacher, &quiz(QuizStatus::Published), true, 0));
        assert!(!can_edit_quiz_structure(&teacher, &quiz(QuizStatus::Published), true, 1));
        assert!(!can_edit_quiz_structure(&teacher, &quiz(QuizStatus::Published), false, 0));
        assert!(!can_edit_quiz_structure(&user(UserRole::Student), &quiz(QuizStatus::Draft), true, 0));
        assert!(can_edit_quiz_structure(&user(UserRole::Admin), &quiz(QuizStatus::Draft), false, 0));
        assert!(!can_edit_quiz_structure(&user(UserRole::Admin), &quiz(QuizStatus::Published), false, 3));
    }

    #[test]
    fn result_visibility_by_role() {
        let quiz_visible = quiz(QuizStatus::Published);
        let mut quiz_hidden = quiz(QuizStatus::Published);
        quiz_hidden.show_results_immediately = false;

        assert!(can_view_results(&user(UserRole::Admin), &quiz_hidden, false, false));
        assert!(can_view_results(&user(UserRole::Teacher), &quiz_hidden, true, false));
        assert!(!can_view_results(&user(UserRole::Teacher), &quiz_hidden, false, false));
        assert!(can_view_results(&user(UserRole::Student), &quiz_visible, false, true));
        assert!(!can_view_results(&user(UserRole::Student), &quiz_hidden, false, true));
        assert!(!can_view_results(&user(UserRole::Student), &quiz_visible, false, false));
    }
}
