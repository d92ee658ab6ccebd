use time::{Duration, PrimitiveDateTime};

use crate::db::models::Quiz;

pub(crate) fn window_contains(quiz: &Quiz, now: PrimitiveDateTime) -> bool {
    now >= quiz.start_time && now <= quiz.end_time
}

/// The attempt's own deadline: its duration limit, capped by the quiz window.
pub(crate) fn attempt_expiration(
    started_at: PrimitiveDateTime,
    quiz_end: PrimitiveDateTime,
    duration_minutes: i32,
) -> PrimitiveDateTime {
    let duration_deadline = started_at + Duration::minutes(duration_minutes as i64);
    if duration_deadline < quiz_end {
        duration_deadline
    } else {
        quiz_end
    }
}

/// Answers stop being accepted at whichever comes first: the attempt's
/// expiration or the quiz's end. Expiry is evaluated lazily at each
/// interaction; nothing runs on a timer.
pub(crate) fn hard_deadline(
    attempt_expires_at: PrimitiveDateTime,
    quiz_end: PrimitiveDateTime,
) -> PrimitiveDateTime {
    if attempt_expires_at < quiz_end {
        attempt_expires_at
    } else {
        quiz_end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn attempt_expiration_uses_duration_inside_window() {
        let started = datetime!(2026-03-01 10:00);
        let quiz_end = datetime!(2026-03-01 12:00);
        assert_eq!(attempt_expiration(started, quiz_end, 30), datetime!(2026-03-01 10:30));
    }

    #[test]
    fn attempt_expiration_is_capped_by_quiz_end() {
        let started = datetime!(2026-03-01 11:45);
        let quiz_end = datetime!(2026-03-01 12:00);
        assert_eq!(attempt_expiration(started, quiz_end, 30), quiz_end);
    }

    #[test]
    fn hard_deadline_picks_the_earlier_bound() {
        let expires = datetime!(2026-03-01 10:30);
        let quiz_end = datetime!(2026-03-01 12:00);
        assert_eq!(hard_deadline(expires, quiz_end), expires);
        assert_eq!(hard_deadline(quiz_end, expires), expires);
    }
}
