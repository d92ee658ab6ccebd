pub(crate) mod answers;
pub(crate) mod attempts;
pub(crate) mod batches;
pub(crate) mod enrollments;
pub(crate) mod questions;
pub(crate) mod quizzes;
pub(crate) mod users;
