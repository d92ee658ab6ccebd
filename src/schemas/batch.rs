use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::Batch;
use crate::db::types::EnrollmentStatus;
use crate::repositories::enrollments::RosterRow;

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct BatchCreate {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    /// Admins may create a batch on behalf of a teacher; teachers own what
    /// they create.
    #[serde(default)]
    #[serde(alias = "teacherId")]
    pub(crate) teacher_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct EnrollmentCreate {
    #[serde(alias = "studentId")]
    #[validate(length(min = 1, message = "student_id must not be empty"))]
    pub(crate) student_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct BatchResponse {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) teacher_id: String,
    pub(crate) is_active: bool,
    pub(crate) created_at: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct RosterEntryResponse {
    pub(crate) student_id: String,
    pub(crate) student_email: String,
    pub(crate) student_name: String,
    pub(crate) status: EnrollmentStatus,
    pub(crate) joined_at: String,
}

impl From<Batch> for BatchResponse {
    fn from(batch: Batch) -> Self {
        Self {
            id: batch.id,
            name: batch.name,
            description: batch.description,
            teacher_id: batch.teacher_id,
            is_active: batch.is_active,
            created_at: format_primitive(batch.created_at),
        }
    }
}

impl From<RosterRow> for RosterEntryResponse {
    fn from(row: RosterRow) -> Self {
        Self {
            student_id: row.student_id,
            student_email: row.student_email,
            student_name: row.student_name,
            status: row.status,
            joined_at: format_primitive(row.joined_at),
        }
    }
}
