use serde::Serialize;

use super::{Course, SyncStatus};

/// View state of the course list screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CourseListState {
    Loading,
    Success {
        courses: Vec<Course>,
        sync_status: SyncStatus,
        is_connected: bool,
    },
    Error {
        message: String,
    },
}

/// One-shot outcome of an enroll action on the list screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnrollmentEvent {
    Success,
    Error { message: String },
}

/// View state of a single course screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CourseDetailState {
    Loading,
    Success { course: Course, is_enrolling: bool },
    Error { message: String },
    NotFound,
}

/// One-shot outcome of toggling enrollment on the detail screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetailEvent {
    EnrollSuccess,
    UnenrollSuccess,
    Error { message: String },
}
