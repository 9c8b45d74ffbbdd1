pub mod course;
pub mod sync_status;
pub mod view;

pub use course::{Course, Instructor};
pub use sync_status::SyncStatus;
pub use view::{CourseDetailState, CourseListState, DetailEvent, EnrollmentEvent};
