//! Presentation-facing controllers: each turns facade streams into a single
//! view state plus one-shot events.

pub mod detail;
pub mod list;

pub use detail::CourseDetailController;
pub use list::CourseListController;
