pub mod repository;

pub use repository::CourseStore;
