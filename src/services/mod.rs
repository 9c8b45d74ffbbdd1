pub mod catalog;
pub mod scheduler;
pub mod sync_engine;

pub use catalog::CatalogService;
pub use scheduler::SyncScheduler;
pub use sync_engine::SyncEngine;
