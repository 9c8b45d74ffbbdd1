use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;

use crate::db::CourseStore;
use crate::error::AppError;
use crate::models::{Course, SyncStatus};
use crate::services::sync_engine::SyncEngine;

/// Read queries and enrollment commands consumed by the presentation layer.
/// Adds no merge logic of its own.
#[derive(Clone)]
pub struct CatalogService {
    store: CourseStore,
    engine: Arc<SyncEngine>,
}

impl CatalogService {
    pub fn new(store: CourseStore, engine: Arc<SyncEngine>) -> Self {
        Self { store, engine }
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    pub fn get_courses(&self) -> BoxStream<'static, Result<Vec<Course>, AppError>> {
        self.store.get_all().map(|item| item.map_err(AppError::from)).boxed()
    }

    pub fn search_courses(&self, query: &str) -> BoxStream<'static, Result<Vec<Course>, AppError>> {
        self.store
            .search(query)
            .map(|item| item.map_err(AppError::from))
            .boxed()
    }

    pub fn get_course_by_id(&self, course_id: &str) -> BoxStream<'static, Result<Option<Course>, AppError>> {
        self.store
            .get_by_id(course_id)
            .map(|item| item.map_err(AppError::from))
            .boxed()
    }

    pub async fn enroll(&self, course_id: &str) -> Result<(), AppError> {
        self.store.set_enrollment(course_id, true).await?;
        Ok(())
    }

    pub async fn unenroll(&self, course_id: &str) -> Result<(), AppError> {
        self.store.set_enrollment(course_id, false).await?;
        Ok(())
    }

    /// Runs a sync cycle and reports how it ended.
    pub async fn refresh(&self) -> Result<(), AppError> {
        match self.engine.refresh().await {
            SyncStatus::Idle | SyncStatus::Syncing | SyncStatus::Success => Ok(()),
            SyncStatus::DeviceOffline => Err(AppError::Offline),
            SyncStatus::NetworkError { message } => Err(AppError::Sync(message)),
        }
    }
}
