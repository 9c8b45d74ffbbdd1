use std::sync::Arc;

use sqlx::SqlitePool;

use crate::services::{CatalogService, SyncEngine};

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub catalog: CatalogService,
    pub engine: Arc<SyncEngine>,
}
