use axum::Json;
use axum::extract::{Path, Query};
use axum::routing::post;
use axum::{Router, extract::State, http::StatusCode, routing::get};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{Course, SyncStatus};
use crate::state::AppState;

#[derive(Deserialize)]
struct CourseQueryParams {
    #[serde(default)]
    q: String,
}

#[derive(Debug, Serialize)]
pub struct SyncStatusResponse {
    pub status: SyncStatus,
    pub is_connected: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/courses", get(list_courses))
        .route("/courses/{id}", get(get_course))
        .route("/courses/{id}/enroll", post(enroll))
        .route("/courses/{id}/unenroll", post(unenroll))
        .route("/sync", post(sync_now))
        .route("/sync/status", get(sync_status))
        .with_state(state)
}

/// Current value of a live query.
async fn first<T>(mut stream: BoxStream<'static, Result<T, AppError>>) -> Result<T, AppError> {
    stream.next().await.ok_or(AppError::InternalServerError)?
}

fn status_response(state: &AppState) -> SyncStatusResponse {
    SyncStatusResponse {
        status: state.engine.status(),
        is_connected: state.engine.is_connected(),
        last_synced_at: state.engine.last_synced_at(),
    }
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1")
        .execute(&state.db)
        .await
        .map_err(crate::error::StoreError::from)?;
    Ok(StatusCode::OK)
}

async fn list_courses(
    State(state): State<AppState>,
    Query(params): Query<CourseQueryParams>,
) -> Result<Json<Vec<Course>>, AppError> {
    let courses = if params.q.trim().is_empty() {
        first(state.catalog.get_courses()).await?
    } else {
        first(state.catalog.search_courses(&params.q)).await?
    };
    Ok(Json(courses))
}

async fn get_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Course>, AppError> {
    let course = first(state.catalog.get_course_by_id(&id))
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(course))
}

async fn enroll(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.catalog.enroll(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn unenroll(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.catalog.unenroll(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn sync_now(State(state): State<AppState>) -> Result<Json<SyncStatusResponse>, AppError> {
    state.catalog.refresh().await?;
    Ok(Json(status_response(&state)))
}

async fn sync_status(State(state): State<AppState>) -> Json<SyncStatusResponse> {
    Json(status_response(&state))
}
