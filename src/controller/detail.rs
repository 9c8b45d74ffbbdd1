use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use futures::StreamExt;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::models::{CourseDetailState, DetailEvent};
use crate::services::CatalogService;

const EVENT_BUFFER: usize = 64;

/// Drives the single-course screen.
pub struct CourseDetailController {
    course_id: String,
    catalog: CatalogService,
    state: Arc<watch::Sender<CourseDetailState>>,
    events_tx: mpsc::Sender<DetailEvent>,
    events_rx: Mutex<mpsc::Receiver<DetailEvent>>,
    loader: StdMutex<JoinHandle<()>>,
}

impl CourseDetailController {
    pub fn new(catalog: CatalogService, course_id: impl Into<String>) -> Self {
        let course_id = course_id.into();
        let (state, _) = watch::channel(CourseDetailState::Loading);
        let state = Arc::new(state);
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let loader = spawn_loader(&catalog, &course_id, Arc::clone(&state));

        Self {
            course_id,
            catalog,
            state,
            events_tx,
            events_rx: Mutex::new(events_rx),
            loader: StdMutex::new(loader),
        }
    }

    pub fn state(&self) -> watch::Receiver<CourseDetailState> {
        self.state.subscribe()
    }

    pub fn current_state(&self) -> CourseDetailState {
        self.state.borrow().clone()
    }

    /// Enrolls when not enrolled, unenrolls when enrolled. Ignored unless the
    /// course is loaded.
    pub async fn toggle_enrollment(&self) {
        let was_enrolled = match &*self.state.borrow() {
            CourseDetailState::Success { course, .. } => course.is_enrolled,
            _ => return,
        };

        self.set_enrolling(true);

        let result = if was_enrolled {
            self.catalog.unenroll(&self.course_id).await
        } else {
            self.catalog.enroll(&self.course_id).await
        };

        let event = match result {
            Ok(()) if was_enrolled => DetailEvent::UnenrollSuccess,
            Ok(()) => DetailEvent::EnrollSuccess,
            Err(e) => DetailEvent::Error {
                message: e.user_message("Failed to update enrollment status"),
            },
        };
        if let Err(e) = self.events_tx.try_send(event) {
            warn!("dropping enrollment event: {}", e);
        }

        self.set_enrolling(false);
    }

    /// Back to `Loading` and a fresh subscription to the course.
    pub fn retry(&self) {
        let mut loader = self.loader.lock().unwrap_or_else(PoisonError::into_inner);
        loader.abort();
        self.state.send_replace(CourseDetailState::Loading);
        *loader = spawn_loader(&self.catalog, &self.course_id, Arc::clone(&self.state));
    }

    pub async fn next_event(&self) -> Option<DetailEvent> {
        self.events_rx.lock().await.recv().await
    }

    fn set_enrolling(&self, enrolling: bool) {
        self.state.send_if_modified(|state| match state {
            CourseDetailState::Success { is_enrolling, .. } if *is_enrolling != enrolling => {
                *is_enrolling = enrolling;
                true
            }
            _ => false,
        });
    }
}

impl Drop for CourseDetailController {
    fn drop(&mut self) {
        self.loader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .abort();
    }
}

fn spawn_loader(
    catalog: &CatalogService,
    course_id: &str,
    state: Arc<watch::Sender<CourseDetailState>>,
) -> JoinHandle<()> {
    let mut updates = catalog.get_course_by_id(course_id);

    tokio::spawn(async move {
        while let Some(item) = updates.next().await {
            state.send_modify(|current| {
                *current = match item {
                    Ok(Some(course)) => {
                        // A record update must not cancel an enrollment in progress.
                        let is_enrolling = matches!(
                            current,
                            CourseDetailState::Success { is_enrolling: true, .. }
                        );
                        CourseDetailState::Success {
                            course,
                            is_enrolling,
                        }
                    }
                    Ok(None) => CourseDetailState::NotFound,
                    Err(e) => CourseDetailState::Error {
                        message: e.user_message("Failed to load course details"),
                    },
                };
            });
        }
    })
}
