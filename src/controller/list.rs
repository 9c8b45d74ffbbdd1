use futures::StreamExt;
use futures::stream::{self, BoxStream};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::models::{Course, CourseListState, EnrollmentEvent, SyncStatus};
use crate::network::ConnectivitySubscription;
use crate::services::CatalogService;

const EVENT_BUFFER: usize = 64;

/// Drives the course list screen: search query in, one combined
/// [`CourseListState`] out, plus one-shot [`EnrollmentEvent`]s.
///
/// The combining task lives as long as the controller.
pub struct CourseListController {
    catalog: CatalogService,
    query: watch::Sender<String>,
    state: watch::Receiver<CourseListState>,
    is_enrolling: watch::Sender<bool>,
    events_tx: mpsc::Sender<EnrollmentEvent>,
    events_rx: Mutex<mpsc::Receiver<EnrollmentEvent>>,
    task: JoinHandle<()>,
}

impl CourseListController {
    pub fn new(catalog: CatalogService) -> Self {
        let (query, query_rx) = watch::channel(String::new());
        let (state_tx, state) = watch::channel(CourseListState::Loading);
        let (is_enrolling, _) = watch::channel(false);
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);

        let engine = catalog.engine();
        let status_rx = engine.subscribe_status();
        let connectivity = engine.connectivity().observe();
        let task = tokio::spawn(combine(
            catalog.clone(),
            query_rx,
            status_rx,
            connectivity,
            state_tx,
        ));

        Self {
            catalog,
            query,
            state,
            is_enrolling,
            events_tx,
            events_rx: Mutex::new(events_rx),
            task,
        }
    }

    pub fn state(&self) -> watch::Receiver<CourseListState> {
        self.state.clone()
    }

    pub fn current_state(&self) -> CourseListState {
        self.state.borrow().clone()
    }

    pub fn search_query(&self) -> String {
        self.query.borrow().clone()
    }

    pub fn on_search_query_changed(&self, query: impl Into<String>) {
        self.query.send_replace(query.into());
    }

    pub fn clear_search(&self) {
        self.query.send_replace(String::new());
    }

    pub async fn retry_sync(&self) -> SyncStatus {
        self.catalog.engine().refresh().await
    }

    pub fn is_enrolling(&self) -> watch::Receiver<bool> {
        self.is_enrolling.subscribe()
    }

    /// Enrolls in `course_id` and queues exactly one event describing the outcome.
    pub async fn enroll_in_course(&self, course_id: &str) {
        self.is_enrolling.send_replace(true);

        let event = match self.catalog.enroll(course_id).await {
            Ok(()) => EnrollmentEvent::Success,
            Err(e) => EnrollmentEvent::Error {
                message: e.user_message("Failed to enroll in course"),
            },
        };
        if let Err(e) = self.events_tx.try_send(event) {
            warn!("dropping enrollment event: {}", e);
        }

        self.is_enrolling.send_replace(false);
    }

    /// Next undelivered enrollment event. Each event is handed out once.
    pub async fn next_event(&self) -> Option<EnrollmentEvent> {
        self.events_rx.lock().await.recv().await
    }
}

impl Drop for CourseListController {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn courses_for(catalog: &CatalogService, query: &str) -> BoxStream<'static, Result<Vec<Course>, AppError>> {
    if query.trim().is_empty() {
        catalog.get_courses()
    } else {
        catalog.search_courses(query)
    }
}

/// Folds query changes, course results, sync status and connectivity into
/// the view state. Replacing the course stream on a query change drops the
/// old one, so results for a superseded query can never be applied.
async fn combine(
    catalog: CatalogService,
    mut query_rx: watch::Receiver<String>,
    mut status_rx: watch::Receiver<SyncStatus>,
    mut connectivity: ConnectivitySubscription,
    state_tx: watch::Sender<CourseListState>,
) {
    let initial_query = query_rx.borrow_and_update().clone();
    let mut courses = courses_for(&catalog, &initial_query);
    let mut latest: Option<Result<Vec<Course>, String>> = None;
    let mut is_connected = catalog.engine().is_connected();

    loop {
        tokio::select! {
            changed = query_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let query = query_rx.borrow_and_update().clone();
                debug!("search query changed to {:?}", query);
                courses = courses_for(&catalog, &query);
                continue;
            }
            item = courses.next() => match item {
                Some(Ok(list)) => latest = Some(Ok(list)),
                Some(Err(e)) => latest = Some(Err(e.user_message("Failed to load courses"))),
                None => {
                    courses = stream::pending().boxed();
                    continue;
                }
            },
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            available = connectivity.recv() => match available {
                Some(available) => is_connected = available,
                None => break,
            },
        }

        // Loading holds until the first course result arrives.
        let Some(latest) = &latest else { continue };
        let next = match latest {
            Ok(list) => CourseListState::Success {
                courses: list.clone(),
                sync_status: status_rx.borrow_and_update().clone(),
                is_connected,
            },
            Err(message) => CourseListState::Error {
                message: message.clone(),
            },
        };
        state_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
