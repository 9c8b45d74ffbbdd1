#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Semaphore, watch};

use course_catalog::db::CourseStore;
use course_catalog::error::FetchError;
use course_catalog::models::{Course, Instructor};
use course_catalog::network::ManualMonitor;
use course_catalog::remote::CourseFetcher;
use course_catalog::services::{CatalogService, SyncEngine};

pub const WAIT: Duration = Duration::from_secs(2);

pub fn course(id: &str, title: &str, tags: &[&str]) -> Course {
    Course {
        course_id: id.to_string(),
        title: title.to_string(),
        description_short: format!("About {}", title),
        instructor: Instructor {
            name: "Prof. Anika".to_string(),
            expertise_level: "Senior Developer".to_string(),
        },
        duration_weeks: 8,
        price_usd: 49.99,
        is_premium: true,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        rating: 4.8,
        is_enrolled: false,
    }
}

pub fn sample_catalog() -> Vec<Course> {
    vec![
        course("KOTLIN-001", "Android App Development with Compose", &["Compose", "MVVM", "Coroutines"]),
        course("SWIFT-001", "iOS Development with SwiftUI", &["SwiftUI", "Combine"]),
        course("RUST-001", "Systems Programming in Rust", &["Ownership", "Async"]),
    ]
}

pub fn titles(courses: &[Course]) -> Vec<&str> {
    courses.iter().map(|c| c.title.as_str()).collect()
}

/// Fetcher that replays queued outcomes, then keeps returning `fallback`.
/// With a gate, every call first waits for a permit.
pub struct ScriptedFetcher {
    responses: Mutex<VecDeque<Result<Vec<Course>, String>>>,
    fallback: Vec<Course>,
    calls: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedFetcher {
    pub fn new(fallback: Vec<Course>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fallback,
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    pub fn gated(fallback: Vec<Course>, gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::new(fallback)
        }
    }

    pub fn push_ok(&self, courses: Vec<Course>) {
        self.responses.lock().unwrap().push_back(Ok(courses));
    }

    pub fn push_err(&self, message: &str) {
        self.responses.lock().unwrap().push_back(Err(message.to_string()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CourseFetcher for ScriptedFetcher {
    async fn fetch_all(&self) -> Result<Vec<Course>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Ok(courses)) => Ok(courses),
            Some(Err(message)) => Err(FetchError::Network(message)),
            None => Ok(self.fallback.clone()),
        }
    }
}

pub struct Harness {
    pub store: CourseStore,
    pub fetcher: Arc<ScriptedFetcher>,
    pub monitor: Arc<ManualMonitor>,
    pub engine: Arc<SyncEngine>,
    pub catalog: CatalogService,
}

pub async fn harness(fetcher: ScriptedFetcher, online: bool) -> Harness {
    let store = CourseStore::open_in_memory().await.expect("in-memory store");
    let fetcher = Arc::new(fetcher);
    let monitor = Arc::new(ManualMonitor::new(online));
    let engine = Arc::new(SyncEngine::new(store.clone(), fetcher.clone(), monitor.clone()));
    let catalog = CatalogService::new(store.clone(), engine.clone());
    Harness {
        store,
        fetcher,
        monitor,
        engine,
        catalog,
    }
}

/// Waits until the watched value satisfies `predicate`, failing the test after [`WAIT`].
pub async fn wait_until<T, F>(rx: &mut watch::Receiver<T>, predicate: F) -> T
where
    T: Clone,
    F: FnMut(&T) -> bool,
{
    tokio::time::timeout(WAIT, rx.wait_for(predicate))
        .await
        .expect("timed out waiting for state")
        .expect("sender dropped")
        .clone()
}

/// Fails the test if `fut` completes within a short window.
pub async fn assert_pending<F: Future>(fut: F) {
    assert!(
        tokio::time::timeout(Duration::from_millis(100), fut).await.is_err(),
        "expected no further value"
    );
}
