use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::db::CourseStore;
use crate::error::{MergeError, describe};
use crate::models::SyncStatus;
use crate::network::ConnectivityMonitor;
use crate::remote::CourseFetcher;

/// Pulls the remote catalog into the local store and tracks the outcome as a
/// [`SyncStatus`].
///
/// ```text
/// Idle ──refresh, online──▶ Syncing ──fetch+merge ok──▶ Success
///   │                          └──fetch or merge err──▶ NetworkError
///   └──refresh offline / connectivity lost──▶ DeviceOffline
/// DeviceOffline | NetworkError ──connectivity regained──▶ Syncing (once)
/// ```
///
/// `refresh` never fails outward; every error ends up in the status.
pub struct SyncEngine {
    store: CourseStore,
    fetcher: Arc<dyn CourseFetcher>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    status: watch::Sender<SyncStatus>,
    last_synced_at: watch::Sender<Option<DateTime<Utc>>>,
    needs_retry: AtomicBool,
    in_flight: watch::Sender<bool>,
}

impl SyncEngine {
    pub fn new(
        store: CourseStore,
        fetcher: Arc<dyn CourseFetcher>,
        connectivity: Arc<dyn ConnectivityMonitor>,
    ) -> Self {
        let (status, _) = watch::channel(SyncStatus::Idle);
        let (last_synced_at, _) = watch::channel(None);
        let (in_flight, _) = watch::channel(false);
        Self {
            store,
            fetcher,
            connectivity,
            status,
            last_synced_at,
            needs_retry: AtomicBool::new(false),
            in_flight,
        }
    }

    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        *self.last_synced_at.borrow()
    }

    pub fn connectivity(&self) -> Arc<dyn ConnectivityMonitor> {
        Arc::clone(&self.connectivity)
    }

    pub fn is_connected(&self) -> bool {
        self.connectivity.is_available_now()
    }

    /// Whether a reconnect will trigger an automatic refresh.
    pub fn needs_retry(&self) -> bool {
        self.needs_retry.load(Ordering::Acquire)
    }

    fn set_status(&self, next: SyncStatus) {
        let previous = self.status.send_replace(next.clone());
        if previous != next {
            info!("sync status {} -> {}", previous, next);
        }
    }

    fn fail(&self, status: SyncStatus) {
        self.needs_retry.store(true, Ordering::Release);
        self.set_status(status);
    }

    /// Runs one refresh cycle and returns the status it ended in.
    ///
    /// Calls made while a cycle is already running do not start a second
    /// fetch; they wait for the running cycle and return its outcome.
    pub async fn refresh(&self) -> SyncStatus {
        let acquired = self.in_flight.send_if_modified(|busy| {
            if *busy {
                false
            } else {
                *busy = true;
                true
            }
        });
        if !acquired {
            debug!("refresh already in flight, waiting for it");
            let mut in_flight = self.in_flight.subscribe();
            // The sender lives in `self`, so this only errors if we are torn down.
            let _ = in_flight.wait_for(|busy| !*busy).await;
            return self.status();
        }

        let mut guard = InFlight {
            engine: self,
            settled: false,
        };
        let outcome = self.run_refresh().await;
        guard.settled = true;
        outcome
    }

    async fn run_refresh(&self) -> SyncStatus {
        if !self.connectivity.is_available_now() {
            warn!("refresh skipped: device offline");
            self.fail(SyncStatus::DeviceOffline);
            return SyncStatus::DeviceOffline;
        }

        self.set_status(SyncStatus::Syncing);

        let courses = match self.fetcher.fetch_all().await {
            Ok(courses) => courses,
            Err(e) => {
                let status = network_error(&e);
                warn!("catalog fetch failed: {}", e);
                self.fail(status.clone());
                return status;
            }
        };

        if let Err(e) = self
            .store
            .upsert_preserving_local_fields(&courses)
            .await
            .map_err(MergeError::from)
        {
            let status = network_error(&e);
            warn!("catalog merge failed: {}", e);
            self.fail(status.clone());
            return status;
        }

        info!("refreshed {} courses", courses.len());
        self.needs_retry.store(false, Ordering::Release);
        self.last_synced_at.send_replace(Some(Utc::now()));
        self.set_status(SyncStatus::Success);
        SyncStatus::Success
    }

    /// Follows the connectivity signal for as long as the returned task runs.
    ///
    /// Losing connectivity forces `DeviceOffline` unless a cycle is running.
    /// An offline-to-online edge runs exactly one refresh if the last attempt
    /// failed; repeated "online" values are not edges.
    pub fn watch_connectivity(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let mut subscription = self.connectivity.observe();

        tokio::spawn(async move {
            let mut previous = None;
            while let Some(available) = subscription.recv().await {
                engine.on_connectivity(previous, available);
                previous = Some(available);
            }
            debug!("connectivity signal closed");
        })
    }

    fn on_connectivity(self: &Arc<Self>, previous: Option<bool>, available: bool) {
        if !available {
            let status = self.status();
            if status.is_syncing() {
                debug!("connectivity lost mid-sync, leaving status to the running cycle");
                return;
            }
            if status != SyncStatus::DeviceOffline {
                info!("connectivity lost");
                self.fail(SyncStatus::DeviceOffline);
            }
            return;
        }

        if previous != Some(false) {
            return;
        }
        if self.needs_retry.swap(false, Ordering::AcqRel) {
            info!("connectivity regained, retrying sync");
            let engine = Arc::clone(self);
            tokio::spawn(async move {
                engine.refresh().await;
            });
        }
    }
}

fn network_error(err: &dyn std::fmt::Display) -> SyncStatus {
    SyncStatus::NetworkError {
        message: describe(err, "Sync failed"),
    }
}

/// Releases the in-flight slot; a cycle dropped before finishing does not
/// leave the status stuck at `Syncing`.
struct InFlight<'a> {
    engine: &'a SyncEngine,
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled && self.engine.status.borrow().is_syncing() {
            self.engine.fail(SyncStatus::NetworkError {
                message: "refresh cancelled".to_string(),
            });
        }
        self.engine.in_flight.send_replace(false);
    }
}
