mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use common::{ScriptedFetcher, course, harness, sample_catalog, wait_until};
use course_catalog::models::SyncStatus;

async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn starts_idle() {
    let h = harness(ScriptedFetcher::new(sample_catalog()), true).await;
    assert_eq!(h.engine.status(), SyncStatus::Idle);
    assert_eq!(h.engine.last_synced_at(), None);
    assert!(!h.engine.needs_retry());
}

#[tokio::test]
async fn offline_refresh_reports_device_offline_without_fetching() {
    let h = harness(ScriptedFetcher::new(sample_catalog()), false).await;
    h.store.put(&course("LOCAL-1", "Cached", &[])).await.unwrap();

    let status = h.engine.refresh().await;

    assert_eq!(status, SyncStatus::DeviceOffline);
    assert_eq!(h.engine.status(), SyncStatus::DeviceOffline);
    assert_eq!(h.fetcher.calls(), 0);
    assert!(h.engine.needs_retry());
    assert_eq!(h.store.fetch_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn successful_refresh_merges_and_keeps_enrollment() {
    let h = harness(ScriptedFetcher::new(sample_catalog()), true).await;
    let mut enrolled = course("SWIFT-001", "Outdated title", &[]);
    enrolled.is_enrolled = true;
    h.store.put(&enrolled).await.unwrap();

    let status = h.engine.refresh().await;

    assert_eq!(status, SyncStatus::Success);
    assert_eq!(h.fetcher.calls(), 1);
    assert!(h.engine.last_synced_at().is_some());
    assert!(!h.engine.needs_retry());

    let courses = h.store.fetch_all().await.unwrap();
    assert_eq!(courses.len(), 3);
    let swift = courses.iter().find(|c| c.course_id == "SWIFT-001").unwrap();
    assert!(swift.is_enrolled);
    assert_eq!(swift.title, "iOS Development with SwiftUI");
    assert!(
        courses
            .iter()
            .filter(|c| c.course_id != "SWIFT-001")
            .all(|c| !c.is_enrolled)
    );
}

#[tokio::test]
async fn fetch_failure_becomes_network_error() {
    let fetcher = ScriptedFetcher::new(sample_catalog());
    fetcher.push_err("Network error");
    let h = harness(fetcher, true).await;

    let status = h.engine.refresh().await;

    assert_eq!(
        status,
        SyncStatus::NetworkError {
            message: "Network error".to_string()
        }
    );
    assert_eq!(h.engine.status(), status);
    assert!(h.engine.needs_retry());
    assert_eq!(h.engine.last_synced_at(), None);
    assert!(h.store.fetch_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn blank_failure_message_falls_back() {
    let fetcher = ScriptedFetcher::new(sample_catalog());
    fetcher.push_err("");
    let h = harness(fetcher, true).await;

    assert_eq!(
        h.engine.refresh().await,
        SyncStatus::NetworkError {
            message: "Sync failed".to_string()
        }
    );
}

#[tokio::test]
async fn merge_failure_becomes_network_error() {
    let h = harness(ScriptedFetcher::new(sample_catalog()), true).await;
    h.store.pool().close().await;

    let status = h.engine.refresh().await;

    match status {
        SyncStatus::NetworkError { message } => assert!(message.starts_with("Database error")),
        other => panic!("expected NetworkError, got {other:?}"),
    }
    assert_eq!(h.fetcher.calls(), 1);
    assert_eq!(h.engine.last_synced_at(), None);
}

#[tokio::test]
async fn a_later_refresh_recovers_from_failure() {
    let fetcher = ScriptedFetcher::new(sample_catalog());
    fetcher.push_err("Network error");
    let h = harness(fetcher, true).await;

    assert!(h.engine.refresh().await.is_failure());
    assert_eq!(h.engine.refresh().await, SyncStatus::Success);
    assert!(!h.engine.needs_retry());
}

#[tokio::test]
async fn empty_snapshot_succeeds_and_keeps_local_rows() {
    let h = harness(ScriptedFetcher::new(Vec::new()), true).await;
    h.store.put_many(&sample_catalog()).await.unwrap();

    assert_eq!(h.engine.refresh().await, SyncStatus::Success);
    assert_eq!(h.store.fetch_all().await.unwrap().len(), 3);
}

#[tokio::test]
async fn losing_connectivity_while_idle_reports_offline() {
    let h = harness(ScriptedFetcher::new(sample_catalog()), true).await;
    let _watch = h.engine.watch_connectivity();
    let mut status = h.engine.subscribe_status();

    h.monitor.set_available(false);

    wait_until(&mut status, |s| *s == SyncStatus::DeviceOffline).await;
    assert!(h.engine.needs_retry());
}

#[tokio::test]
async fn reconnect_after_failure_retries_exactly_once() {
    let fetcher = ScriptedFetcher::new(sample_catalog());
    fetcher.push_err("Network error");
    let h = harness(fetcher, true).await;
    assert!(h.engine.refresh().await.is_failure());

    let _watch = h.engine.watch_connectivity();
    let mut status = h.engine.subscribe_status();

    h.monitor.set_available(false);
    wait_until(&mut status, |s| *s == SyncStatus::DeviceOffline).await;

    h.monitor.set_available(true);
    wait_until(&mut status, |s| *s == SyncStatus::Success).await;
    assert_eq!(h.fetcher.calls(), 2);

    // Another "available" without an outage in between is not an edge.
    h.monitor.set_available(true);
    settle().await;
    assert_eq!(h.fetcher.calls(), 2);
}

#[tokio::test]
async fn initial_online_value_does_not_trigger_retry() {
    let fetcher = ScriptedFetcher::new(sample_catalog());
    fetcher.push_err("Network error");
    let h = harness(fetcher, true).await;
    assert!(h.engine.refresh().await.is_failure());

    let _watch = h.engine.watch_connectivity();
    settle().await;

    assert_eq!(h.fetcher.calls(), 1);
    assert!(h.engine.status().is_failure());
}

#[tokio::test]
async fn coming_online_after_offline_refresh_syncs() {
    let h = harness(ScriptedFetcher::new(sample_catalog()), false).await;
    let _watch = h.engine.watch_connectivity();
    let mut status = h.engine.subscribe_status();

    // Offline at start; the first refresh fails without fetching.
    assert_eq!(h.engine.refresh().await, SyncStatus::DeviceOffline);

    h.monitor.set_available(true);
    wait_until(&mut status, |s| *s == SyncStatus::Success).await;
    assert_eq!(h.fetcher.calls(), 1);
}

#[tokio::test]
async fn losing_connectivity_mid_sync_keeps_syncing() {
    let gate = Arc::new(Semaphore::new(0));
    let h = harness(ScriptedFetcher::gated(sample_catalog(), gate.clone()), true).await;
    let mut status = h.engine.subscribe_status();

    let engine = h.engine.clone();
    let running = tokio::spawn(async move { engine.refresh().await });
    wait_until(&mut status, |s| s.is_syncing()).await;

    let _watch = h.engine.watch_connectivity();
    h.monitor.set_available(false);
    settle().await;
    assert_eq!(h.engine.status(), SyncStatus::Syncing);

    gate.add_permits(1);
    assert_eq!(running.await.unwrap(), SyncStatus::Success);
    assert_eq!(h.engine.status(), SyncStatus::Success);
}

#[tokio::test]
async fn concurrent_refreshes_share_one_fetch() {
    let gate = Arc::new(Semaphore::new(0));
    let h = harness(ScriptedFetcher::gated(sample_catalog(), gate.clone()), true).await;
    let mut status = h.engine.subscribe_status();

    let engine = h.engine.clone();
    let first = tokio::spawn(async move { engine.refresh().await });
    wait_until(&mut status, |s| s.is_syncing()).await;

    let engine = h.engine.clone();
    let second = tokio::spawn(async move { engine.refresh().await });
    settle().await;

    gate.add_permits(1);
    assert_eq!(first.await.unwrap(), SyncStatus::Success);
    assert_eq!(second.await.unwrap(), SyncStatus::Success);
    assert_eq!(h.fetcher.calls(), 1);
}

#[tokio::test]
async fn cancelled_refresh_does_not_stay_syncing() {
    let gate = Arc::new(Semaphore::new(0));
    let h = harness(ScriptedFetcher::gated(sample_catalog(), gate.clone()), true).await;
    let mut status = h.engine.subscribe_status();

    let engine = h.engine.clone();
    let running = tokio::spawn(async move { engine.refresh().await });
    wait_until(&mut status, |s| s.is_syncing()).await;

    running.abort();
    assert!(running.await.unwrap_err().is_cancelled());

    assert_eq!(
        h.engine.status(),
        SyncStatus::NetworkError {
            message: "refresh cancelled".to_string()
        }
    );
    assert!(h.engine.needs_retry());

    gate.add_permits(1);
    assert_eq!(h.engine.refresh().await, SyncStatus::Success);
}
