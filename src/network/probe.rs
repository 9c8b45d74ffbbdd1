use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{ConnectivityMonitor, ConnectivitySignal, ConnectivitySubscription};

#[derive(Clone, Debug)]
pub struct ProbeConfig {
    /// `host:port` that must accept a TCP connection for the network to count
    /// as available.
    pub target: String,
    pub interval: Duration,
    pub timeout: Duration,
}

/// Polls reachability of [`ProbeConfig::target`] and publishes every change.
///
/// A link that is up but cannot complete a connection to the target within
/// the timeout is reported as unavailable. The polling task stops when the
/// monitor is dropped.
pub struct ProbeMonitor {
    signal: Arc<ConnectivitySignal>,
    task: JoinHandle<()>,
}

impl ProbeMonitor {
    /// Probes once so the first answer is real, then keeps polling in the
    /// background.
    pub async fn start(config: ProbeConfig) -> Self {
        let initial = probe(&config).await;
        info!("connectivity probe {} initially {}", config.target, initial);

        let signal = ConnectivitySignal::new(initial);
        let task = tokio::spawn(run(config, Arc::clone(&signal)));
        Self { signal, task }
    }
}

impl Drop for ProbeMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl ConnectivityMonitor for ProbeMonitor {
    fn is_available_now(&self) -> bool {
        self.signal.current()
    }

    fn observe(&self) -> ConnectivitySubscription {
        self.signal.subscribe()
    }
}

async fn run(config: ProbeConfig, signal: Arc<ConnectivitySignal>) {
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick fires immediately and `start` has already probed.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        let available = probe(&config).await;
        if available != signal.current() {
            info!("connectivity changed: available={}", available);
            signal.publish(available);
        }
    }
}

async fn probe(config: &ProbeConfig) -> bool {
    match tokio::time::timeout(config.timeout, TcpStream::connect(config.target.as_str())).await {
        Ok(Ok(_)) => true,
        Ok(Err(e)) => {
            debug!("probe {} failed: {}", config.target, e);
            false
        }
        Err(_) => {
            debug!("probe {} timed out", config.target);
            false
        }
    }
}
