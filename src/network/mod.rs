//! Connectivity observation.
//!
//! A [`ConnectivityMonitor`] answers "can we reach the catalog right now?"
//! both as a point-in-time query and as a live signal. Every call to
//! [`ConnectivityMonitor::observe`] creates an independent subscription that
//! starts with the current value and then receives every published change;
//! dropping the subscription unregisters it.

mod probe;

pub use probe::{ProbeConfig, ProbeMonitor};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::broadcast;
use tracing::debug;

const EVENT_CAPACITY: usize = 32;

pub trait ConnectivityMonitor: Send + Sync {
    /// True only when the network path is up and has been validated to reach
    /// the remote side.
    fn is_available_now(&self) -> bool;

    fn observe(&self) -> ConnectivitySubscription;
}

/// Current availability plus fan-out of every change to all subscribers.
pub struct ConnectivitySignal {
    current: AtomicBool,
    events: broadcast::Sender<bool>,
}

impl ConnectivitySignal {
    pub fn new(initial: bool) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            current: AtomicBool::new(initial),
            events,
        })
    }

    pub fn current(&self) -> bool {
        self.current.load(Ordering::Acquire)
    }

    /// Records `available` and delivers it to every live subscription.
    /// Repeated identical values are delivered as well.
    pub fn publish(&self, available: bool) {
        self.current.store(available, Ordering::Release);
        // No receivers is fine; nobody is observing.
        let _ = self.events.send(available);
    }

    pub fn subscribe(self: &Arc<Self>) -> ConnectivitySubscription {
        // Register before reading the current value so no change is missed
        // between the two.
        let events = self.events.subscribe();
        ConnectivitySubscription {
            initial: Some(self.current()),
            events,
            signal: Arc::clone(self),
        }
    }
}

pub struct ConnectivitySubscription {
    initial: Option<bool>,
    events: broadcast::Receiver<bool>,
    signal: Arc<ConnectivitySignal>,
}

impl ConnectivitySubscription {
    /// Next availability value. The first call resolves immediately with the
    /// value current at subscription time. Returns `None` once the source is
    /// gone. Cancel safe.
    pub async fn recv(&mut self) -> Option<bool> {
        if let Some(initial) = self.initial.take() {
            return Some(initial);
        }
        match self.events.recv().await {
            Ok(available) => Some(available),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("connectivity subscriber lagged by {}, resyncing", skipped);
                Some(self.signal.current())
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

/// Availability pushed in from outside, e.g. by a platform network callback.
pub struct ManualMonitor {
    signal: Arc<ConnectivitySignal>,
}

impl ManualMonitor {
    pub fn new(initial: bool) -> Self {
        Self {
            signal: ConnectivitySignal::new(initial),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.signal.publish(available);
    }
}

impl ConnectivityMonitor for ManualMonitor {
    fn is_available_now(&self) -> bool {
        self.signal.current()
    }

    fn observe(&self) -> ConnectivitySubscription {
        self.signal.subscribe()
    }
}
