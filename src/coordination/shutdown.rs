//! Stop handling
//!
//! A stop request is only observed at the top of the next poll cycle. Orders
//! already submitted are never cancelled; the loop just stops issuing new ones.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{info, warn};

/// Why the engine was asked to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// SIGTERM / SIGINT / Ctrl+C
    Interrupt,
    /// Requested from code (tests, embedding applications)
    Requested,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownSignal::Interrupt => write!(f, "interrupt"),
            ShutdownSignal::Requested => write!(f, "requested"),
        }
    }
}

#[derive(Debug, Default)]
struct StopInner {
    requested: AtomicBool,
    notify: Notify,
}

/// Cloneable stop flag shared between the signal handlers and the poll loop
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    inner: Arc<StopInner>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_stop_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Request a stop. Returns false if one was already pending.
    pub fn request_stop(&self, signal: ShutdownSignal) -> bool {
        if self.inner.requested.swap(true, Ordering::SeqCst) {
            warn!("Stop already requested, ignoring duplicate signal: {}", signal);
            return false;
        }

        info!("Stop requested: {}", signal);
        self.inner.notify.notify_waiters();
        true
    }

    /// Resolve once a stop has been requested
    pub async fn stopped(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_stop_requested() {
                return;
            }
            notified.await;
        }
    }
}

/// Route SIGINT / SIGTERM to the stop handle
pub fn install_signal_handlers(stop: StopHandle) {
    let ctrl_c = stop.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C");
                ctrl_c.request_stop(ShutdownSignal::Interrupt);
            }
            Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("Received SIGTERM");
                    stop.request_stop(ShutdownSignal::Interrupt);
                }
                Err(e) => warn!("Failed to install SIGTERM handler: {}", e),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_duplicate_request_is_ignored() {
        let stop = StopHandle::new();
        assert!(!stop.is_stop_requested());
        assert!(stop.request_stop(ShutdownSignal::Requested));
        assert!(!stop.request_stop(ShutdownSignal::Interrupt));
        assert!(stop.is_stop_requested());
    }

    #[tokio::test]
    async fn test_stopped_wakes_waiter() {
        let stop = StopHandle::new();
        let waiter = stop.clone();
        let task = tokio::spawn(async move { waiter.stopped().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        stop.request_stop(ShutdownSignal::Requested);

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_stopped_returns_immediately_when_already_requested() {
        let stop = StopHandle::new();
        stop.request_stop(ShutdownSignal::Requested);
        tokio::time::timeout(Duration::from_millis(100), stop.stopped())
            .await
            .unwrap();
    }
}
