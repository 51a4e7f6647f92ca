//! # In-Flight Work Tracking
//!
//! Idle drain must account for envelopes still queued **and** for handler
//! tasks already spawned from them. Every envelope is enqueued together with an
//! [`InFlightGuard`]; the dispatcher moves that guard into whatever task it
//! schedules for the envelope, so the count drops only once the work is done.
//!
//! A request task enqueues its `RESPONSE` (taking a fresh guard) before its own
//! guard is released, so the count cannot touch zero between a request and its
//! reply.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// Counter of outstanding work with an idle notification
#[derive(Debug, Default)]
pub struct InFlightTracker {
    outstanding: AtomicUsize,
    idle: Notify,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one unit of work; it completes when the guard is dropped.
    pub fn track(self: &Arc<Self>) -> InFlightGuard {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            tracker: Arc::clone(self),
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    pub fn is_idle(&self) -> bool {
        self.outstanding() == 0
    }

    /// Resolve once no work is outstanding.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            // Register interest before checking so a release between the
            // check and the await is not missed.
            notified.as_mut().enable();

            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    fn release(&self) {
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// One unit of outstanding work
#[derive(Debug)]
pub struct InFlightGuard {
    tracker: Arc<InFlightTracker>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.tracker.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_guards_count_outstanding_work() {
        let tracker = Arc::new(InFlightTracker::new());
        assert!(tracker.is_idle());

        let first = tracker.track();
        let second = tracker.track();
        assert_eq!(tracker.outstanding(), 2);

        drop(first);
        assert_eq!(tracker.outstanding(), 1);
        drop(second);
        assert!(tracker.is_idle());
    }

    #[tokio::test]
    async fn test_wait_idle_returns_immediately_when_idle() {
        let tracker = InFlightTracker::new();

        tokio::time::timeout(Duration::from_millis(100), tracker.wait_idle())
            .await
            .expect("idle tracker should not block");
    }

    #[tokio::test]
    async fn test_wait_idle_waits_for_last_guard() {
        let tracker = Arc::new(InFlightTracker::new());
        let guard = tracker.track();

        let waiter = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move { tracker.wait_idle().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake after release")
            .unwrap();
    }
}
