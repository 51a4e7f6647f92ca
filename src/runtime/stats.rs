//! Bus statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic statistics for thread-safe updates
#[derive(Debug, Default)]
pub(crate) struct AtomicStats {
    pub(crate) envelopes_enqueued: AtomicU64,
    pub(crate) requests_routed: AtomicU64,
    pub(crate) notifications_routed: AtomicU64,
    pub(crate) responses_delivered: AtomicU64,
    pub(crate) responses_abandoned: AtomicU64,
    pub(crate) worker_not_found: AtomicU64,
    pub(crate) channel_not_found: AtomicU64,
    pub(crate) no_matching_handler: AtomicU64,
    pub(crate) handler_failures: AtomicU64,
    pub(crate) notification_deliveries: AtomicU64,
}

impl AtomicStats {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn snapshot(&self, in_flight: usize) -> BusStats {
        BusStats {
            envelopes_enqueued: self.envelopes_enqueued.load(Ordering::SeqCst),
            requests_routed: self.requests_routed.load(Ordering::SeqCst),
            notifications_routed: self.notifications_routed.load(Ordering::SeqCst),
            responses_delivered: self.responses_delivered.load(Ordering::SeqCst),
            responses_abandoned: self.responses_abandoned.load(Ordering::SeqCst),
            worker_not_found: self.worker_not_found.load(Ordering::SeqCst),
            channel_not_found: self.channel_not_found.load(Ordering::SeqCst),
            no_matching_handler: self.no_matching_handler.load(Ordering::SeqCst),
            handler_failures: self.handler_failures.load(Ordering::SeqCst),
            notification_deliveries: self.notification_deliveries.load(Ordering::SeqCst),
            in_flight,
        }
    }
}

/// Point-in-time snapshot of bus counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BusStats {
    /// Envelopes accepted onto the queue, responses included
    pub envelopes_enqueued: u64,
    pub requests_routed: u64,
    pub notifications_routed: u64,
    /// Responses whose caller was still waiting
    pub responses_delivered: u64,
    /// Responses whose caller had already gone away
    pub responses_abandoned: u64,
    pub worker_not_found: u64,
    pub channel_not_found: u64,
    pub no_matching_handler: u64,
    /// Handler bodies that returned an error or panicked
    pub handler_failures: u64,
    /// Subscriber handler runs that completed successfully
    pub notification_deliveries: u64,
    /// Queued envelopes plus running handler tasks
    pub in_flight: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reads_counters() {
        let stats = AtomicStats::default();
        AtomicStats::incr(&stats.requests_routed);
        AtomicStats::incr(&stats.requests_routed);
        AtomicStats::incr(&stats.channel_not_found);

        let snapshot = stats.snapshot(3);
        assert_eq!(snapshot.requests_routed, 2);
        assert_eq!(snapshot.channel_not_found, 1);
        assert_eq!(snapshot.handler_failures, 0);
        assert_eq!(snapshot.in_flight, 3);
    }
}
