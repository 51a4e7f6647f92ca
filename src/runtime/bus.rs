//! # Message Bus Facade
//!
//! [`MessageBus`] owns the worker and channel registries, the unbounded FIFO
//! queue and the dispatcher task. [`BusHandle`] is the cloneable submission
//! surface used by external callers and by handlers that talk to other
//! workers.
//!
//! ## Lifecycle
//!
//! ```text
//! new ──► idle ──start()──► running ──stop()──► stopped
//!          │                   │
//!          └─ envelopes queue  └─ stop() drains: queued envelopes and
//!             until start()       running handler tasks finish first
//! ```
//!
//! A stopped bus does not restart; submissions on it fail with
//! [`BusError::ShutdownInProgress`].

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::dispatcher::{self, Dispatcher};
use super::stats::{AtomicStats, BusStats};
use super::tracker::{InFlightGuard, InFlightTracker};
use crate::config::BusConfig;
use crate::error::{BusError, BusResult};
use crate::logging::log_bus_operation;
use crate::messaging::{Envelope, Payload, PendingReply};
use crate::registry::{ChannelRegistry, WorkerRegistry};
use crate::worker::Worker;

/// An envelope on the queue together with its share of the in-flight count
#[derive(Debug)]
pub(crate) struct QueuedEnvelope {
    pub(crate) envelope: Envelope,
    pub(crate) guard: InFlightGuard,
}

/// State shared by the facade, every handle and the dispatcher
pub(crate) struct BusCore {
    pub(crate) config: BusConfig,
    pub(crate) workers: WorkerRegistry,
    pub(crate) channels: ChannelRegistry,
    pub(crate) tracker: Arc<InFlightTracker>,
    pub(crate) stats: AtomicStats,
    queue: mpsc::UnboundedSender<QueuedEnvelope>,
    closed: AtomicBool,
}

impl BusCore {
    /// Accept an externally submitted envelope.
    ///
    /// The guard is taken before the closed flag is read: a submission that
    /// still sees the bus open is already counted, so the final idle wait in
    /// `stop()` covers it.
    fn enqueue(&self, envelope: Envelope) -> BusResult<()> {
        let guard = self.tracker.track();
        if self.closed.load(Ordering::SeqCst) {
            drop(guard);
            return Err(BusError::ShutdownInProgress);
        }
        let queued = QueuedEnvelope { envelope, guard };
        self.queue
            .send(queued)
            .map_err(|_| BusError::ShutdownInProgress)?;
        AtomicStats::incr(&self.stats.envelopes_enqueued);
        Ok(())
    }

    /// Enqueue bus-generated traffic. Ignores the closed flag so work already
    /// in flight can finish during drain.
    pub(crate) fn push(&self, envelope: Envelope) {
        let queued = QueuedEnvelope {
            envelope,
            guard: self.tracker.track(),
        };
        match self.queue.send(queued) {
            Ok(()) => AtomicStats::incr(&self.stats.envelopes_enqueued),
            Err(mpsc::error::SendError(queued)) => {
                warn!(
                    envelope = %queued.envelope,
                    "Bus queue closed, delivering response directly"
                );
                dispatcher::deliver_unqueued(self, queued.envelope);
            }
        }
    }
}

enum Lifecycle {
    Idle {
        receiver: mpsc::UnboundedReceiver<QueuedEnvelope>,
    },
    Running {
        shutdown: oneshot::Sender<()>,
        join: JoinHandle<()>,
    },
    Stopped,
}

/// In-process actor message bus.
///
/// ```rust,no_run
/// use courier::{MessageBus, Worker};
/// use serde_json::json;
///
/// # async fn example() -> courier::BusResult<()> {
/// let bus = MessageBus::with_defaults();
/// bus.register(|| {
///     Worker::builder("logger")
///         .on_notify("log", "events", |_, event, _| async move {
///             tracing::info!(%event, "event received");
///             Ok(serde_json::Value::Null)
///         })
///         .build()
/// })?;
///
/// bus.start()?;
/// bus.publish("events", json!({"kind": "started"}))?;
/// bus.stop().await?;
/// # Ok(())
/// # }
/// ```
pub struct MessageBus {
    core: Arc<BusCore>,
    lifecycle: Mutex<Lifecycle>,
}

impl fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBus")
            .field("workers", &self.core.workers.len())
            .field("channels", &self.core.channels.channel_count())
            .field("in_flight", &self.core.tracker.outstanding())
            .field("is_running", &self.is_running())
            .finish()
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl MessageBus {
    /// Build a bus from a configuration, rejecting invalid settings.
    pub fn new(config: BusConfig) -> BusResult<Self> {
        config.validate()?;
        Ok(Self::from_validated(config))
    }

    pub fn with_defaults() -> Self {
        Self::from_validated(BusConfig::default())
    }

    fn from_validated(config: BusConfig) -> Self {
        let (queue, receiver) = mpsc::unbounded_channel();
        let core = Arc::new(BusCore {
            config,
            workers: WorkerRegistry::new(),
            channels: ChannelRegistry::new(),
            tracker: Arc::new(InFlightTracker::new()),
            stats: AtomicStats::default(),
            queue,
            closed: AtomicBool::new(false),
        });

        Self {
            core,
            lifecycle: Mutex::new(Lifecycle::Idle { receiver }),
        }
    }

    pub fn config(&self) -> &BusConfig {
        &self.core.config
    }

    /// Build a worker with `factory`, register it by name and subscribe it to
    /// every channel its `ON_NOTIFY` entries name.
    ///
    /// The factory runs exactly once. A duplicate name leaves both registries
    /// untouched and returns [`BusError::DuplicateWorker`].
    pub fn register<F>(&self, factory: F) -> BusResult<Arc<Worker>>
    where
        F: FnOnce() -> BusResult<Worker>,
    {
        let worker = factory()?;
        let channels = worker.notify_channels();
        let worker = self.core.workers.register(worker)?;
        let subscribed = self.core.channels.subscribe(worker.name(), &channels);

        let details = format!(
            "{} handlers, {subscribed} channels",
            worker.handlers().len()
        );
        log_bus_operation("register", worker.name(), "success", Some(details.as_str()));
        Ok(worker)
    }

    /// Anonymous submission handle.
    pub fn handle(&self) -> BusHandle {
        BusHandle {
            core: Arc::clone(&self.core),
            sender: None,
        }
    }

    /// Handle whose envelopes name `worker` as their sender.
    pub fn handle_for(&self, worker: impl Into<String>) -> BusHandle {
        BusHandle {
            core: Arc::clone(&self.core),
            sender: Some(worker.into()),
        }
    }

    /// Send a request to `worker` and wait for its reply.
    pub async fn call(&self, worker: &str, payload: Payload) -> BusResult<Payload> {
        self.handle().call(worker, payload).await
    }

    /// Send a request to `worker` without waiting for the reply.
    pub fn send_request(&self, worker: &str, payload: Payload) -> BusResult<PendingReply> {
        self.handle().send_request(worker, payload)
    }

    /// Publish a notification on `channel`.
    pub fn publish(&self, channel: &str, payload: Payload) -> BusResult<()> {
        self.handle().publish(channel, payload)
    }

    /// Spawn the dispatcher on the current tokio runtime.
    pub fn start(&self) -> BusResult<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| BusError::RuntimeUnavailable(e.to_string()))?;

        let mut lifecycle = self.lifecycle.lock();
        let receiver = match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Idle { receiver } => receiver,
            running @ Lifecycle::Running { .. } => {
                *lifecycle = running;
                return Err(BusError::AlreadyRunning);
            }
            Lifecycle::Stopped => return Err(BusError::ShutdownInProgress),
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let dispatcher = Dispatcher::new(Arc::clone(&self.core), receiver, shutdown_rx);
        let join = runtime.spawn(dispatcher.run());
        *lifecycle = Lifecycle::Running {
            shutdown: shutdown_tx,
            join,
        };
        drop(lifecycle);

        let details = format!(
            "{} workers, {} queued",
            self.core.workers.len(),
            self.core.tracker.outstanding()
        );
        log_bus_operation("start", "message_bus", "success", Some(details.as_str()));
        Ok(())
    }

    /// Drain and stop the bus.
    ///
    /// Waits until every queued envelope has been routed and every handler
    /// task spawned from one has finished, then stops the dispatcher and
    /// joins it. With `drain_timeout_ms` configured an overdue drain stops the
    /// dispatcher anyway and returns [`BusError::Timeout`].
    pub async fn stop(&self) -> BusResult<()> {
        if !self.is_running() {
            return Err(BusError::NotRunning);
        }

        info!(
            in_flight = self.core.tracker.outstanding(),
            "Draining message bus"
        );
        let drained = self.drain().await;

        let (shutdown, join) = match std::mem::replace(&mut *self.lifecycle.lock(), Lifecycle::Stopped)
        {
            Lifecycle::Running { shutdown, join } => (shutdown, join),
            // A concurrent stop() already took the dispatcher.
            _ => return Err(BusError::NotRunning),
        };

        // The dispatcher may already be gone; nothing to signal then.
        let _ = shutdown.send(());
        if let Err(join_error) = join.await {
            warn!(error = %join_error, "Dispatcher task did not exit cleanly");
        }

        match &drained {
            Ok(()) => log_bus_operation("stop", "message_bus", "success", None),
            Err(error) => {
                let details = error.to_string();
                log_bus_operation("stop", "message_bus", "timeout", Some(details.as_str()));
            }
        }
        drained
    }

    async fn drain(&self) -> BusResult<()> {
        let wait = async {
            self.core.tracker.wait_idle().await;
            // Reject new submissions, then absorb anything accepted between
            // the first idle point and the close.
            self.core.closed.store(true, Ordering::SeqCst);
            self.core.tracker.wait_idle().await;
        };

        match self.core.config.drain_timeout() {
            Some(timeout) => tokio::time::timeout(timeout, wait).await.map_err(|_| {
                self.core.closed.store(true, Ordering::SeqCst);
                BusError::Timeout {
                    operation: "drain".to_string(),
                    timeout,
                }
            }),
            None => {
                wait.await;
                Ok(())
            }
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.lifecycle.lock(), Lifecycle::Running { .. })
    }

    /// Registered worker by name.
    pub fn worker(&self, name: &str) -> BusResult<Arc<Worker>> {
        self.core.workers.get(name)
    }

    pub fn worker_names(&self) -> Vec<String> {
        self.core.workers.names()
    }

    /// Subscribers of `channel` in subscription order.
    pub fn subscribers(&self, channel: &str) -> BusResult<Vec<String>> {
        self.core.channels.resolve(channel)
    }

    pub fn stats(&self) -> BusStats {
        self.core.stats.snapshot(self.core.tracker.outstanding())
    }
}

/// Cloneable surface for sending requests and publishing notifications.
///
/// Handles keep the bus state alive but not the dispatcher; once the owning
/// [`MessageBus`] is stopped every submission fails with
/// [`BusError::ShutdownInProgress`].
#[derive(Clone)]
pub struct BusHandle {
    core: Arc<BusCore>,
    sender: Option<String>,
}

impl fmt::Debug for BusHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusHandle")
            .field("sender", &self.sender)
            .field("closed", &self.core.closed.load(Ordering::SeqCst))
            .finish()
    }
}

impl BusHandle {
    /// Sender identity stamped on outgoing envelopes
    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    /// Enqueue a `REQUEST` and return the pending reply without waiting.
    pub fn send_request(&self, worker: &str, payload: Payload) -> BusResult<PendingReply> {
        let (envelope, pending) = Envelope::request(worker, payload, self.sender.clone());
        debug!(
            worker = %worker,
            message_id = %envelope.message_id(),
            "Enqueueing request"
        );
        self.core.enqueue(envelope)?;
        Ok(pending)
    }

    /// Enqueue a `REQUEST` and wait for its reply, honouring
    /// `call_timeout_ms` when configured.
    pub async fn call(&self, worker: &str, payload: Payload) -> BusResult<Payload> {
        let pending = self.send_request(worker, payload)?;
        match self.core.config.call_timeout() {
            Some(timeout) => pending.with_timeout(timeout).await,
            None => pending.await,
        }
    }

    /// Enqueue a `NOTIFICATION`. Succeeds once queued, whether or not the
    /// channel has subscribers.
    pub fn publish(&self, channel: &str, payload: Payload) -> BusResult<()> {
        let envelope = Envelope::notification(channel, payload, self.sender.clone());
        debug!(
            channel = %channel,
            message_id = %envelope.message_id(),
            "Enqueueing notification"
        );
        self.core.enqueue(envelope)
    }
}
