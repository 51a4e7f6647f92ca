//! # Message Dispatcher
//!
//! Single consumer of the bus queue. Envelopes are taken strictly in FIFO
//! order and routed by kind:
//!
//! - `REQUEST` spawns a task that runs the recipient's first matching
//!   `ON_CALL` handler and enqueues exactly one `RESPONSE`.
//! - `NOTIFICATION` spawns a task that runs every subscriber's first matching
//!   `ON_NOTIFY` handler concurrently and waits for all of them.
//! - `RESPONSE` fulfils the pending completion handle inline.
//!
//! Only the dequeue is serialized. Handler work never runs on the dispatch
//! loop, so a slow handler cannot hold up unrelated envelopes.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, warn};

use super::bus::{BusCore, QueuedEnvelope};
use super::stats::AtomicStats;
use super::tracker::InFlightGuard;
use crate::error::BusError;
use crate::messaging::{CompletionHandle, Envelope, EnvelopeBody, MessageContext, MessageKind, Payload, Reply};
use crate::worker::ListenerKind;

/// The dispatch loop; spawned by [`MessageBus::start`](super::MessageBus::start).
pub(crate) struct Dispatcher {
    core: Arc<BusCore>,
    receiver: mpsc::UnboundedReceiver<QueuedEnvelope>,
    shutdown: oneshot::Receiver<()>,
}

impl Dispatcher {
    pub(crate) fn new(
        core: Arc<BusCore>,
        receiver: mpsc::UnboundedReceiver<QueuedEnvelope>,
        shutdown: oneshot::Receiver<()>,
    ) -> Self {
        Self {
            core,
            receiver,
            shutdown,
        }
    }

    /// Run until the shutdown signal fires or every sender is gone.
    #[instrument(skip(self), name = "message_dispatcher_loop")]
    pub(crate) async fn run(mut self) {
        info!("Starting message dispatcher loop");

        loop {
            tokio::select! {
                biased;

                queued = self.receiver.recv() => match queued {
                    Some(queued) => self.route(queued),
                    None => {
                        debug!("Bus queue closed");
                        break;
                    }
                },
                _ = &mut self.shutdown => {
                    debug!("Dispatcher shutdown signal received");
                    break;
                }
            }
        }

        info!("Message dispatcher loop stopped");
    }

    fn route(&self, queued: QueuedEnvelope) {
        let QueuedEnvelope { envelope, guard } = queued;

        if self.core.config.log_envelopes {
            debug!(envelope = %envelope, "Dispatching envelope");
        }

        let Envelope {
            recipient,
            context,
            body,
        } = envelope;

        match body {
            EnvelopeBody::Request { payload, reply } => {
                AtomicStats::incr(&self.core.stats.requests_routed);
                let core = Arc::clone(&self.core);
                tokio::spawn(handle_request(
                    core,
                    recipient.unwrap_or_default(),
                    payload,
                    context,
                    reply,
                    guard,
                ));
            }
            EnvelopeBody::Notification { payload } => {
                AtomicStats::incr(&self.core.stats.notifications_routed);
                let core = Arc::clone(&self.core);
                tokio::spawn(handle_notification(
                    core,
                    recipient.unwrap_or_default(),
                    payload,
                    context,
                    guard,
                ));
            }
            EnvelopeBody::Response { outcome, reply } => {
                deliver_response(&self.core, reply, outcome);
                drop(guard);
            }
        }
    }
}

/// Run the recipient's `ON_CALL` handler and answer with one `RESPONSE`.
///
/// The response is enqueued before `_guard` is released so the in-flight
/// count never reaches zero between a request and its reply.
async fn handle_request(
    core: Arc<BusCore>,
    worker_name: String,
    payload: Payload,
    context: MessageContext,
    reply: CompletionHandle,
    _guard: InFlightGuard,
) {
    let caller = context.sender.clone();
    let message_id = context.message_id;

    let outcome = match core.workers.get(&worker_name) {
        Ok(worker) => match worker
            .dispatch(ListenerKind::OnCall, payload, context, None)
            .await
        {
            Ok(Some(result)) => Ok(result),
            Ok(None) => {
                AtomicStats::incr(&core.stats.no_matching_handler);
                warn!(
                    worker = %worker_name,
                    message_id = %message_id,
                    "No ON_CALL handler matched request"
                );
                Err(BusError::NoMatchingHandler {
                    worker: worker_name.clone(),
                    kind: MessageKind::Request,
                })
            }
            Err(error) => {
                AtomicStats::incr(&core.stats.handler_failures);
                Err(error)
            }
        },
        Err(error) => {
            AtomicStats::incr(&core.stats.worker_not_found);
            warn!(
                worker = %worker_name,
                message_id = %message_id,
                "Request addressed to unknown worker"
            );
            Err(error)
        }
    };

    let response = Envelope::response(caller, Some(worker_name), outcome, reply);
    core.push(response);
}

/// Fan a notification out to every subscriber of `channel`.
async fn handle_notification(
    core: Arc<BusCore>,
    channel: String,
    payload: Payload,
    context: MessageContext,
    _guard: InFlightGuard,
) {
    let subscribers = match core.channels.resolve(&channel) {
        Ok(subscribers) => subscribers,
        Err(error) => {
            AtomicStats::incr(&core.stats.channel_not_found);
            warn!(
                channel = %channel,
                message_id = %context.message_id,
                error = %error,
                "Notification published to channel without subscribers"
            );
            return;
        }
    };

    let deliveries = subscribers.into_iter().map(|worker_name| {
        let core = Arc::clone(&core);
        let payload = payload.clone();
        let context = context.clone();
        let channel = channel.as_str();
        async move {
            let worker = match core.workers.get(&worker_name) {
                Ok(worker) => worker,
                Err(error) => {
                    AtomicStats::incr(&core.stats.worker_not_found);
                    warn!(channel = %channel, error = %error, "Subscriber is not registered");
                    return;
                }
            };

            match worker
                .dispatch(ListenerKind::OnNotify, payload, context, Some(channel))
                .await
            {
                Ok(Some(_)) => AtomicStats::incr(&core.stats.notification_deliveries),
                Ok(None) => {
                    AtomicStats::incr(&core.stats.no_matching_handler);
                    debug!(
                        worker = %worker_name,
                        channel = %channel,
                        "No ON_NOTIFY handler matched notification"
                    );
                }
                Err(error) => {
                    AtomicStats::incr(&core.stats.handler_failures);
                    warn!(
                        worker = %worker_name,
                        channel = %channel,
                        error = %error,
                        "Notification handler failed"
                    );
                }
            }
        }
    });

    join_all(deliveries).await;
}

fn deliver_response(core: &BusCore, reply: CompletionHandle, outcome: Reply) {
    let request_id = reply.request_id();
    if reply.fulfil(outcome) {
        AtomicStats::incr(&core.stats.responses_delivered);
    } else {
        AtomicStats::incr(&core.stats.responses_abandoned);
        debug!(request_id = %request_id, "Caller stopped waiting before response arrived");
    }
}

/// Resolve a response directly when the queue can no longer carry it.
pub(crate) fn deliver_unqueued(core: &BusCore, envelope: Envelope) {
    if let EnvelopeBody::Response { outcome, reply } = envelope.body {
        deliver_response(core, reply, outcome);
    }
}
