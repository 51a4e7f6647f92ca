//! # Workers
//!
//! A worker is an addressable unit with a unique name, an optional
//! description and an ordered handler table. The table is built once through
//! [`WorkerBuilder`]; entries keep the order in which the builder methods were
//! called.
//!
//! ## Handler selection
//!
//! For every incoming message the worker scans its table in declared order and
//! runs the **first** entry whose kind (and, for `ON_NOTIFY`, channel) matches
//! and whose predicate accepts the message. First match in declared order
//! wins; no handler, no effect. This applies to `ON_NOTIFY` exactly as to
//! `ON_CALL`: two notify entries on the same channel never both run for one
//! notification.
//!
//! ## State and concurrency
//!
//! Worker state lives in an `Arc<S>` handed to every body. The bus does not
//! serialize messages per worker, so bodies for different messages may run at
//! the same time against the same state. Use interior mutability
//! (`parking_lot::Mutex`, atomics) for anything a body mutates.
//!
//! ```rust,no_run
//! use courier::{MessageBus, Worker};
//! use serde_json::json;
//!
//! # async fn example() -> courier::BusResult<()> {
//! let bus = MessageBus::with_defaults();
//! bus.register(|| {
//!     Worker::builder("echo")
//!         .description("Replies with its input")
//!         .on_call("echo", |_, message, _| async move { Ok(message) })
//!         .build()
//! })?;
//! bus.start()?;
//! assert_eq!(bus.call("echo", json!("hi")).await?, json!("hi"));
//! bus.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod handler;

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, warn};

use crate::error::{BusError, BusResult};
use crate::messaging::{MessageContext, Payload};

pub use handler::{HandlerBody, HandlerEntry, HandlerFuture, ListenerKind, Predicate};

/// An addressable unit with an ordered handler table
#[derive(Debug)]
pub struct Worker {
    name: String,
    description: Option<String>,
    handlers: Vec<HandlerEntry>,
}

impl Worker {
    /// Start building a stateless worker.
    pub fn builder(name: impl Into<String>) -> WorkerBuilder<()> {
        WorkerBuilder::new(name.into(), ())
    }

    /// Start building a worker whose bodies share `state`.
    pub fn with_state<S>(name: impl Into<String>, state: S) -> WorkerBuilder<S>
    where
        S: Send + Sync + 'static,
    {
        WorkerBuilder::new(name.into(), state)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Handler table in declared order
    pub fn handlers(&self) -> &[HandlerEntry] {
        &self.handlers
    }

    /// Distinct channels named by `ON_NOTIFY` entries, in declared order.
    pub fn notify_channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = Vec::new();
        for channel in self
            .handlers
            .iter()
            .filter(|entry| entry.kind() == ListenerKind::OnNotify)
            .filter_map(HandlerEntry::channel)
        {
            if !channels.iter().any(|existing| existing == channel) {
                channels.push(channel.to_string());
            }
        }
        channels
    }

    /// First entry in declared order that accepts the message.
    pub fn select_handler(
        &self,
        kind: ListenerKind,
        channel: Option<&str>,
        payload: &Payload,
    ) -> Option<&HandlerEntry> {
        self.handlers
            .iter()
            .find(|entry| entry.matches(kind, channel, payload))
    }

    /// Run the selected handler for an incoming message.
    ///
    /// Returns `Ok(None)` when no entry matched, `Ok(Some(reply))` when one ran
    /// to completion, and [`BusError::HandlerFailure`] when the body (or its
    /// predicate) returned an error or panicked. At most one body runs per call.
    pub async fn dispatch(
        &self,
        kind: ListenerKind,
        payload: Payload,
        context: MessageContext,
        channel: Option<&str>,
    ) -> BusResult<Option<Payload>> {
        let selected = std::panic::catch_unwind(AssertUnwindSafe(|| {
            self.select_handler(kind, channel, &payload)
        }))
        .map_err(|panic| self.failure(format!("predicate panicked: {}", panic_message(&*panic))))?;

        let Some(entry) = selected else {
            debug!(
                worker = %self.name,
                listener = %kind,
                channel = channel.unwrap_or("-"),
                message_id = %context.message_id,
                "No handler matched message"
            );
            return Ok(None);
        };

        debug!(
            worker = %self.name,
            handler = %entry.name(),
            listener = %kind,
            message_id = %context.message_id,
            "Invoking handler"
        );

        match AssertUnwindSafe(entry.invoke(payload, context)).catch_unwind().await {
            Ok(Ok(reply)) => Ok(Some(reply)),
            Ok(Err(handler_error)) => {
                warn!(
                    worker = %self.name,
                    handler = %entry.name(),
                    error = %format!("{handler_error:#}"),
                    "Handler returned error"
                );
                Err(self.failure(format!("{}: {handler_error:#}", entry.name())))
            }
            Err(panic) => {
                let message = panic_message(&*panic);
                warn!(
                    worker = %self.name,
                    handler = %entry.name(),
                    panic = %message,
                    "Handler panicked"
                );
                Err(self.failure(format!("{} panicked: {message}", entry.name())))
            }
        }
    }

    fn failure(&self, reason: String) -> BusError {
        BusError::HandlerFailure {
            worker: self.name.clone(),
            reason,
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Builder for a [`Worker`] handler table.
///
/// Entries are appended in call order, which is the tie-break order used by
/// [`Worker::dispatch`]. Declaration errors are collected and reported by
/// [`WorkerBuilder::build`].
pub struct WorkerBuilder<S> {
    name: String,
    description: Option<String>,
    state: Arc<S>,
    handlers: Vec<HandlerEntry>,
    errors: Vec<String>,
}

impl<S> WorkerBuilder<S>
where
    S: Send + Sync + 'static,
{
    fn new(name: String, state: S) -> Self {
        let mut errors = Vec::new();
        if name.trim().is_empty() {
            errors.push("worker name cannot be empty".to_string());
        }
        Self {
            name,
            description: None,
            state: Arc::new(state),
            handlers: Vec::new(),
            errors,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Shared state handed to every body
    pub fn state(&self) -> &Arc<S> {
        &self.state
    }

    /// `ON_CALL` entry that accepts every request.
    pub fn on_call<F, Fut>(self, handler_name: impl Into<String>, body: F) -> Self
    where
        F: Fn(Arc<S>, Payload, MessageContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Payload>> + Send + 'static,
    {
        self.push(handler_name.into(), ListenerKind::OnCall, None, None, body)
    }

    /// `ON_CALL` entry guarded by `predicate`.
    pub fn on_call_when<P, F, Fut>(
        self,
        handler_name: impl Into<String>,
        predicate: P,
        body: F,
    ) -> Self
    where
        P: Fn(&Payload) -> bool + Send + Sync + 'static,
        F: Fn(Arc<S>, Payload, MessageContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Payload>> + Send + 'static,
    {
        self.push(
            handler_name.into(),
            ListenerKind::OnCall,
            None,
            Some(Arc::new(predicate)),
            body,
        )
    }

    /// `ON_NOTIFY` entry for `channel` that accepts every notification.
    pub fn on_notify<F, Fut>(
        self,
        handler_name: impl Into<String>,
        channel: impl Into<String>,
        body: F,
    ) -> Self
    where
        F: Fn(Arc<S>, Payload, MessageContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Payload>> + Send + 'static,
    {
        self.push(
            handler_name.into(),
            ListenerKind::OnNotify,
            Some(channel.into()),
            None,
            body,
        )
    }

    /// `ON_NOTIFY` entry for `channel` guarded by `predicate`.
    pub fn on_notify_when<P, F, Fut>(
        self,
        handler_name: impl Into<String>,
        channel: impl Into<String>,
        predicate: P,
        body: F,
    ) -> Self
    where
        P: Fn(&Payload) -> bool + Send + Sync + 'static,
        F: Fn(Arc<S>, Payload, MessageContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Payload>> + Send + 'static,
    {
        self.push(
            handler_name.into(),
            ListenerKind::OnNotify,
            Some(channel.into()),
            Some(Arc::new(predicate)),
            body,
        )
    }

    fn push<F, Fut>(
        mut self,
        handler_name: String,
        kind: ListenerKind,
        channel: Option<String>,
        predicate: Option<Predicate>,
        body: F,
    ) -> Self
    where
        F: Fn(Arc<S>, Payload, MessageContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Payload>> + Send + 'static,
    {
        if kind == ListenerKind::OnNotify
            && channel.as_deref().map_or(true, |c| c.trim().is_empty())
        {
            self.errors.push(format!(
                "handler '{handler_name}' listens ON_NOTIFY without a channel"
            ));
            return self;
        }

        let body = HandlerEntry::bind(Arc::clone(&self.state), body);
        self.handlers
            .push(HandlerEntry::new(handler_name, kind, channel, predicate, body));
        self
    }

    /// Finish the handler table.
    pub fn build(self) -> BusResult<Worker> {
        if !self.errors.is_empty() {
            return Err(BusError::InvalidHandler {
                worker: self.name,
                reason: self.errors.join("; "),
            });
        }

        Ok(Worker {
            name: self.name,
            description: self.description,
            handlers: self.handlers,
        })
    }
}
