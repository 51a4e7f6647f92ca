#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Courier
//!
//! In-process asynchronous actor message bus.
//!
//! ## Overview
//!
//! Independently written collaborators ("workers") register under unique names
//! and talk to each other through one shared bus instead of holding direct
//! references. Two interaction styles are supported:
//!
//! - **Request/reply**: `call(worker, payload)` delivers a `REQUEST` and
//!   resolves with exactly one reply or error.
//! - **Publish/subscribe**: `publish(channel, payload)` fans a `NOTIFICATION`
//!   out to every worker subscribed to the channel; no reply is collected.
//!
//! ## Architecture
//!
//! All envelopes pass through a single unbounded FIFO queue drained by one
//! dispatcher task. Dequeue order is strict FIFO; handler work runs in spawned
//! tasks so slow handlers never block routing.
//!
//! Each worker declares an ordered handler table. For every message the
//! **first** entry in declared order whose kind, channel and predicate match
//! runs; if none match, nothing runs.
//!
//! ## Module Organization
//!
//! - [`messaging`] - Envelopes, message kinds and completion handles
//! - [`worker`] - Workers and their handler tables
//! - [`registry`] - Worker and channel registries
//! - [`runtime`] - Bus facade, dispatcher and in-flight tracking
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Tracing initialisation and structured log helpers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use courier::{MessageBus, Worker};
//! use serde_json::json;
//!
//! # async fn example() -> courier::BusResult<()> {
//! courier::logging::init_tracing();
//!
//! let bus = MessageBus::with_defaults();
//! bus.register(|| {
//!     Worker::builder("echo")
//!         .on_call("echo", |_, message, _| async move { Ok(message) })
//!         .build()
//! })?;
//!
//! bus.start()?;
//! let reply = bus.call("echo", json!({"hello": "world"})).await?;
//! assert_eq!(reply, json!({"hello": "world"}));
//! bus.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod messaging;
pub mod registry;
pub mod runtime;
pub mod worker;

pub use config::BusConfig;
pub use error::{BusError, BusResult};
pub use messaging::{Envelope, MessageContext, MessageKind, Payload, PendingReply};
pub use runtime::{BusHandle, BusStats, MessageBus};
pub use worker::{ListenerKind, Worker, WorkerBuilder};
