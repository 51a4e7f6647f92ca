//! # Messaging Module
//!
//! Envelope types that flow through the bus and the single-fulfilment
//! completion handle used to correlate a `REQUEST` with its `RESPONSE`.
//!
//! The payload carried by an envelope is opaque to the bus; it is a plain
//! [`serde_json::Value`] so collaborators can exchange any structured data.

pub mod completion;
pub mod envelope;

pub use completion::{CompletionHandle, PendingReply, Reply};
pub use envelope::{Envelope, EnvelopeBody, MessageContext, MessageKind, Payload};
