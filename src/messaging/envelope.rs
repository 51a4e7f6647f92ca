//! # Envelopes
//!
//! The unit of transit on the bus. Each envelope carries addressing, a
//! [`MessageContext`] and a kind-specific [`EnvelopeBody`]; the body is a
//! tagged union so routing is an exhaustive `match`, and only `REQUEST` and
//! `RESPONSE` bodies can hold a completion handle.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::completion::{CompletionHandle, PendingReply, Reply};

/// Opaque message payload.
pub type Payload = serde_json::Value;

/// Envelope kinds routed by the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageKind {
    /// Expects exactly one `Response`
    Request,
    /// Fan-out to channel subscribers, no reply
    Notification,
    /// Carries a reply back to a pending request
    Response,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Request => write!(f, "REQUEST"),
            MessageKind::Notification => write!(f, "NOTIFICATION"),
            MessageKind::Response => write!(f, "RESPONSE"),
        }
    }
}

/// Metadata handed to every handler alongside the payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageContext {
    /// Unique id of this envelope
    pub message_id: Uuid,
    /// When the envelope was built
    pub created_at: DateTime<Utc>,
    pub kind: MessageKind,
    /// Name of the worker that sent the envelope, `None` for external callers
    pub sender: Option<String>,
}

impl MessageContext {
    pub fn new(kind: MessageKind, sender: Option<String>) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            created_at: Utc::now(),
            kind,
            sender,
        }
    }
}

/// Kind-specific envelope contents
#[derive(Debug)]
pub enum EnvelopeBody {
    Request {
        payload: Payload,
        reply: CompletionHandle,
    },
    Notification {
        payload: Payload,
    },
    Response {
        outcome: Reply,
        reply: CompletionHandle,
    },
}

/// A message in transit
#[derive(Debug)]
pub struct Envelope {
    /// Worker name for requests and responses, channel name for notifications
    pub recipient: Option<String>,
    pub context: MessageContext,
    pub body: EnvelopeBody,
}

impl Envelope {
    /// Build a `REQUEST` addressed to `worker`, returning the caller's side of
    /// its completion handle.
    pub fn request(
        worker: impl Into<String>,
        payload: Payload,
        sender: Option<String>,
    ) -> (Self, PendingReply) {
        let context = MessageContext::new(MessageKind::Request, sender);
        let (reply, pending) = CompletionHandle::new(context.message_id);
        let envelope = Self {
            recipient: Some(worker.into()),
            context,
            body: EnvelopeBody::Request { payload, reply },
        };
        (envelope, pending)
    }

    /// Build a `NOTIFICATION` addressed to `channel`.
    pub fn notification(
        channel: impl Into<String>,
        payload: Payload,
        sender: Option<String>,
    ) -> Self {
        Self {
            recipient: Some(channel.into()),
            context: MessageContext::new(MessageKind::Notification, sender),
            body: EnvelopeBody::Notification { payload },
        }
    }

    /// Build the `RESPONSE` that answers a request, reusing its handle.
    ///
    /// `recipient` is the original request's sender and `responder` the worker
    /// (if any) that produced the outcome.
    pub fn response(
        recipient: Option<String>,
        responder: Option<String>,
        outcome: Reply,
        reply: CompletionHandle,
    ) -> Self {
        Self {
            recipient,
            context: MessageContext::new(MessageKind::Response, responder),
            body: EnvelopeBody::Response { outcome, reply },
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.context.kind
    }

    pub fn message_id(&self) -> Uuid {
        self.context.message_id
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TYPE:{} | FROM:{} | TO:{} | ID:{}",
            self.context.kind,
            self.context.sender.as_deref().unwrap_or("-"),
            self.recipient.as_deref().unwrap_or("-"),
            self.context.message_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_envelope_carries_handle_for_its_id() {
        let (envelope, pending) =
            Envelope::request("echo", json!("hi"), Some("caller".to_string()));

        assert_eq!(envelope.kind(), MessageKind::Request);
        assert_eq!(envelope.recipient.as_deref(), Some("echo"));
        assert_eq!(pending.request_id(), envelope.message_id());
        match envelope.body {
            EnvelopeBody::Request { payload, reply } => {
                assert_eq!(payload, json!("hi"));
                assert_eq!(reply.request_id(), pending.request_id());
            }
            other => panic!("Expected request body, got {other:?}"),
        }
    }

    #[test]
    fn test_notification_envelope_has_no_handle() {
        let envelope = Envelope::notification("c", json!({"evt": 1}), None);

        assert_eq!(envelope.kind(), MessageKind::Notification);
        assert!(matches!(envelope.body, EnvelopeBody::Notification { .. }));
    }

    #[test]
    fn test_envelope_display() {
        let envelope = Envelope::notification("updates", json!(null), Some("sink".to_string()));
        let rendered = envelope.to_string();

        assert!(rendered.starts_with("TYPE:NOTIFICATION | FROM:sink | TO:updates | ID:"));
    }

    #[test]
    fn test_message_kind_serializes_screaming_case() {
        let value = serde_json::to_value(MessageKind::Notification).unwrap();
        assert_eq!(value, json!("NOTIFICATION"));
    }
}
