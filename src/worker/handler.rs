//! # Handler Entries
//!
//! A worker's handler table is an ordered list of [`HandlerEntry`] values,
//! each guarded by a listener kind, an optional channel and a predicate.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};

use crate::messaging::{MessageContext, MessageKind, Payload};

/// Future returned by a type-erased handler body
pub type HandlerFuture = BoxFuture<'static, anyhow::Result<Payload>>;

/// Type-erased handler body; worker state is already captured.
pub type HandlerBody = Arc<dyn Fn(Payload, MessageContext) -> HandlerFuture + Send + Sync>;

/// Message filter evaluated before a body is selected
pub type Predicate = Arc<dyn Fn(&Payload) -> bool + Send + Sync>;

/// Which envelopes a handler listens to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListenerKind {
    /// Invoked for `REQUEST` envelopes addressed to the worker
    OnCall,
    /// Invoked for `NOTIFICATION` envelopes on a subscribed channel
    OnNotify,
}

impl ListenerKind {
    /// Envelope kind this listener consumes
    pub fn message_kind(self) -> MessageKind {
        match self {
            ListenerKind::OnCall => MessageKind::Request,
            ListenerKind::OnNotify => MessageKind::Notification,
        }
    }
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerKind::OnCall => write!(f, "ON_CALL"),
            ListenerKind::OnNotify => write!(f, "ON_NOTIFY"),
        }
    }
}

/// One declared `(kind, channel?, predicate, body)` tuple.
#[derive(Clone)]
pub struct HandlerEntry {
    name: String,
    kind: ListenerKind,
    channel: Option<String>,
    predicate: Option<Predicate>,
    body: HandlerBody,
}

impl HandlerEntry {
    pub(crate) fn new(
        name: String,
        kind: ListenerKind,
        channel: Option<String>,
        predicate: Option<Predicate>,
        body: HandlerBody,
    ) -> Self {
        Self {
            name,
            kind,
            channel,
            predicate,
            body,
        }
    }

    /// Erase a stateful body into a [`HandlerBody`] bound to `state`.
    pub(crate) fn bind<S, F, Fut>(state: Arc<S>, body: F) -> HandlerBody
    where
        S: Send + Sync + 'static,
        F: Fn(Arc<S>, Payload, MessageContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Payload>> + Send + 'static,
    {
        Arc::new(move |payload, context| body(Arc::clone(&state), payload, context).boxed())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ListenerKind {
        self.kind
    }

    pub fn channel(&self) -> Option<&str> {
        self.channel.as_deref()
    }

    /// Kind and channel guard. `ON_CALL` entries ignore the channel.
    pub fn listens_to(&self, kind: ListenerKind, channel: Option<&str>) -> bool {
        if self.kind != kind {
            return false;
        }
        match kind {
            ListenerKind::OnCall => true,
            ListenerKind::OnNotify => self.channel.is_some() && self.channel.as_deref() == channel,
        }
    }

    /// Full guard: kind, channel, then predicate. A missing predicate accepts
    /// every message.
    pub fn matches(&self, kind: ListenerKind, channel: Option<&str>, payload: &Payload) -> bool {
        self.listens_to(kind, channel)
            && self
                .predicate
                .as_ref()
                .map_or(true, |predicate| predicate(payload))
    }

    pub fn invoke(&self, payload: Payload, context: MessageContext) -> HandlerFuture {
        (self.body)(payload, context)
    }
}

impl fmt::Debug for HandlerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerEntry")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("channel", &self.channel)
            .field("has_predicate", &self.predicate.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(kind: ListenerKind, channel: Option<&str>, predicate: Option<Predicate>) -> HandlerEntry {
        HandlerEntry::new(
            "test".to_string(),
            kind,
            channel.map(str::to_string),
            predicate,
            HandlerEntry::bind(Arc::new(()), |_, payload, _| async move { Ok(payload) }),
        )
    }

    #[test]
    fn test_on_call_ignores_channel() {
        let entry = entry(ListenerKind::OnCall, None, None);

        assert!(entry.matches(ListenerKind::OnCall, None, &json!(1)));
        assert!(entry.matches(ListenerKind::OnCall, Some("anything"), &json!(1)));
        assert!(!entry.matches(ListenerKind::OnNotify, None, &json!(1)));
    }

    #[test]
    fn test_on_notify_requires_same_channel() {
        let entry = entry(ListenerKind::OnNotify, Some("alerts"), None);

        assert!(entry.matches(ListenerKind::OnNotify, Some("alerts"), &json!(1)));
        assert!(!entry.matches(ListenerKind::OnNotify, Some("other"), &json!(1)));
        assert!(!entry.matches(ListenerKind::OnNotify, None, &json!(1)));
    }

    #[test]
    fn test_predicate_is_consulted_after_guards() {
        let predicate: Predicate = Arc::new(|payload| payload.as_i64() == Some(7));
        let entry = entry(ListenerKind::OnCall, None, Some(predicate));

        assert!(entry.matches(ListenerKind::OnCall, None, &json!(7)));
        assert!(!entry.matches(ListenerKind::OnCall, None, &json!(8)));
    }

    #[tokio::test]
    async fn test_invoke_runs_bound_body() {
        let entry = entry(ListenerKind::OnCall, None, None);
        let context = MessageContext::new(MessageKind::Request, None);

        let result = entry.invoke(json!("hi"), context).await.unwrap();
        assert_eq!(result, json!("hi"));
    }

    #[test]
    fn test_listener_kind_display() {
        assert_eq!(ListenerKind::OnCall.to_string(), "ON_CALL");
        assert_eq!(ListenerKind::OnNotify.message_kind(), MessageKind::Notification);
    }
}
