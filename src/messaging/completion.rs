//! # Completion Handles
//!
//! A `REQUEST` envelope owns a [`CompletionHandle`]; the caller keeps the
//! matching [`PendingReply`]. The handle is consumed when fulfilled, so it can
//! be written at most once. If it is dropped unfulfilled the caller observes
//! [`BusError::ReplyDropped`] instead of waiting forever.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::oneshot;
use uuid::Uuid;

use super::envelope::Payload;
use crate::error::{BusError, BusResult};

/// Outcome delivered to a caller: the reply payload or the failure that
/// prevented one.
pub type Reply = BusResult<Payload>;

/// Write side of a request/reply pair.
pub struct CompletionHandle {
    request_id: Uuid,
    sender: oneshot::Sender<Reply>,
}

impl CompletionHandle {
    /// Create a handle for the request identified by `request_id`, returning
    /// the awaitable read side alongside it.
    pub fn new(request_id: Uuid) -> (Self, PendingReply) {
        let (sender, receiver) = oneshot::channel();
        (
            Self { request_id, sender },
            PendingReply {
                request_id,
                receiver,
            },
        )
    }

    /// Id of the request this handle answers.
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Whether the caller has stopped waiting.
    pub fn is_abandoned(&self) -> bool {
        self.sender.is_closed()
    }

    /// Deliver the reply. Returns `false` when the caller already went away.
    pub fn fulfil(self, reply: Reply) -> bool {
        self.sender.send(reply).is_ok()
    }
}

impl fmt::Debug for CompletionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionHandle")
            .field("request_id", &self.request_id)
            .field("abandoned", &self.sender.is_closed())
            .finish()
    }
}

/// Read side of a request/reply pair; resolves to the eventual [`Reply`].
#[derive(Debug)]
pub struct PendingReply {
    request_id: Uuid,
    receiver: oneshot::Receiver<Reply>,
}

impl PendingReply {
    /// Id of the request this reply belongs to.
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Wait for the reply for at most `timeout`.
    pub async fn with_timeout(self, timeout: Duration) -> Reply {
        let request_id = self.request_id;
        match tokio::time::timeout(timeout, self).await {
            Ok(reply) => reply,
            Err(_) => Err(BusError::Timeout {
                operation: format!("call {request_id}"),
                timeout,
            }),
        }
    }
}

impl Future for PendingReply {
    type Output = Reply;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(BusError::ReplyDropped)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fulfilled_handle_resolves_pending_reply() {
        let (handle, pending) = CompletionHandle::new(Uuid::new_v4());
        assert_eq!(handle.request_id(), pending.request_id());

        assert!(handle.fulfil(Ok(json!("done"))));
        assert_eq!(pending.await.unwrap(), json!("done"));
    }

    #[tokio::test]
    async fn test_dropped_handle_yields_reply_dropped() {
        let (handle, pending) = CompletionHandle::new(Uuid::new_v4());
        drop(handle);

        assert!(matches!(pending.await, Err(BusError::ReplyDropped)));
    }

    #[tokio::test]
    async fn test_abandoned_reply_is_detected() {
        let (handle, pending) = CompletionHandle::new(Uuid::new_v4());
        drop(pending);

        assert!(handle.is_abandoned());
        assert!(!handle.fulfil(Ok(json!(null))));
    }

    #[tokio::test]
    async fn test_with_timeout_expires() {
        let (_handle, pending) = CompletionHandle::new(Uuid::new_v4());

        let result = pending.with_timeout(Duration::from_millis(20)).await;
        assert!(matches!(result, Err(BusError::Timeout { .. })));
    }
}
