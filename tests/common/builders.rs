//! Worker factories shared by the integration suites.

use std::sync::Arc;
use std::time::Duration;

use courier::{BusHandle, BusResult, Payload, Worker};
use parking_lot::Mutex;
use serde_json::json;

/// Messages observed by a recording worker, in arrival order
pub type Recorded = Arc<Mutex<Vec<Payload>>>;

/// Worker whose single `ON_CALL` handler replies with its input.
pub fn echo_worker(name: &str) -> BusResult<Worker> {
    Worker::builder(name)
        .description("Replies with its input")
        .on_call("echo", |_, message, _| async move { Ok(message) })
        .build()
}

/// Worker that records every notification on `channel`.
pub fn recording_sink(name: &str, channel: &str) -> (BusResult<Worker>, Recorded) {
    let builder = Worker::with_state(name, Mutex::new(Vec::new()));
    let recorded = Arc::clone(builder.state());
    let worker = builder
        .on_notify("record", channel, |state, message, _| async move {
            state.lock().push(message);
            Ok(Payload::Null)
        })
        .build();
    (worker, recorded)
}

/// Worker that answers after `delay`.
pub fn delayed_worker(name: &str, delay: Duration) -> BusResult<Worker> {
    Worker::with_state(name, delay)
        .on_call("delayed", |delay, message, _| async move {
            tokio::time::sleep(*delay).await;
            Ok(message)
        })
        .build()
}

/// Worker `outer` that forwards its message to `inner` and prefixes the reply.
pub fn forwarding_worker(name: &str, inner: &str, bus: BusHandle) -> BusResult<Worker> {
    let inner = inner.to_string();
    Worker::with_state(name, (bus, inner))
        .on_call("forward", |state, message, _| async move {
            let (bus, inner) = &*state;
            let reply = bus.call(inner, message).await?;
            let reply = reply.as_str().unwrap_or_default();
            Ok(json!(format!("got:{reply}")))
        })
        .build()
}
