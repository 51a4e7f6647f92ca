//! # Runtime
//!
//! The moving parts of the bus: the facade and its handles, the dispatch
//! loop, the in-flight tracker used for idle drain, and statistics.
//!
//! ```text
//! BusHandle::call / publish ──► unbounded FIFO queue ──► Dispatcher
//!                                    ▲                     │
//!                                    │        REQUEST ─────┼──► spawned task ─┐
//!                                    │   NOTIFICATION ─────┼──► spawned task  │
//!                                    │       RESPONSE ─────┘    (fulfil)      │
//!                                    └──────────── RESPONSE ◄─────────────────┘
//! ```

pub mod bus;
pub(crate) mod dispatcher;
pub mod stats;
pub mod tracker;

pub use bus::{BusHandle, MessageBus};
pub use stats::BusStats;
pub use tracker::{InFlightGuard, InFlightTracker};
