//! # Registry Infrastructure
//!
//! Name-keyed registries consulted by the dispatcher on every envelope.
//!
//! ## Available Registries
//!
//! - **WorkerRegistry**: worker name → worker instance (request routing)
//! - **ChannelRegistry**: channel name → subscribed worker names (notification fan-out)
//!
//! ## Architecture
//!
//! ```text
//! Registry Infrastructure
//! ├── WorkerRegistry    (unique names, insert-once)
//! └── ChannelRegistry   (monotonic membership, no unsubscribe)
//! ```
//!
//! Both are `DashMap`-backed: writes happen at registration time, reads on the
//! hot path, and neither holds a shard guard across an `.await`.

pub mod channel_registry;
pub mod worker_registry;

pub use channel_registry::ChannelRegistry;
pub use worker_registry::WorkerRegistry;
