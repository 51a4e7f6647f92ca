//! # Channel Registry
//!
//! Maps channel name → subscribed worker names. Membership only grows: there
//! is no unsubscribe, and a channel exists from the first subscription on.
//! Subscribers are kept in subscription order, without duplicates.

use dashmap::DashMap;
use tracing::{debug, info};

use crate::error::{BusError, BusResult};

#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: DashMap<String, Vec<String>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `worker_name` to every channel in `channels`, creating channels as
    /// needed. Returns how many memberships were new.
    pub fn subscribe<I, C>(&self, worker_name: &str, channels: I) -> usize
    where
        I: IntoIterator<Item = C>,
        C: AsRef<str>,
    {
        let mut added = 0;
        for channel in channels {
            let channel = channel.as_ref();
            let mut subscribers = self.channels.entry(channel.to_string()).or_default();
            if subscribers.iter().any(|existing| existing == worker_name) {
                debug!(worker = %worker_name, channel = %channel, "Already subscribed");
                continue;
            }
            subscribers.push(worker_name.to_string());
            added += 1;
            info!(worker = %worker_name, channel = %channel, "Subscribed worker to channel");
        }
        added
    }

    /// Current subscribers of `channel`, or [`BusError::ChannelNotFound`] if
    /// nobody ever subscribed to it.
    pub fn resolve(&self, channel: &str) -> BusResult<Vec<String>> {
        self.channels
            .get(channel)
            .map(|subscribers| subscribers.value().clone())
            .ok_or_else(|| BusError::ChannelNotFound {
                channel: channel.to_string(),
            })
    }

    pub fn is_subscribed(&self, channel: &str, worker_name: &str) -> bool {
        self.channels
            .get(channel)
            .is_some_and(|subscribers| subscribers.iter().any(|w| w == worker_name))
    }

    /// Known channel names, sorted
    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.iter().map(|c| c.key().clone()).collect();
        names.sort();
        names
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_creates_channels() {
        let registry = ChannelRegistry::new();

        let added = registry.subscribe("sink", ["c", "d"]);

        assert_eq!(added, 2);
        assert_eq!(registry.resolve("c").unwrap(), vec!["sink".to_string()]);
        assert_eq!(registry.channel_names(), vec!["c".to_string(), "d".to_string()]);
    }

    #[test]
    fn test_subscription_is_idempotent_and_ordered() {
        let registry = ChannelRegistry::new();
        registry.subscribe("first", ["c"]);
        registry.subscribe("second", ["c"]);

        assert_eq!(registry.subscribe("first", ["c"]), 0);
        assert_eq!(
            registry.resolve("c").unwrap(),
            vec!["first".to_string(), "second".to_string()]
        );
    }

    #[test]
    fn test_unknown_channel_is_not_found() {
        let registry = ChannelRegistry::new();
        registry.subscribe("sink", Vec::<String>::new());

        assert_eq!(registry.channel_count(), 0);
        assert!(matches!(
            registry.resolve("empty-channel"),
            Err(BusError::ChannelNotFound { .. })
        ));
        assert!(!registry.is_subscribed("empty-channel", "sink"));
    }
}
