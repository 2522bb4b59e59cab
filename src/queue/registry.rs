//! Channel registry.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{info, warn};

use super::channel::{Channel, ChannelStats, DEFAULT_NOTIFICATION_CAPACITY};
use super::message::Operation;

/// Drain side of a newly created channel, handed to the broadcaster.
#[derive(Debug)]
pub struct ChannelFeed {
    pub channel: String,
    pub receiver: mpsc::Receiver<Operation>,
}

/// All channels known to this replica, created lazily by name.
///
/// The registry is not synchronized itself; the owning service guards it
/// with a single lock.
#[derive(Debug)]
pub struct ChannelRegistry {
    channels: HashMap<String, Channel>,
    notification_capacity: usize,
    feed: Option<mpsc::UnboundedSender<ChannelFeed>>,
}

impl ChannelRegistry {
    /// Create a registry whose notification buffers nobody drains.
    pub fn new(notification_capacity: usize) -> Self {
        Self {
            channels: HashMap::new(),
            notification_capacity,
            feed: None,
        }
    }

    /// Create a registry that announces every new channel on `feed`.
    pub fn with_feed(
        notification_capacity: usize,
        feed: mpsc::UnboundedSender<ChannelFeed>,
    ) -> Self {
        Self {
            channels: HashMap::new(),
            notification_capacity,
            feed: Some(feed),
        }
    }

    /// Return the named channel, creating it with zeroed counters if unseen.
    pub fn find_or_create(&mut self, name: &str) -> &mut Channel {
        let capacity = self.notification_capacity;
        let feed = self.feed.as_ref();
        self.channels.entry(name.to_string()).or_insert_with(|| {
            let (channel, receiver) = Channel::new(name, capacity);
            info!(
                channel = %name,
                internal_id = %channel.internal_id(),
                "Created channel"
            );
            if let Some(feed) = feed {
                let announced = feed.send(ChannelFeed {
                    channel: name.to_string(),
                    receiver,
                });
                if announced.is_err() {
                    warn!(channel = %name, "Broadcaster gone, channel will not replicate");
                }
            }
            channel
        })
    }

    pub fn find(&self, name: &str) -> Option<&Channel> {
        self.channels.get(name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Channel> {
        self.channels.get_mut(name)
    }

    /// Zero the counters of a channel. Returns false if the channel is unknown.
    pub fn reset_stats(&mut self, name: &str) -> bool {
        match self.channels.get_mut(name) {
            Some(channel) => {
                channel.reset_stats();
                true
            }
            None => false,
        }
    }

    /// Statistics for every channel, sorted by name.
    pub fn stats(&self) -> Vec<ChannelStats> {
        let mut stats: Vec<ChannelStats> = self.channels.values().map(Channel::stats).collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    pub(crate) fn channels_mut(&mut self) -> impl Iterator<Item = &mut Channel> {
        self.channels.values_mut()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_CAPACITY)
    }
}
