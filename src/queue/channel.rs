//! Channel ("Diexodos"): a named logical queue with its counters and
//! notification buffer.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::message::{Message, Operation};

/// Default capacity of each channel's notification buffer.
pub const DEFAULT_NOTIFICATION_CAPACITY: usize = 1024;

/// Outcome of a non-blocking notification push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Buffer full; the new notification was dropped.
    Dropped,
    /// Nobody drains this buffer (replication not running).
    Detached,
}

/// Bounded per-channel buffer feeding the replication broadcaster.
///
/// Overflow policy: drop newest and log. Pushes never block.
#[derive(Debug)]
pub struct NotificationBuffer {
    sender: mpsc::Sender<Operation>,
}

impl NotificationBuffer {
    /// Create a buffer and the receiving end the broadcaster drains.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Operation>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Attempt to queue an operation without waiting.
    pub fn try_push(&self, channel: &str, operation: Operation) -> PushOutcome {
        match self.sender.try_send(operation) {
            Ok(()) => PushOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(op)) => {
                warn!(
                    channel = %channel,
                    message_id = %op.message.id,
                    "Notification buffer full, dropping replication update"
                );
                PushOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(channel = %channel, "Notification buffer has no consumer");
                PushOutcome::Detached
            }
        }
    }
}

/// Cumulative per-channel counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelCounters {
    /// Enqueues plus dequeues.
    pub processed: u64,
    pub enqueued: u64,
    pub dequeued: u64,
}

/// A named queue of pending messages.
///
/// Messages are keyed by id; the order in which they come out is not defined.
#[derive(Debug)]
pub struct Channel {
    name: String,
    internal_id: String,
    pub(crate) messages: HashMap<String, Message>,
    notifications: NotificationBuffer,
    pub(crate) last_message_time: DateTime<Utc>,
    pub(crate) counters: ChannelCounters,
    pub(crate) stats_epoch: DateTime<Utc>,
}

impl Channel {
    /// Create an empty channel. Returns the drain side of its notification buffer.
    pub fn new(name: impl Into<String>, capacity: usize) -> (Self, mpsc::Receiver<Operation>) {
        let now = Utc::now();
        let (notifications, receiver) = NotificationBuffer::new(capacity);
        let channel = Self {
            name: name.into(),
            internal_id: Uuid::new_v4().to_string(),
            messages: HashMap::new(),
            notifications,
            last_message_time: now,
            counters: ChannelCounters::default(),
            stats_epoch: now,
        };
        (channel, receiver)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn internal_id(&self) -> &str {
        &self.internal_id
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.messages.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.get(id)
    }

    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.values()
    }

    pub fn counters(&self) -> ChannelCounters {
        self.counters
    }

    pub fn last_message_time(&self) -> DateTime<Utc> {
        self.last_message_time
    }

    pub fn stats_epoch(&self) -> DateTime<Utc> {
        self.stats_epoch
    }

    /// Insert (or overwrite) a message by id and touch `last_message_time`.
    pub(crate) fn insert(&mut self, message: Message) {
        self.messages.insert(message.id.clone(), message);
        self.last_message_time = Utc::now();
    }

    /// Remove a message by id. Absent ids are a no-op.
    pub(crate) fn remove(&mut self, id: &str) -> Option<Message> {
        self.messages.remove(id)
    }

    /// Replace the whole message set (snapshot load).
    pub(crate) fn replace_messages(&mut self, messages: HashMap<String, Message>) {
        self.messages = messages;
    }

    pub(crate) fn record_enqueue(&mut self) {
        self.counters.processed += 1;
        self.counters.enqueued += 1;
    }

    pub(crate) fn record_dequeue(&mut self) {
        self.counters.processed += 1;
        self.counters.dequeued += 1;
    }

    /// Zero the counters and start a new stats epoch.
    pub(crate) fn reset_stats(&mut self) {
        self.counters = ChannelCounters::default();
        self.stats_epoch = Utc::now();
    }

    pub(crate) fn notify(&self, operation: Operation) -> PushOutcome {
        self.notifications.try_push(&self.name, operation)
    }

    /// Point-in-time statistics for reporting.
    pub fn stats(&self) -> ChannelStats {
        let now = Utc::now();
        ChannelStats {
            name: self.name.clone(),
            pending: self.messages.len(),
            counters: self.counters,
            last_message_time: self.last_message_time,
            stats_epoch: self.stats_epoch,
            age: (now - self.stats_epoch).to_std().unwrap_or_default(),
        }
    }
}

/// Snapshot of one channel's statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelStats {
    pub name: String,
    pub pending: usize,
    pub counters: ChannelCounters,
    pub last_message_time: DateTime<Utc>,
    pub stats_epoch: DateTime<Utc>,
    /// Time elapsed since the stats epoch.
    pub age: std::time::Duration,
}
