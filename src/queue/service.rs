//! Queue operation surface.
//!
//! Every operation takes the single registry lock for the duration of its
//! mutation or read and never holds it across network I/O. Replication
//! notifications are pushed without blocking; a full buffer drops the update.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use super::channel::DEFAULT_NOTIFICATION_CAPACITY;
use super::error::{QueueError, Result};
use super::message::{Message, Operation, OperationKind, Payload, PayloadKind};
use super::registry::{ChannelFeed, ChannelRegistry};

/// Construction options for [`QueueService`].
#[derive(Debug, Clone)]
pub struct QueueOptions {
    /// Peer replica addresses (self excluded).
    pub peers: Vec<String>,
    /// Whether local mutations are queued for replication.
    pub streaming: bool,
    /// Capacity of each channel's notification buffer.
    pub notification_capacity: usize,
    /// Re-push received operations onto the other local channels' buffers.
    pub fan_out_on_receive: bool,
    /// Version reported by health checks.
    pub version: String,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            peers: Vec::new(),
            streaming: false,
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
            fan_out_on_receive: true,
            version: String::new(),
        }
    }
}

/// Health report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Health {
    pub healthy: bool,
    pub time: String,
    pub version: String,
}

struct QueueServiceInner {
    registry: Mutex<ChannelRegistry>,
    feed: Mutex<Option<mpsc::UnboundedReceiver<ChannelFeed>>>,
    options: QueueOptions,
}

/// Replicated multi-channel queue.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct QueueService {
    inner: Arc<QueueServiceInner>,
}

impl QueueService {
    pub fn new(options: QueueOptions) -> Self {
        let (registry, feed) = if options.streaming {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                ChannelRegistry::with_feed(options.notification_capacity, tx),
                Some(rx),
            )
        } else {
            (ChannelRegistry::new(options.notification_capacity), None)
        };

        info!(
            streaming = options.streaming,
            peers = options.peers.len(),
            "Queue service initialized"
        );

        Self {
            inner: Arc::new(QueueServiceInner {
                registry: Mutex::new(registry),
                feed: Mutex::new(feed),
                options,
            }),
        }
    }

    pub fn is_streaming(&self) -> bool {
        self.inner.options.streaming
    }

    pub fn peers(&self) -> &[String] {
        &self.inner.options.peers
    }

    pub fn version(&self) -> &str {
        &self.inner.options.version
    }

    /// Take the stream of newly created channels. Only the first caller gets it,
    /// and only when streaming is enabled.
    pub async fn take_channel_feed(&self) -> Option<mpsc::UnboundedReceiver<ChannelFeed>> {
        self.inner.feed.lock().await.take()
    }

    /// Lock the registry. Used by persistence and stats.
    pub(crate) async fn registry(&self) -> MutexGuard<'_, ChannelRegistry> {
        self.inner.registry.lock().await
    }

    /// Store a message on a channel, creating the channel if needed.
    ///
    /// Returns the generated message id. Never fails.
    pub async fn enqueue(&self, channel: &str, payload: Payload, trace_id: &str) -> String {
        let mut registry = self.inner.registry.lock().await;
        let diexodos = registry.find_or_create(channel);

        let message = Message::new(channel, payload, trace_id);
        let id = message.id.clone();
        diexodos.insert(message.clone());
        diexodos.record_enqueue();

        if self.inner.options.streaming {
            diexodos.notify(Operation::enqueue(message));
        }

        debug!(channel = %channel, message_id = %id, trace_id = %trace_id, "Enqueued message");
        id
    }

    /// Remove and return one pending message.
    ///
    /// Which message is taken is unspecified. The removal is final: when the
    /// taken message's payload is not `kind` it is still counted and
    /// replicated as dequeued, and `PayloadTypeMismatch` is returned.
    pub async fn dequeue(&self, channel: &str, kind: PayloadKind) -> Result<Message> {
        let mut registry = self.inner.registry.lock().await;
        let diexodos = registry
            .find_mut(channel)
            .ok_or_else(|| QueueError::ChannelNotFound(channel.to_string()))?;

        let selected = diexodos.messages().next().map(|m| m.id.clone());
        let message = selected
            .and_then(|id| diexodos.remove(&id))
            .ok_or_else(|| QueueError::QueueEmpty(channel.to_string()))?;

        diexodos.record_dequeue();
        if self.inner.options.streaming {
            diexodos.notify(Operation::dequeue(message.clone()));
        }

        if message.payload.kind() != kind {
            warn!(
                channel = %channel,
                message_id = %message.id,
                requested = ?kind,
                "Dequeued message has the other payload type, message dropped"
            );
            return Err(QueueError::PayloadTypeMismatch {
                channel: channel.to_string(),
                requested: kind,
            });
        }

        debug!(channel = %channel, message_id = %message.id, "Dequeued message");
        Ok(message)
    }

    /// Number of pending messages on a channel.
    pub async fn queue_length(&self, channel: &str) -> Result<usize> {
        let registry = self.inner.registry.lock().await;
        let length = registry
            .find(channel)
            .map(|c| c.len())
            .ok_or_else(|| QueueError::ChannelNotFound(channel.to_string()))?;
        debug!(channel = %channel, length, "Queue length");
        Ok(length)
    }

    pub fn health(&self) -> Health {
        Health {
            healthy: true,
            time: Utc::now().to_rfc3339(),
            version: self.inner.options.version.clone(),
        }
    }

    /// Apply an operation received from a peer replica.
    ///
    /// Enqueues insert by id, dequeues remove by id (missing ids are ignored).
    /// Counters are left alone. The operation is then pushed onto every other
    /// local channel's notification buffer when `fan_out_on_receive` is set.
    // FIXME: the fan-out targets local channels, not peers. Two replicas with
    // several channels echo updates back and forth, so an enqueue that was
    // already dequeued keeps coming back on both replicas.
    pub async fn apply_remote(&self, operation: Operation) {
        let mut registry = self.inner.registry.lock().await;
        let target = operation.message.channel.clone();
        let diexodos = registry.find_or_create(&target);

        match operation.kind {
            OperationKind::Enqueue => diexodos.insert(operation.message.clone()),
            OperationKind::Dequeue => {
                diexodos.remove(&operation.message.id);
                diexodos.last_message_time = Utc::now();
            }
        }

        debug!(
            channel = %target,
            message_id = %operation.message.id,
            kind = ?operation.kind,
            "Applied replicated operation"
        );

        if self.inner.options.fan_out_on_receive {
            for other in registry.channels().filter(|c| c.name() != target) {
                other.notify(operation.clone());
            }
        }
    }
}
