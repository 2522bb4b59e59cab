//! Best-effort replication between queue replicas.
//!
//! This module contains:
//! - `ReplicationBroadcaster`: drains channel notification buffers and sends
//!   each operation to every peer
//! - `ReplicationReceiver`: applies operations streamed in from peers
//! - `PeerSender` trait and the pooled gRPC implementation `PeerPool`
//!
//! Delivery is at-most-once: failures are logged and never retried.

mod broadcaster;
mod peer;
mod receiver;

use async_trait::async_trait;
use tonic::Status;

use crate::proto::MessageUpdate;

pub use broadcaster::ReplicationBroadcaster;
pub use peer::PeerPool;
pub use receiver::ReplicationReceiver;

/// Result type for replication delivery.
pub type Result<T> = std::result::Result<T, ReplicationError>;

/// Delivery failures. Logged only, never surfaced to queue callers.
#[derive(Debug, thiserror::Error)]
pub enum ReplicationError {
    #[error("connection to {peer} failed: {reason}")]
    Connection { peer: String, reason: String },

    #[error("stream to {peer} failed: {status}")]
    Stream { peer: String, status: Status },

    #[error("delivery to {peer} timed out")]
    Timeout { peer: String },
}

/// Sends a single update to one peer.
#[async_trait]
pub trait PeerSender: Send + Sync {
    async fn send(&self, peer: &str, update: MessageUpdate) -> Result<()>;
}
