//! Replication broadcaster.
//!
//! One drain task per channel: a slow peer only delays further updates of
//! the channel whose update is in flight.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::PeerSender;
use crate::proto::MessageUpdate;
use crate::queue::{ChannelFeed, Operation};

/// Forwards locally originated operations to every peer, best-effort.
#[derive(Clone)]
pub struct ReplicationBroadcaster {
    peers: Arc<Vec<String>>,
    sender: Arc<dyn PeerSender>,
}

impl ReplicationBroadcaster {
    pub fn new(peers: Vec<String>, sender: Arc<dyn PeerSender>) -> Self {
        Self {
            peers: Arc::new(peers),
            sender,
        }
    }

    /// Run the broadcaster on its own task.
    pub fn spawn(self, feed: mpsc::UnboundedReceiver<ChannelFeed>) -> JoinHandle<()> {
        tokio::spawn(self.run(feed))
    }

    /// Start a drain task for every channel announced on `feed`.
    ///
    /// Returns when the feed closes (the queue service was dropped).
    pub async fn run(self, mut feed: mpsc::UnboundedReceiver<ChannelFeed>) {
        info!(peers = ?self.peers, "Replication broadcaster started");

        while let Some(ChannelFeed { channel, receiver }) = feed.recv().await {
            debug!(channel = %channel, "Draining notifications for channel");
            let broadcaster = self.clone();
            tokio::spawn(async move { broadcaster.drain(channel, receiver).await });
        }

        info!("Channel feed closed, replication broadcaster stopping");
    }

    async fn drain(&self, channel: String, mut receiver: mpsc::Receiver<Operation>) {
        while let Some(operation) = receiver.recv().await {
            self.broadcast(&channel, operation).await;
        }
        debug!(channel = %channel, "Notification buffer closed");
    }

    /// Send one operation to every peer concurrently.
    ///
    /// Returns the number of peers that accepted it. Failures are logged and
    /// the peer is skipped for this operation.
    pub async fn broadcast(&self, channel: &str, operation: Operation) -> usize {
        let message_id = operation.message.id.clone();
        let update = MessageUpdate::from(operation);

        let deliveries = self.peers.iter().map(|peer| {
            let update = update.clone();
            let message_id = &message_id;
            async move {
                match self.sender.send(peer, update).await {
                    Ok(()) => {
                        debug!(
                            channel = %channel,
                            peer = %peer,
                            message_id = %message_id,
                            "Replicated update"
                        );
                        true
                    }
                    Err(e) => {
                        warn!(
                            channel = %channel,
                            peer = %peer,
                            message_id = %message_id,
                            error = %e,
                            "Replication delivery failed"
                        );
                        false
                    }
                }
            }
        });

        join_all(deliveries)
            .await
            .into_iter()
            .filter(|delivered| *delivered)
            .count()
    }
}
