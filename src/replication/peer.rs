//! Pooled gRPC connections to peer replicas.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tonic::transport::Channel;
use tonic::Request;
use tracing::debug;

use super::{PeerSender, ReplicationError, Result};
use crate::grpc::lazy_channel;
use crate::proto::eupalinos_client::EupalinosClient;
use crate::proto::MessageUpdate;

/// One lazily-connected client per peer address, reused for every send.
///
/// Each send still opens its own `StreamQueueUpdates` call carrying exactly
/// one update; only the underlying HTTP/2 connection is shared.
pub struct PeerPool {
    clients: RwLock<HashMap<String, EupalinosClient<Channel>>>,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl PeerPool {
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            connect_timeout,
            request_timeout,
        }
    }

    async fn client(&self, peer: &str) -> Result<EupalinosClient<Channel>> {
        if let Some(client) = self.clients.read().await.get(peer) {
            return Ok(client.clone());
        }

        let channel = lazy_channel(peer, self.connect_timeout, self.request_timeout).map_err(
            |reason| ReplicationError::Connection {
                peer: peer.to_string(),
                reason,
            },
        )?;
        debug!(peer = %peer, "Pooled new peer connection");

        let mut clients = self.clients.write().await;
        let client = clients
            .entry(peer.to_string())
            .or_insert_with(|| EupalinosClient::new(channel));
        Ok(client.clone())
    }

    /// Number of peers with a pooled client.
    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}

#[async_trait]
impl PeerSender for PeerPool {
    async fn send(&self, peer: &str, update: MessageUpdate) -> Result<()> {
        let mut client = self.client(peer).await?;

        let deliver = async move {
            let outbound = tokio_stream::iter(vec![update]);
            let mut replies = client
                .stream_queue_updates(Request::new(outbound))
                .await?
                .into_inner();
            // The peer closes its side once it has applied our single update
            while replies.message().await?.is_some() {}
            Ok::<(), tonic::Status>(())
        };

        match tokio::time::timeout(self.request_timeout, deliver).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(status)) => Err(ReplicationError::Stream {
                peer: peer.to_string(),
                status,
            }),
            Err(_) => Err(ReplicationError::Timeout {
                peer: peer.to_string(),
            }),
        }
    }
}
