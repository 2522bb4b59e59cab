//! Replication receiver: the inbound half of `StreamQueueUpdates`.

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::Status;
use tracing::{debug, warn};

use crate::proto::MessageUpdate;
use crate::queue::{Operation, QueueService};

/// Applies operations streamed in from peers to the local registry.
///
/// Inbound operations are trusted; there is no provenance check.
pub struct ReplicationReceiver {
    queue: QueueService,
}

impl ReplicationReceiver {
    pub fn new(queue: QueueService) -> Self {
        Self { queue }
    }

    /// Consume an inbound stream on a background task.
    ///
    /// The returned reply stream carries nothing but an optional terminal
    /// error, and closes once the inbound stream ends.
    pub fn accept<S>(self, inbound: S) -> ReceiverStream<Result<MessageUpdate, Status>>
    where
        S: Stream<Item = Result<MessageUpdate, Status>> + Send + Unpin + 'static,
    {
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(async move {
            if let Err(status) = self.run(inbound).await {
                let _ = tx.send(Err(status)).await;
            }
        });
        ReceiverStream::new(rx)
    }

    /// Apply every update until the stream ends. Returns how many were applied.
    ///
    /// Malformed updates are skipped; a transport error ends the stream.
    pub async fn run<S>(&self, mut inbound: S) -> Result<usize, Status>
    where
        S: Stream<Item = Result<MessageUpdate, Status>> + Unpin,
    {
        let mut applied = 0;
        while let Some(update) = inbound.next().await {
            let update = update?;
            match Operation::try_from(update) {
                Ok(operation) => {
                    self.queue.apply_remote(operation).await;
                    applied += 1;
                }
                Err(status) => {
                    warn!(error = %status.message(), "Discarding malformed replication update");
                }
            }
        }
        debug!(applied, "Replica update stream ended");
        Ok(applied)
    }
}
