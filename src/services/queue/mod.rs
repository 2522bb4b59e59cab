//! Eupalinos gRPC service.
//!
//! Thin adapter between the generated `Eupalinos` server trait and
//! [`QueueService`]. Trace ids travel in request/response metadata.

use tokio_stream::wrappers::ReceiverStream;
use tonic::metadata::{Ascii, MetadataMap, MetadataValue};
use tonic::{Request, Response, Status, Streaming};
use tracing::debug;

use crate::proto::eupalinos_server::Eupalinos;
use crate::proto::{
    ChannelInfo, EnqueueResponse, Epistello, EpistelloBytes, HealthRequest, HealthResponse,
    MessageUpdate, QueueLength,
};
use crate::queue::{Message, Payload, PayloadKind, QueueService};
use crate::replication::ReplicationReceiver;

/// Metadata key carrying the trace id.
pub const TRACING_KEY: &str = "aischylos";

/// Extract the trace id from request metadata, empty if absent or not ASCII.
pub fn trace_id_from(metadata: &MetadataMap) -> String {
    metadata
        .get(TRACING_KEY)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

/// gRPC front for the queue.
#[derive(Clone)]
pub struct EupalinosService {
    queue: QueueService,
}

impl EupalinosService {
    pub fn new(queue: QueueService) -> Self {
        Self { queue }
    }

    async fn enqueue(&self, channel: &str, payload: Payload, metadata: &MetadataMap) -> String {
        let trace_id = trace_id_from(metadata);
        self.queue.enqueue(channel, payload, &trace_id).await
    }

    async fn dequeue(
        &self,
        request: Request<ChannelInfo>,
        kind: PayloadKind,
    ) -> Result<Message, Status> {
        let info = request.into_inner();
        Ok(self.queue.dequeue(&info.name, kind).await?)
    }
}

/// Wrap a reply and attach the message's trace id, if it has one.
fn with_trace<T>(body: T, trace_id: &str) -> Response<T> {
    let mut response = Response::new(body);
    if !trace_id.is_empty() {
        match trace_id.parse::<MetadataValue<Ascii>>() {
            Ok(value) => {
                response.metadata_mut().insert(TRACING_KEY, value);
            }
            Err(_) => debug!(trace_id = %trace_id, "Trace id is not valid metadata"),
        }
    }
    response
}

#[tonic::async_trait]
impl Eupalinos for EupalinosService {
    type StreamQueueUpdatesStream = ReceiverStream<Result<MessageUpdate, Status>>;

    async fn enqueue_message(
        &self,
        request: Request<Epistello>,
    ) -> Result<Response<EnqueueResponse>, Status> {
        let (metadata, _, message) = request.into_parts();
        let id = self
            .enqueue(&message.channel, Payload::Text(message.data), &metadata)
            .await;
        Ok(Response::new(EnqueueResponse { id }))
    }

    async fn enqueue_message_bytes(
        &self,
        request: Request<EpistelloBytes>,
    ) -> Result<Response<EnqueueResponse>, Status> {
        let (metadata, _, message) = request.into_parts();
        let id = self
            .enqueue(&message.channel, Payload::Bytes(message.data), &metadata)
            .await;
        Ok(Response::new(EnqueueResponse { id }))
    }

    async fn dequeue_message(
        &self,
        request: Request<ChannelInfo>,
    ) -> Result<Response<Epistello>, Status> {
        let message = self.dequeue(request, PayloadKind::Text).await?;
        let Payload::Text(data) = message.payload else {
            return Err(Status::internal("dequeued payload changed variant"));
        };
        Ok(with_trace(
            Epistello {
                id: message.id,
                data,
                channel: message.channel,
            },
            &message.trace_id,
        ))
    }

    async fn dequeue_message_bytes(
        &self,
        request: Request<ChannelInfo>,
    ) -> Result<Response<EpistelloBytes>, Status> {
        let message = self.dequeue(request, PayloadKind::Bytes).await?;
        let Payload::Bytes(data) = message.payload else {
            return Err(Status::internal("dequeued payload changed variant"));
        };
        Ok(with_trace(
            EpistelloBytes {
                id: message.id,
                data,
                channel: message.channel,
            },
            &message.trace_id,
        ))
    }

    async fn get_queue_length(
        &self,
        request: Request<ChannelInfo>,
    ) -> Result<Response<QueueLength>, Status> {
        let info = request.into_inner();
        let length = self.queue.queue_length(&info.name).await?;
        let length = i32::try_from(length).unwrap_or(i32::MAX);
        Ok(Response::new(QueueLength { length }))
    }

    async fn health(
        &self,
        _request: Request<HealthRequest>,
    ) -> Result<Response<HealthResponse>, Status> {
        let health = self.queue.health();
        Ok(Response::new(HealthResponse {
            healthy: health.healthy,
            time: health.time,
            version: health.version,
        }))
    }

    async fn stream_queue_updates(
        &self,
        request: Request<Streaming<MessageUpdate>>,
    ) -> Result<Response<Self::StreamQueueUpdatesStream>, Status> {
        if let Some(peer) = request.remote_addr() {
            debug!(peer = %peer, "Replica opened update stream");
        }
        let receiver = ReplicationReceiver::new(self.queue.clone());
        Ok(Response::new(receiver.accept(request.into_inner())))
    }
}
