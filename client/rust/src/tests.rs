use std::net::SocketAddr;
use std::result::Result;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tonic::transport::Server;
use tonic::{Request, Response, Status, Streaming};

use super::*;
use crate::proto::eupalinos_server::{Eupalinos, EupalinosServer};
use crate::proto::{
    ChannelInfo, EnqueueResponse, Epistello, EpistelloBytes, HealthRequest, HealthResponse,
    MessageUpdate, QueueLength,
};

/// Canned server with switchable health and a configurable length.
#[derive(Clone, Default)]
struct StubQueue {
    healthy: Arc<AtomicBool>,
    length: Arc<AtomicI32>,
}

/// Messages dequeued from the "traced" channel carry a trace id.
fn with_trace<T>(body: T, channel: &str) -> Response<T> {
    let mut response = Response::new(body);
    if channel == "traced" {
        response
            .metadata_mut()
            .insert(TRACING_KEY, "trace-9".parse().unwrap());
    }
    response
}

#[tonic::async_trait]
impl Eupalinos for StubQueue {
    type StreamQueueUpdatesStream = ReceiverStream<Result<MessageUpdate, Status>>;

    async fn enqueue_message(
        &self,
        request: Request<Epistello>,
    ) -> Result<Response<EnqueueResponse>, Status> {
        let id = format!("text:{}", request.get_ref().channel);
        Ok(Response::new(EnqueueResponse { id }))
    }

    async fn enqueue_message_bytes(
        &self,
        request: Request<EpistelloBytes>,
    ) -> Result<Response<EnqueueResponse>, Status> {
        let id = format!("bytes:{}", request.get_ref().data.len());
        Ok(Response::new(EnqueueResponse { id }))
    }

    async fn dequeue_message(
        &self,
        request: Request<ChannelInfo>,
    ) -> Result<Response<Epistello>, Status> {
        match request.get_ref().name.as_str() {
            "missing" => Err(Status::not_found("channel 'missing' not found")),
            "empty" => Err(Status::failed_precondition("queue 'empty' is empty")),
            name => {
                let body = Epistello {
                    id: "m-1".to_string(),
                    data: "payload".to_string(),
                    channel: name.to_string(),
                };
                Ok(with_trace(body, name))
            }
        }
    }

    async fn dequeue_message_bytes(
        &self,
        request: Request<ChannelInfo>,
    ) -> Result<Response<EpistelloBytes>, Status> {
        let name = request.into_inner().name;
        let body = EpistelloBytes {
            id: "b-1".to_string(),
            data: vec![1, 2, 3],
            channel: name.clone(),
        };
        Ok(with_trace(body, &name))
    }

    async fn get_queue_length(
        &self,
        _request: Request<ChannelInfo>,
    ) -> Result<Response<QueueLength>, Status> {
        Ok(Response::new(QueueLength {
            length: self.length.load(Ordering::SeqCst),
        }))
    }

    async fn health(
        &self,
        _request: Request<HealthRequest>,
    ) -> Result<Response<HealthResponse>, Status> {
        Ok(Response::new(HealthResponse {
            healthy: self.healthy.load(Ordering::SeqCst),
            time: "2024-01-01T00:00:00Z".to_string(),
            version: "stub".to_string(),
        }))
    }

    async fn stream_queue_updates(
        &self,
        _request: Request<Streaming<MessageUpdate>>,
    ) -> Result<Response<Self::StreamQueueUpdatesStream>, Status> {
        Err(Status::unimplemented("stub"))
    }
}

async fn start_stub(stub: StubQueue) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        Server::builder()
            .add_service(EupalinosServer::new(stub))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    addr
}

#[tokio::test]
async fn test_connect_is_lazy() {
    // Nothing listens on port 1
    assert!(QueueClient::connect("127.0.0.1:1").is_ok());
    assert!(QueueClient::connect("").is_ok());
}

#[tokio::test]
async fn test_connect_rejects_invalid_address() {
    let err = QueueClient::connect("bad address with spaces").err().unwrap();
    assert!(matches!(err, ClientError::Connection(_)));
}

#[tokio::test]
async fn test_enqueue_returns_server_id() {
    let addr = start_stub(StubQueue::default()).await;
    let client = QueueClient::connect(&addr.to_string()).unwrap();

    assert_eq!(client.enqueue("orders", "o-1").await.unwrap(), "text:orders");
    assert_eq!(
        client.enqueue_bytes("blobs", vec![0; 4]).await.unwrap(),
        "bytes:4"
    );
}

#[tokio::test]
async fn test_dequeue_carries_trace_id() {
    let addr = start_stub(StubQueue::default()).await;
    let client = QueueClient::connect(&format!("http://{}", addr)).unwrap();

    let plain = client.dequeue("orders").await.unwrap();
    assert_eq!(plain.channel, "orders");
    assert_eq!(plain.data, "payload");
    assert_eq!(plain.trace_id, None);

    let traced = client.dequeue("traced").await.unwrap();
    assert_eq!(traced.trace_id.as_deref(), Some("trace-9"));

    let bytes = client.dequeue_bytes("traced").await.unwrap();
    assert_eq!(bytes.data, vec![1, 2, 3]);
    assert_eq!(bytes.trace_id.as_deref(), Some("trace-9"));
}

#[tokio::test]
async fn test_traced_request_sets_metadata() {
    let request = traced_request((), "trace-42");
    assert_eq!(
        request.metadata().get(TRACING_KEY).unwrap().to_str().unwrap(),
        "trace-42"
    );
    assert!(traced_request((), "").metadata().get(TRACING_KEY).is_none());
}

#[tokio::test]
async fn test_dequeue_errors_are_classified() {
    let addr = start_stub(StubQueue::default()).await;
    let client = QueueClient::connect(&addr.to_string()).unwrap();

    assert!(client.dequeue("missing").await.unwrap_err().is_channel_not_found());
    assert!(client.dequeue("empty").await.unwrap_err().is_queue_empty());
}

#[tokio::test]
async fn test_queue_length() {
    let stub = StubQueue::default();
    stub.length.store(7, Ordering::SeqCst);
    let addr = start_stub(stub.clone()).await;
    let client = QueueClient::connect(&addr.to_string()).unwrap();

    assert_eq!(client.queue_length("orders").await.unwrap(), 7);

    stub.length.store(-1, Ordering::SeqCst);
    let err = client.queue_length("orders").await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidResponse(_)));
}

#[tokio::test]
async fn test_wait_for_healthy_succeeds() {
    let stub = StubQueue::default();
    stub.healthy.store(true, Ordering::SeqCst);
    let addr = start_stub(stub).await;
    let client = QueueClient::connect(&addr.to_string()).unwrap();

    assert!(
        client
            .wait_for_healthy_within(Duration::from_secs(2), Duration::from_millis(20))
            .await
    );
    assert_eq!(client.health().await.unwrap().version, "stub");
}

#[tokio::test]
async fn test_wait_for_healthy_becomes_healthy_later() {
    let stub = StubQueue::default();
    let addr = start_stub(stub.clone()).await;
    let client = QueueClient::connect(&addr.to_string()).unwrap();

    let flip = stub.healthy.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        flip.store(true, Ordering::SeqCst);
    });

    assert!(
        client
            .wait_for_healthy_within(Duration::from_secs(5), Duration::from_millis(20))
            .await
    );
}

#[tokio::test]
async fn test_wait_for_healthy_times_out() {
    let client = QueueClient::connect("127.0.0.1:1").unwrap();
    assert!(
        !client
            .wait_for_healthy_within(Duration::from_millis(100), Duration::from_millis(20))
            .await
    );
}
