//! Queue client wrapping the generated tonic stub.

use std::time::Duration;

use tonic::metadata::MetadataMap;
use tonic::transport::{Channel, Endpoint};
use tracing::debug;

use crate::error::{ClientError, Result};
use crate::proto::eupalinos_client::EupalinosClient;
use crate::proto::{ChannelInfo, Epistello, EpistelloBytes, HealthRequest, HealthResponse};

/// Address used when none is given.
pub const DEFAULT_ADDRESS: &str = "localhost:50060";
/// gRPC metadata key carrying the trace id.
pub const TRACING_KEY: &str = "aischylos";
/// How long [`QueueClient::wait_for_healthy`] keeps trying.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(30);
/// Pause between health probes.
pub const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A message taken off a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery<T> {
    pub id: String,
    pub channel: String,
    pub data: T,
    /// Trace id attached at enqueue time, if any.
    pub trace_id: Option<String>,
}

/// Create a tonic Request carrying the trace id in metadata.
pub fn traced_request<T>(msg: T, trace_id: &str) -> tonic::Request<T> {
    let mut req = tonic::Request::new(msg);
    if !trace_id.is_empty() {
        if let Ok(val) = trace_id.parse() {
            req.metadata_mut().insert(TRACING_KEY, val);
        }
    }
    req
}

fn trace_id_from(metadata: &MetadataMap) -> Option<String> {
    metadata
        .get(TRACING_KEY)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn channel_info(channel: &str) -> ChannelInfo {
    ChannelInfo {
        name: channel.to_string(),
    }
}

/// Client for a single queue replica.
#[derive(Clone)]
pub struct QueueClient {
    inner: EupalinosClient<Channel>,
}

impl QueueClient {
    /// Create a client for `address` (`host:port` or a full URI).
    ///
    /// The connection is established on first use, so this succeeds even if
    /// the server is not up yet. An empty address means [`DEFAULT_ADDRESS`].
    pub fn connect(address: &str) -> Result<Self> {
        let address = if address.is_empty() {
            DEFAULT_ADDRESS
        } else {
            address
        };
        let uri = if address.contains("://") {
            address.to_string()
        } else {
            format!("http://{}", address)
        };
        let channel = Endpoint::from_shared(uri)
            .map_err(|e| ClientError::Connection(e.to_string()))?
            .connect_lazy();
        Ok(Self::from_channel(channel))
    }

    /// Connect using an address from environment variable with fallback.
    pub fn from_env(env_var: &str, default: &str) -> Result<Self> {
        let address = std::env::var(env_var).unwrap_or_else(|_| default.to_string());
        Self::connect(&address)
    }

    /// Create a client from an existing channel.
    pub fn from_channel(channel: Channel) -> Self {
        Self {
            inner: EupalinosClient::new(channel),
        }
    }

    /// Enqueue a text message. Returns the server-assigned id.
    pub async fn enqueue(&self, channel: &str, data: &str) -> Result<String> {
        self.enqueue_traced(channel, data, "").await
    }

    /// Enqueue a text message carrying a trace id.
    pub async fn enqueue_traced(&self, channel: &str, data: &str, trace_id: &str) -> Result<String> {
        let message = Epistello {
            id: String::new(),
            data: data.to_string(),
            channel: channel.to_string(),
        };
        let response = self
            .inner
            .clone()
            .enqueue_message(traced_request(message, trace_id))
            .await?;
        Ok(response.into_inner().id)
    }

    /// Enqueue a binary message. Returns the server-assigned id.
    pub async fn enqueue_bytes(&self, channel: &str, data: Vec<u8>) -> Result<String> {
        self.enqueue_bytes_traced(channel, data, "").await
    }

    pub async fn enqueue_bytes_traced(
        &self,
        channel: &str,
        data: Vec<u8>,
        trace_id: &str,
    ) -> Result<String> {
        let message = EpistelloBytes {
            id: String::new(),
            data,
            channel: channel.to_string(),
        };
        let response = self
            .inner
            .clone()
            .enqueue_message_bytes(traced_request(message, trace_id))
            .await?;
        Ok(response.into_inner().id)
    }

    /// Take one text message off a channel.
    pub async fn dequeue(&self, channel: &str) -> Result<Delivery<String>> {
        let response = self.inner.clone().dequeue_message(channel_info(channel)).await?;
        let trace_id = trace_id_from(response.metadata());
        let message = response.into_inner();
        Ok(Delivery {
            id: message.id,
            channel: message.channel,
            data: message.data,
            trace_id,
        })
    }

    /// Take one binary message off a channel.
    pub async fn dequeue_bytes(&self, channel: &str) -> Result<Delivery<Vec<u8>>> {
        let response = self
            .inner
            .clone()
            .dequeue_message_bytes(channel_info(channel))
            .await?;
        let trace_id = trace_id_from(response.metadata());
        let message = response.into_inner();
        Ok(Delivery {
            id: message.id,
            channel: message.channel,
            data: message.data,
            trace_id,
        })
    }

    /// Number of pending messages on a channel.
    pub async fn queue_length(&self, channel: &str) -> Result<usize> {
        let length = self
            .inner
            .clone()
            .get_queue_length(channel_info(channel))
            .await?
            .into_inner()
            .length;
        usize::try_from(length)
            .map_err(|_| ClientError::InvalidResponse(format!("negative queue length {}", length)))
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        Ok(self.inner.clone().health(HealthRequest {}).await?.into_inner())
    }

    /// Poll health once a second for up to 30 seconds.
    pub async fn wait_for_healthy(&self) -> bool {
        self.wait_for_healthy_within(HEALTH_TIMEOUT, HEALTH_POLL_INTERVAL)
            .await
    }

    /// Poll health every `interval` until healthy or `timeout` elapses.
    pub async fn wait_for_healthy_within(&self, timeout: Duration, interval: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.health().await {
                Ok(health) if health.healthy => return true,
                Ok(_) => debug!("Queue reports unhealthy"),
                Err(e) => debug!(error = %e, "Health probe failed"),
            }
            if tokio::time::Instant::now() + interval > deadline {
                return false;
            }
            tokio::time::sleep(interval).await;
        }
    }
}
