//! Replication topology configuration.

use std::time::Duration;

use serde::Deserialize;

use super::ConfigError;
use crate::queue::DEFAULT_NOTIFICATION_CAPACITY;

/// Default pod name when none is provided.
pub const DEFAULT_POD_NAME: &str = "eupalinos-0";
/// Default headless service name replicas are addressed through.
pub const DEFAULT_SERVICE_NAME: &str = "eupalinos";
/// Default Kubernetes namespace for peer DNS names.
pub const DEFAULT_NAMESPACE: &str = "agora";
/// Default port peers listen on.
pub const DEFAULT_PEER_PORT: u16 = 50060;

/// How peer addresses are derived when none are listed explicitly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerMode {
    /// Stateful set DNS names inside the cluster.
    #[default]
    Kube,
    /// All replicas on localhost, replica `i` on port `5005{i+1}`.
    Local,
}

/// Replication configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    /// Force streaming on or off. Unset: on whenever there are peers.
    pub enabled: Option<bool>,
    /// Explicit peer addresses. Overrides derivation from the pod topology.
    pub peers: Vec<String>,
    pub mode: PeerMode,
    /// This replica's pod name, `<base>-<index>`.
    pub pod_name: String,
    pub total_replicas: u32,
    pub namespace: String,
    pub service_name: String,
    pub peer_port: u16,
    /// Capacity of each channel's notification buffer.
    pub buffer_capacity: usize,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    /// Re-push operations received from peers onto other local channels.
    pub fan_out_on_receive: bool,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            enabled: None,
            peers: Vec::new(),
            mode: PeerMode::Kube,
            pod_name: DEFAULT_POD_NAME.to_string(),
            total_replicas: 1,
            namespace: DEFAULT_NAMESPACE.to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            peer_port: DEFAULT_PEER_PORT,
            buffer_capacity: DEFAULT_NOTIFICATION_CAPACITY,
            connect_timeout_ms: 1000,
            request_timeout_ms: 5000,
            fan_out_on_receive: true,
        }
    }
}

impl ReplicationConfig {
    /// Split the pod name into its base name and ordinal.
    ///
    /// `eupalinos-2` yields `("eupalinos", 2)`. Base names may contain dashes.
    pub fn pod_identity(&self) -> Result<(&str, u32), ConfigError> {
        let (base, ordinal) = self
            .pod_name
            .rsplit_once('-')
            .filter(|(base, _)| !base.is_empty())
            .ok_or_else(|| ConfigError::InvalidPodName(self.pod_name.clone()))?;
        let ordinal = ordinal
            .parse()
            .map_err(|_| ConfigError::InvalidPodName(self.pod_name.clone()))?;
        Ok((base, ordinal))
    }

    /// Addresses of every other replica.
    pub fn resolve_peers(&self) -> Result<Vec<String>, ConfigError> {
        if !self.peers.is_empty() {
            return Ok(self.peers.clone());
        }
        if self.total_replicas == 0 {
            return Err(ConfigError::InvalidReplicaCount(self.total_replicas));
        }

        let (base, own) = self.pod_identity()?;
        Ok((0..self.total_replicas)
            .filter(|i| *i != own)
            .map(|i| match self.mode {
                PeerMode::Local => format!("localhost:5005{}", i + 1),
                PeerMode::Kube => format!(
                    "{}-{}.{}.{}.svc.cluster.local:{}",
                    base, i, self.service_name, self.namespace, self.peer_port
                ),
            })
            .collect())
    }

    /// Whether local mutations should be streamed to `peers`.
    pub fn streaming(&self, peers: &[String]) -> bool {
        self.enabled.unwrap_or(!peers.is_empty())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
