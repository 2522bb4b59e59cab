//! Server, persistence, stats and TLS configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::persistence::DEFAULT_SAVE_INTERVAL;
use crate::stats::DEFAULT_REPORT_INTERVAL;

/// Snapshot file name inside the per-pod directory.
pub const SNAPSHOT_FILE: &str = "eupalinos_state.json";

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port for the gRPC service.
    pub port: u16,
    /// Version reported by health checks.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 50060,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Snapshot configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Explicit snapshot file. Overrides `dir`.
    pub path: Option<String>,
    /// Base directory; the snapshot lands in `<dir>/<pod base><ordinal>/`.
    pub dir: String,
    pub save_interval_secs: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            path: None,
            dir: "/tmp".to_string(),
            save_interval_secs: DEFAULT_SAVE_INTERVAL.as_secs(),
        }
    }
}

impl PersistenceConfig {
    /// Resolve the snapshot file for a pod.
    pub fn snapshot_path(&self, pod_base: &str, ordinal: u32) -> PathBuf {
        match &self.path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(&self.dir)
                .join(format!("{}{}", pod_base, ordinal))
                .join(SNAPSHOT_FILE),
        }
    }

    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.save_interval_secs.max(1))
    }
}

/// Stats reporter configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    pub interval_secs: u64,
    pub reset_after_report: bool,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_REPORT_INTERVAL.as_secs(),
            reset_after_report: false,
        }
    }
}

impl StatsConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Mutual TLS configuration. Plaintext when `cert_root` is unset.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// Directory holding one certificate directory per service.
    pub cert_root: Option<String>,
    pub service_name: String,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            cert_root: None,
            service_name: super::replication::DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl TlsConfig {
    /// Directory holding `tls.crt`, `tls.key` and `tls.pem`.
    pub fn cert_dir(&self) -> Option<PathBuf> {
        self.cert_root
            .as_ref()
            .map(|root| PathBuf::from(root).join(&self.service_name))
    }
}
