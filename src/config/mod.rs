//! Application configuration.
//!
//! Aggregates configuration from all modules into a single Config struct
//! that can be loaded from YAML files or environment variables.

mod replication;
mod server;

pub use replication::{
    PeerMode, ReplicationConfig, DEFAULT_NAMESPACE, DEFAULT_PEER_PORT, DEFAULT_POD_NAME,
    DEFAULT_SERVICE_NAME,
};
pub use server::{PersistenceConfig, ServerConfig, StatsConfig, TlsConfig, SNAPSHOT_FILE};

use std::path::PathBuf;

use serde::Deserialize;

use crate::queue::QueueOptions;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "EUPALINOS_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "EUPALINOS";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "EUPALINOS_LOG";

/// Environment variable for server port.
pub const PORT_ENV_VAR: &str = "PORT";
/// Environment variable for the reported version.
pub const VERSION_ENV_VAR: &str = "VERSION";
/// Environment variable for this replica's pod name.
pub const POD_NAME_ENV_VAR: &str = "POD_NAME";
/// Environment variable for the replica count.
pub const TOTAL_REPLICAS_ENV_VAR: &str = "TOTAL_REPLICAS";
/// Environment variable for Kubernetes namespace.
pub const NAMESPACE_ENV_VAR: &str = "NAMESPACE";
/// Environment variable for the headless service name.
pub const SERVICE_NAME_ENV_VAR: &str = "SERVICE_NAME";
/// Environment variable for the snapshot base directory.
pub const SAVE_PATH_ENV_VAR: &str = "SAVE_PATH";
/// Environment variable for the certificate root.
pub const CERT_ROOT_ENV_VAR: &str = "CERT_ROOT";
/// Environment variable selecting the deployment environment (`LOCAL` for localhost peers).
pub const ENV_ENV_VAR: &str = "ENV";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid value for {var}: '{value}'")]
    InvalidEnv { var: &'static str, value: String },

    #[error("Pod name '{0}' is not of the form <name>-<ordinal>")]
    InvalidPodName(String),

    #[error("Replica count must be at least 1, got {0}")]
    InvalidReplicaCount(u32),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub replication: ReplicationConfig,
    pub persistence: PersistenceConfig,
    pub stats: StatsConfig,
    pub tls: TlsConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix
    /// 5. Deployment variables (`PORT`, `POD_NAME`, `TOTAL_REPLICAS`, ...)
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut config: Config = config.try_deserialize()?;
        config.apply_deployment_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Overlay the plain deployment variables a stateful set provides.
    pub fn apply_deployment_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup(PORT_ENV_VAR) {
            self.server.port = parse_env(PORT_ENV_VAR, &port)?;
        }
        if let Some(version) = lookup(VERSION_ENV_VAR) {
            self.server.version = version;
        }
        if let Some(pod_name) = lookup(POD_NAME_ENV_VAR) {
            self.replication.pod_name = pod_name;
        }
        if let Some(replicas) = lookup(TOTAL_REPLICAS_ENV_VAR) {
            self.replication.total_replicas = parse_env(TOTAL_REPLICAS_ENV_VAR, &replicas)?;
        }
        if let Some(namespace) = lookup(NAMESPACE_ENV_VAR) {
            self.replication.namespace = namespace;
        }
        if let Some(service_name) = lookup(SERVICE_NAME_ENV_VAR) {
            self.replication.service_name = service_name.clone();
            self.tls.service_name = service_name;
        }
        if let Some(save_path) = lookup(SAVE_PATH_ENV_VAR) {
            self.persistence.dir = save_path;
        }
        if let Some(cert_root) = lookup(CERT_ROOT_ENV_VAR) {
            self.tls.cert_root = Some(cert_root);
        }
        if lookup(ENV_ENV_VAR).is_some_and(|env| env.eq_ignore_ascii_case("local")) {
            self.replication.mode = PeerMode::Local;
        }
        Ok(())
    }

    /// Build queue service options, resolving the peer set.
    pub fn queue_options(&self) -> Result<QueueOptions, ConfigError> {
        let peers = self.replication.resolve_peers()?;
        Ok(QueueOptions {
            streaming: self.replication.streaming(&peers),
            peers,
            notification_capacity: self.replication.buffer_capacity,
            fan_out_on_receive: self.replication.fan_out_on_receive,
            version: self.server.version.clone(),
        })
    }

    /// Snapshot file for this replica.
    pub fn snapshot_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.persistence.path {
            return Ok(PathBuf::from(path));
        }
        let (base, ordinal) = self.replication.pod_identity()?;
        Ok(self.persistence.snapshot_path(base, ordinal))
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        Self::default()
    }
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var,
        value: value.to_string(),
    })
}
