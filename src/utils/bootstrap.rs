//! Bootstrap utilities for the eupalinos binary.

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LOG_ENV_VAR;

/// Initialize tracing with EUPALINOS_LOG environment variable.
///
/// Defaults to "info" level if EUPALINOS_LOG is not set.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env(LOG_ENV_VAR)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

const BANNER: &str = r#"
 _____                    _ _
| ____|   _ _ __   __ _ | (_)_ __   ___  ___
|  _|| | | | '_ \ / _` || | | '_ \ / _ \/ __|
| |__| |_| | |_) | (_| || | | | | | (_) \__ \
|_____\__,_| .__/ \__,_||_|_|_| |_|\___/|___/
           |_|
"#;

/// Log the startup banner and the running version.
pub fn log_banner(version: &str) {
    for line in BANNER.lines().filter(|l| !l.trim().is_empty()) {
        info!("{}", line);
    }
    info!(version = %version, "Starting eupalinos queue");
}
