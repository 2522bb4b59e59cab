//! eupalinos: replicated queue server
//!
//! One process per replica. Serves the `eupalinos.Eupalinos` gRPC service
//! plus the standard health service, forwards local mutations to every peer
//! and snapshots channel contents to disk.
//!
//! ## Architecture
//! ```text
//! [Producer/Consumer] -> [eupalinos-N] --StreamQueueUpdates--> [eupalinos-M]
//!                             |
//!                             v
//!                   [snapshot: <SAVE_PATH>/<pod>/eupalinos_state.json]
//! ```
//!
//! ## Configuration
//! - PORT: gRPC listen port (default 50060)
//! - POD_NAME / TOTAL_REPLICAS / NAMESPACE / SERVICE_NAME: peer topology
//! - ENV=LOCAL: peers on localhost:5005<i+1> instead of cluster DNS
//! - SAVE_PATH: snapshot base directory (default /tmp)
//! - CERT_ROOT: enables mutual TLS from `<CERT_ROOT>/<SERVICE_NAME>`; unreadable
//!   material is logged and the server stays plaintext. Peers are dialed plaintext.
//! - VERSION: version reported by health checks
//! - EUPALINOS_CONFIG / EUPALINOS__SECTION__KEY: structured configuration

use std::sync::Arc;

use tracing::{info, warn};

use eupalinos::config::Config;
use eupalinos::persistence::PersistenceManager;
use eupalinos::queue::QueueService;
use eupalinos::replication::{PeerPool, ReplicationBroadcaster};
use eupalinos::stats::StatsReporter;
use eupalinos::transport::{
    parse_addr, router, serve_with_shutdown, server_tls, shutdown_signal,
};
use eupalinos::utils::bootstrap::{init_tracing, log_banner};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load(None)?;
    log_banner(&config.server.version);

    let options = config.queue_options()?;
    info!(
        pod = %config.replication.pod_name,
        peers = ?options.peers,
        streaming = options.streaming,
        "Replica topology resolved"
    );
    let queue = QueueService::new(options);

    let snapshot_path = config.snapshot_path()?;
    let persistence = PersistenceManager::new(queue.clone(), &snapshot_path)
        .with_interval(config.persistence.save_interval());
    if let Err(e) = persistence.load_snapshot().await {
        warn!(path = %snapshot_path.display(), error = %e, "Snapshot not restored");
    }
    let autosave = persistence.clone().spawn_autosave();

    let broadcaster = match queue.take_channel_feed().await {
        Some(feed) => {
            let pool = PeerPool::new(
                config.replication.connect_timeout(),
                config.replication.request_timeout(),
            );
            Some(ReplicationBroadcaster::new(queue.peers().to_vec(), Arc::new(pool)).spawn(feed))
        }
        None => None,
    };

    let stats = StatsReporter::new(queue.clone())
        .with_interval(config.stats.interval())
        .with_reset_after_report(config.stats.reset_after_report)
        .spawn();

    let tls = server_tls(config.tls.cert_dir().as_deref()).await;

    let addr = parse_addr(&config.server.bind_address())?;
    let router = router(queue.clone(), tls).await?;
    serve_with_shutdown(router, addr, shutdown_signal()).await?;

    autosave.abort();
    stats.abort();
    if let Some(broadcaster) = broadcaster {
        broadcaster.abort();
    }
    persistence.shutdown_hook().await;

    info!("eupalinos stopped");
    Ok(())
}
