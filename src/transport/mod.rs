//! Server transport: TLS material and the gRPC router.
//!
//! The router always carries the standard gRPC health service next to the
//! queue service. TLS is mutual: clients must present a certificate signed
//! by the CA in `tls.pem`.

use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::server::Router;
use tonic::transport::{Certificate, Identity, Server, ServerTlsConfig};
use tracing::{info, warn};

use crate::proto::eupalinos_server::EupalinosServer;
use crate::queue::QueueService;
use crate::services::EupalinosService;

/// Server certificate file name.
pub const CERT_FILE: &str = "tls.crt";
/// Server private key file name.
pub const KEY_FILE: &str = "tls.key";
/// Client CA bundle file name.
pub const CA_FILE: &str = "tls.pem";

/// Transport errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid listen address '{0}'")]
    Address(String),

    #[error("Transport error: {0}")]
    Tonic(#[from] tonic::transport::Error),
}

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

async fn read_pem(dir: &Path, file: &str) -> Result<Vec<u8>> {
    let path = dir.join(file);
    tokio::fs::read(&path)
        .await
        .map_err(|source| TransportError::Io { path, source })
}

/// Load the server identity and client CA from a certificate directory.
pub async fn load_server_tls(dir: &Path) -> Result<ServerTlsConfig> {
    let cert = read_pem(dir, CERT_FILE).await?;
    let key = read_pem(dir, KEY_FILE).await?;
    let ca = read_pem(dir, CA_FILE).await?;

    info!(dir = %dir.display(), "Loaded TLS material");
    Ok(ServerTlsConfig::new()
        .identity(Identity::from_pem(cert, key))
        .client_ca_root(Certificate::from_pem(ca)))
}

/// Load TLS material if a directory is configured.
///
/// Unreadable material is logged and the server falls back to plaintext.
pub async fn server_tls(dir: Option<&Path>) -> Option<ServerTlsConfig> {
    let Some(dir) = dir else {
        info!("No certificate root configured, serving plaintext");
        return None;
    };
    match load_server_tls(dir).await {
        Ok(tls) => Some(tls),
        Err(e) => {
            warn!(error = %e, "Failed to load TLS material, serving plaintext");
            None
        }
    }
}

/// Build the router serving the queue and health services.
pub async fn router(queue: QueueService, tls: Option<ServerTlsConfig>) -> Result<Router> {
    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<EupalinosServer<EupalinosService>>()
        .await;

    let mut builder = Server::builder();
    if let Some(tls) = tls {
        builder = builder.tls_config(tls)?;
    }

    Ok(builder
        .add_service(health_service)
        .add_service(EupalinosServer::new(EupalinosService::new(queue))))
}

/// Parse a `host:port` listen address.
pub fn parse_addr(address: &str) -> Result<SocketAddr> {
    address
        .parse()
        .map_err(|_| TransportError::Address(address.to_string()))
}

/// Bind `addr` and serve until `signal` completes.
pub async fn serve_with_shutdown<F>(router: Router, addr: SocketAddr, signal: F) -> Result<()>
where
    F: Future<Output = ()> + Send,
{
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| TransportError::Io {
            path: PathBuf::from(addr.to_string()),
            source,
        })?;
    serve_listener(router, listener, signal).await
}

/// Serve on an already bound listener until `signal` completes.
pub async fn serve_listener<F>(router: Router, listener: TcpListener, signal: F) -> Result<()>
where
    F: Future<Output = ()> + Send,
{
    if let Ok(addr) = listener.local_addr() {
        info!(address = %addr, transport = "tcp", "Server listening");
    }
    router
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), signal)
        .await?;
    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::eupalinos_client::EupalinosClient;
    use crate::proto::{ChannelInfo, Epistello};
    use crate::queue::QueueOptions;

    #[test]
    fn test_parse_addr() {
        assert_eq!(parse_addr("0.0.0.0:50060").unwrap().port(), 50060);
        assert!(matches!(
            parse_addr("localhost"),
            Err(TransportError::Address(_))
        ));
    }

    #[tokio::test]
    async fn test_load_server_tls_missing_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = load_server_tls(dir.path()).await.unwrap_err();
        match err {
            TransportError::Io { path, .. } => assert!(path.ends_with(CERT_FILE)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_server_tls_falls_back_to_plaintext() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(server_tls(Some(dir.path())).await.is_none());
        assert!(server_tls(None).await.is_none());
    }

    #[tokio::test]
    async fn test_router_serves_queue_until_shutdown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();

        let router = router(QueueService::new(QueueOptions::default()), None)
            .await
            .unwrap();
        let server = tokio::spawn(serve_listener(router, listener, async {
            let _ = stop_rx.await;
        }));

        let mut client = EupalinosClient::connect(format!("http://{}", addr))
            .await
            .unwrap();
        client
            .enqueue_message(Epistello {
                id: String::new(),
                data: "hello".to_string(),
                channel: "greetings".to_string(),
            })
            .await
            .unwrap();
        let length = client
            .get_queue_length(ChannelInfo {
                name: "greetings".to_string(),
            })
            .await
            .unwrap()
            .into_inner();
        assert_eq!(length.length, 1);

        stop_tx.send(()).unwrap();
        drop(client);
        let result = tokio::time::timeout(std::time::Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
