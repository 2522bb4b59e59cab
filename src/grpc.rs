//! gRPC utilities.

use std::time::Duration;

use tonic::transport::{Channel, Endpoint};

/// Build the endpoint for a peer address.
///
/// The address should be in the format "host:port"; an explicit
/// `http://` or `https://` scheme is kept as given.
pub fn endpoint(address: &str) -> Result<Endpoint, String> {
    let uri = if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("http://{}", address)
    };
    Endpoint::from_shared(uri).map_err(|e| format!("Invalid URI: {}", e))
}

/// Create a channel that connects on first use and reconnects as needed.
///
/// Both timeouts bound every call made over the channel, so an unreachable
/// peer fails fast instead of stalling the caller.
pub fn lazy_channel(
    address: &str,
    connect_timeout: Duration,
    request_timeout: Duration,
) -> Result<Channel, String> {
    Ok(endpoint(address)?
        .connect_timeout(connect_timeout)
        .timeout(request_timeout)
        .connect_lazy())
}
