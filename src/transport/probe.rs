// MIT License - Copyright (c) 2026 Peter Wright
// TCP reachability probe for the panel's control port

use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tracing::debug;

/// Try to open (and immediately drop) a TCP connection.
///
/// Returns `false` on refusal, unreachable hosts and timeouts alike.
pub async fn tcp_probe(host: String, port: u16, limit: Duration) -> bool {
    let addr = format!("{}:{}", host, port);
    match timeout(limit, TcpStream::connect(&addr)).await {
        Ok(Ok(_stream)) => {
            debug!("Port probe {} open", addr);
            true
        }
        Ok(Err(e)) => {
            debug!("Port probe {} failed: {}", addr, e);
            false
        }
        Err(_) => {
            debug!("Port probe {} timed out", addr);
            false
        }
    }
}
