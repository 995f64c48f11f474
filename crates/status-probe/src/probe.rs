//! Status probe implementations.

use crate::protocol;
use crate::types::{ProbeError, ServerStatus};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Deadline for the status exchange once the connection is open
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Status probe trait
#[async_trait]
pub trait StatusProbe: Send + Sync {
    /// Query `host:port` once and return its status.
    async fn probe(&self, host: &str, port: u16) -> Result<ServerStatus, ProbeError>;
}

/// One-shot TCP status probe.
///
/// Each call opens a fresh connection, runs a single handshake and status
/// exchange, and shuts the connection down before returning. There are no
/// retries.
#[derive(Debug, Clone)]
pub struct TcpStatusProbe {
    query_timeout: Duration,
}

impl TcpStatusProbe {
    /// Create a new TCP status probe
    pub fn new() -> Self {
        Self {
            query_timeout: QUERY_TIMEOUT,
        }
    }
}

impl Default for TcpStatusProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatusProbe for TcpStatusProbe {
    async fn probe(&self, host: &str, port: u16) -> Result<ServerStatus, ProbeError> {
        let addr = format!("{}:{}", host, port);
        let start = Instant::now();

        info!(addr = %addr, "Connecting to server");
        let mut stream = TcpStream::connect(&addr)
            .await
            .map_err(|source| ProbeError::Unreachable {
                addr: addr.clone(),
                source,
            })?;
        info!(addr = %addr, "Connected to server");

        let result = match timeout(
            self.query_timeout,
            protocol::query_status(&mut stream, host, port),
        )
        .await
        {
            Ok(Ok(status)) => Ok(status),
            Ok(Err(e)) => Err(ProbeError::protocol(&addr, e)),
            Err(_) => Err(ProbeError::protocol(&addr, "status query timed out")),
        };

        if let Err(e) = stream.shutdown().await {
            debug!(addr = %addr, error = %e, "Connection shutdown failed");
        }

        match &result {
            Ok(status) => debug!(
                addr = %addr,
                online = status.players.online,
                max = status.players.max,
                duration_ms = start.elapsed().as_millis(),
                "Status query successful"
            ),
            Err(e) => warn!(addr = %addr, error = %e, "Status query failed"),
        }

        result
    }
}
