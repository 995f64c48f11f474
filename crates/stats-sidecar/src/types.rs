//! Types flowing through one polling cycle.

use serde::{Deserialize, Serialize};
use status_probe::ProbeError;
use std::fmt;

/// Occupancy metrics published each cycle.
///
/// Field names are the custom log columns on the ingestion side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricRecord {
    #[serde(rename = "PodName")]
    pub pod_name: String,

    #[serde(rename = "OnlinePlayers")]
    pub online_players: u32,

    #[serde(rename = "MaxPlayers")]
    pub max_players: u32,
}

impl fmt::Display for MetricRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}/{}",
            self.pod_name, self.online_players, self.max_players
        )
    }
}

/// Response of the ingestion endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResult {
    /// HTTP status code
    pub status: u16,

    /// Response body
    pub body: String,
}

impl PublishResult {
    /// Whether the endpoint accepted the record
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Publish failure
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("failed to encode metric record: {0}")]
    EncodingFailure(#[from] serde_json::Error),

    #[error("transport failure: {0}")]
    TransportFailure(String),
}

impl PublishError {
    /// Create a new transport failure.
    pub fn transport(msg: impl fmt::Display) -> Self {
        PublishError::TransportFailure(msg.to_string())
    }
}

/// What happened during one pipeline pass
#[derive(Debug)]
pub enum CycleOutcome {
    /// Record delivered (any HTTP status)
    Published(PublishResult),

    /// Status query failed; nothing was published
    ProbeFailed(ProbeError),

    /// Status could not be re-encoded for logging; nothing was published
    StatusEncodingFailed(serde_json::Error),

    /// Record could not be delivered
    PublishFailed(PublishError),
}

impl CycleOutcome {
    /// Pipeline stage that ended the pass, `None` on success
    pub fn failed_stage(&self) -> Option<&'static str> {
        match self {
            CycleOutcome::Published(_) => None,
            CycleOutcome::ProbeFailed(_) => Some("probe"),
            CycleOutcome::StatusEncodingFailed(_) => Some("status-encoding"),
            CycleOutcome::PublishFailed(_) => Some("publish"),
        }
    }
}

/// Counters over all cycles of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleStats {
    /// Pipeline passes started
    pub total_cycles: u64,

    /// Records delivered
    pub published: u64,

    /// Passes ended by a probe failure
    pub probe_failures: u64,

    /// Passes ended by a status encoding failure
    pub encoding_failures: u64,

    /// Passes ended by a publish failure
    pub publish_failures: u64,

    /// Current run of failed passes
    pub consecutive_failures: u64,
}

impl CycleStats {
    /// Update stats with a cycle outcome
    pub fn update(&mut self, outcome: &CycleOutcome) {
        self.total_cycles += 1;

        match outcome {
            CycleOutcome::Published(_) => {
                self.published += 1;
                self.consecutive_failures = 0;
                return;
            }
            CycleOutcome::ProbeFailed(_) => self.probe_failures += 1,
            CycleOutcome::StatusEncodingFailed(_) => self.encoding_failures += 1,
            CycleOutcome::PublishFailed(_) => self.publish_failures += 1,
        }
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }
}
