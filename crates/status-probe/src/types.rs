//! Status query types.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Decode `null` the same way as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Server software version as reported in the status response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Human readable version name (e.g. "1.20.4")
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,

    /// Protocol number spoken by the server
    #[serde(default, deserialize_with = "null_as_default")]
    pub protocol: i32,
}

/// A player listed in the status sample.
///
/// Servers put arbitrary lines of text here, often without an `id`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSample {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
}

/// Occupancy block of the status response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Players {
    /// Maximum number of player slots
    #[serde(default, deserialize_with = "null_as_default")]
    pub max: u32,

    /// Players currently online
    #[serde(default, deserialize_with = "null_as_default")]
    pub online: u32,

    /// Partial list of online players
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub sample: Vec<PlayerSample>,
}

/// Result of one status query.
///
/// Absent fields decode to their zero value; only `players` is consumed
/// downstream, the rest is kept for logging.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerStatus {
    #[serde(default, deserialize_with = "null_as_default")]
    pub version: Version,

    #[serde(default, deserialize_with = "null_as_default")]
    pub players: Players,

    /// Message of the day, either a plain string or a chat component
    #[serde(default)]
    pub description: serde_json::Value,

    /// Base64 PNG data URI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
}

/// Probe failure
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// The TCP connection could not be established
    #[error("cannot reach {addr}: {source}")]
    Unreachable {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The connection opened but the status exchange failed
    #[error("status query to {addr} failed: {reason}")]
    ProtocolFailure { addr: String, reason: String },
}

impl ProbeError {
    /// Create a new protocol failure.
    pub fn protocol(addr: impl Into<String>, reason: impl fmt::Display) -> Self {
        ProbeError::ProtocolFailure {
            addr: addr.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the target could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, ProbeError::Unreachable { .. })
    }
}
