//! Metric extraction.

use crate::config::Identity;
use crate::types::MetricRecord;
use status_probe::ServerStatus;

/// Build the record published for `status`.
///
/// Total: counts the server did not report are already zero in
/// [`ServerStatus`] and are copied as such.
pub fn extract(identity: &Identity, status: &ServerStatus) -> MetricRecord {
    MetricRecord {
        pod_name: identity.pod_name.clone(),
        online_players: status.players.online,
        max_players: status.players.max,
    }
}
