//! Stats sidecar
//!
//! Polls a game server's status on a fixed interval and forwards its
//! occupancy to a log ingestion endpoint.
//!
//! # Components
//!
//! - **Signer**: shared-key HMAC signature for each ingestion request
//! - **Extractor**: maps a server status onto a [`MetricRecord`]
//! - **Publisher**: signs and POSTs records, logging request and response
//! - **Scheduler**: tick loop running probe, extract and publish, and
//!   owning graceful shutdown
//!
//! Status queries come from the `status_probe` crate.

pub mod config;
pub mod extract;
pub mod publisher;
pub mod scheduler;
pub mod shutdown;
pub mod signer;
pub mod types;

pub use config::{Config, ConfigError, Identity};
pub use publisher::{Publisher, TelemetryPublisher};
pub use scheduler::Scheduler;
pub use types::{CycleOutcome, CycleStats, MetricRecord, PublishError, PublishResult};
