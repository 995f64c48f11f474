//! Common utilities and types shared across the stats sidecar crates.

pub mod appender;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
