//! Server status queries over the game server list-ping protocol.
//!
//! This crate asks a running server for its occupancy without joining it:
//! - Framed VarInt codec for the handshake and status exchange
//! - `StatusProbe` trait so callers can swap the transport in tests
//! - `TcpStatusProbe`, a one-shot TCP implementation
//!
//! # Example
//!
//! ```no_run
//! use status_probe::{StatusProbe, TcpStatusProbe};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let probe = TcpStatusProbe::new();
//! let status = probe.probe("mc.example.net", 25565).await?;
//! println!("{}/{} players online", status.players.online, status.players.max);
//! # Ok(())
//! # }
//! ```

pub mod probe;
pub mod protocol;
pub mod types;

pub use probe::{StatusProbe, TcpStatusProbe};
pub use protocol::ProtocolError;
pub use types::{Players, ProbeError, ServerStatus, Version};
