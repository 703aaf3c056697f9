//! `rdt-over-udp`: alternating-bit stop-and-wait reliable delivery over an
//! unreliable datagram channel.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐   DATA(bit)   ┌──────────┐
//!  │  Sender  │──────────────▶│ Receiver │
//!  └────┬─────┘               └─────┬────┘
//!       │        ACK(bit)           │
//!       │◀──────────────────────────┘
//!       │
//!  ┌────▼──────────────────────────────┐
//!  │  Udt  (framing, corruption flag)  │
//!  └────┬──────────────────────────────┘
//!       │ raw datagrams
//!  ┌────▼──────────────────────────────┐
//!  │  Transport: Socket | MemoryLink   │  optionally wrapped in Simulator
//!  └───────────────────────────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]      wire format and the one-bit sequence space
//! - [`udt`]         packet-level endpoint; bad datagrams become `corrupted` units
//! - [`sender`]      send-side state and the send/wait/retransmit loop
//! - [`receiver`]    receive-side state, duplicate rejection, end-of-stream
//! - [`timer`]       retransmission deadline
//! - [`transport`]   the datagram channel trait
//! - [`socket`]      UDP transport
//! - [`channel`]     in-process transport
//! - [`simulator`]   loss and corruption injection
//! - [`config`]      session parameters
//! - [`error`]       error types

pub mod channel;
pub mod config;
pub mod error;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod simulator;
pub mod socket;
pub mod timer;
pub mod transport;
pub mod udt;

pub use config::RdtConfig;
pub use error::{RdtError, TransportError};
pub use packet::Bit;
pub use receiver::Receiver;
pub use sender::Sender;
pub use transport::Transport;
