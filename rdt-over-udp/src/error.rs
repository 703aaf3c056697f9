//! Error types shared by the transport and protocol layers.
//!
//! Loss, corruption and duplication never show up here: the sender and
//! receiver recover from them internally.  What remains is the end-of-channel
//! signal and genuine I/O failure.

use thiserror::Error;

use crate::packet::PacketError;

/// Failures raised by a [`crate::transport::Transport`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// The peer released its end of the channel.
    #[error("peer closed the channel")]
    PeerClosed,

    /// Underlying I/O error from the OS.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors surfaced to the application by [`crate::sender::Sender`] and
/// [`crate::receiver::Receiver`].
#[derive(Debug, Error)]
pub enum RdtError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The payload could not be framed (e.g. larger than one datagram).
    #[error("cannot frame payload: {0}")]
    Packet(#[from] PacketError),
}

impl RdtError {
    /// `true` when the error is the peer's end-of-channel signal.
    pub fn is_peer_closed(&self) -> bool {
        matches!(self, RdtError::Transport(TransportError::PeerClosed))
    }
}

pub type Result<T, E = RdtError> = std::result::Result<T, E>;
