//! The unreliable datagram channel underneath the protocol.
//!
//! A [`Transport`] moves whole datagrams in one direction pair.  It may drop
//! or damage any of them but never reorders or duplicates.  Integrity
//! checking and framing live above it in [`crate::udt`].
//!
//! Implementations in this crate:
//! - [`crate::socket::Socket`]: real UDP.
//! - [`crate::channel::MemoryLink`]: in-process pair for tests and demos.
//! - [`crate::simulator::Simulator`]: wraps either one and injects faults.

use std::future::Future;

use crate::error::TransportError;

pub trait Transport: Send {
    /// Hand one datagram to the channel.  Never blocks indefinitely.
    fn send(&mut self, datagram: &[u8]) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Wait for the next datagram.
    ///
    /// Returns [`TransportError::PeerClosed`] once the peer has released its
    /// end and nothing further can arrive.
    fn recv(&mut self) -> impl Future<Output = Result<Vec<u8>, TransportError>> + Send;

    /// Release the channel.  Further calls on this handle fail.
    fn close(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}
