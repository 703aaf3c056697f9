//! Unreliable data transfer: packet-level endpoint over a raw [`Transport`].
//!
//! [`Udt`] frames [`Packet`]s into datagrams and back.  On receipt it never
//! fails on bad input: a datagram that does not decode, or that carries the
//! wrong kind of unit for the direction being read, is returned as a unit
//! with `corrupted = true`.  Only transport errors propagate.

use crate::error::{RdtError, TransportError};
use crate::packet::{AckPacket, DataPacket, Packet};
use crate::transport::Transport;

#[derive(Debug)]
pub struct Udt<T> {
    transport: T,
}

impl<T: Transport> Udt<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Encode and send one unit.
    pub async fn send(&mut self, packet: &Packet) -> Result<(), RdtError> {
        let bytes = packet.encode()?;
        self.transport.send(&bytes).await?;
        Ok(())
    }

    /// Send bytes previously produced by [`Packet::encode`], unchanged.
    pub async fn send_encoded(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.transport.send(bytes).await
    }

    /// Wait for the next data unit.
    pub async fn recv_data(&mut self) -> Result<DataPacket, TransportError> {
        let datagram = self.transport.recv().await?;
        Ok(match Packet::decode(&datagram) {
            Ok(Packet::Data(d)) => d,
            Ok(Packet::Ack(_)) => {
                log::debug!("[udt] ack on the data path; treating as corrupted");
                DataPacket::corrupted()
            }
            Err(e) => {
                log::debug!("[udt] undecodable data unit: {e}");
                DataPacket::corrupted()
            }
        })
    }

    /// Wait for the next acknowledgement unit.
    pub async fn recv_ack(&mut self) -> Result<AckPacket, TransportError> {
        let datagram = self.transport.recv().await?;
        Ok(match Packet::decode(&datagram) {
            Ok(Packet::Ack(a)) => a,
            Ok(Packet::Data(_)) => {
                log::debug!("[udt] data on the ack path; treating as corrupted");
                AckPacket::corrupted()
            }
            Err(e) => {
                log::debug!("[udt] undecodable ack unit: {e}");
                AckPacket::corrupted()
            }
        })
    }

    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.transport.close().await
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
