//! Receiving side of the alternating-bit protocol.
//!
//! [`ReceiveState`] decides what to do with each inbound data unit using only
//! its corruption flag and sequence bit; payload bytes are never compared.
//! [`Receiver`] drives the transport and keeps the last ack it sent so it can
//! repeat it verbatim.
//!
//! The ack to send is always `ack(alternate(expected))`: before acceptance
//! that is the previous ack (a rejection), after acceptance the bit has just
//! flipped and it is the fresh ack for the unit being delivered.

use tokio::time::{timeout_at, Instant};

use crate::config::RdtConfig;
use crate::error::{Result, TransportError};
use crate::packet::{AckPacket, Bit, DataPacket};
use crate::transport::Transport;
use crate::udt::Udt;

/// How [`ReceiveState::on_data`] classified an inbound unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// In order and intact; `expected` has flipped.
    Accept,
    /// Intact but carrying the other bit: a retransmission of a unit whose
    /// ack was lost.
    Duplicate,
    Corrupted,
}

#[derive(Debug, Default)]
pub struct ReceiveState {
    expected: Bit,
}

impl ReceiveState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expected_bit(&self) -> Bit {
        self.expected
    }

    pub fn on_data(&mut self, unit: &DataPacket) -> Verdict {
        if unit.corrupted {
            Verdict::Corrupted
        } else if unit.seq != self.expected {
            Verdict::Duplicate
        } else {
            self.expected.flip();
            Verdict::Accept
        }
    }

    /// Ack for the most recently accepted unit.
    pub fn last_ack(&self) -> AckPacket {
        AckPacket::new(self.expected.alternate())
    }
}

/// Per-session counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Payloads handed to the application (end-of-stream not counted).
    pub delivered: u64,
    pub duplicates: u64,
    pub corrupted: u64,
    pub acks_sent: u64,
}

/// Reliable receiving endpoint.  Owns its transport exclusively.
#[derive(Debug)]
pub struct Receiver<T> {
    udt: Udt<T>,
    state: ReceiveState,
    /// Encoded form of the last ack, resent unchanged on every rejection.
    last_ack: Vec<u8>,
    finished: bool,
    config: RdtConfig,
    stats: ReceiverStats,
}

impl<T: Transport> Receiver<T> {
    pub fn new(transport: T, config: RdtConfig) -> Self {
        let state = ReceiveState::new();
        Self {
            udt: Udt::new(transport),
            last_ack: state.last_ack().encode(),
            state,
            finished: false,
            config,
            stats: ReceiverStats::default(),
        }
    }

    pub fn expected_bit(&self) -> Bit {
        self.state.expected_bit()
    }

    pub fn stats(&self) -> ReceiverStats {
        self.stats
    }

    pub fn transport(&self) -> &T {
        self.udt.transport()
    }

    /// `true` once end-of-stream has been reported.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Wait for the next in-order payload.
    ///
    /// Returns `None` once the sender has closed the stream; later calls keep
    /// returning `None` without reading from the transport.
    pub async fn recv(&mut self) -> Result<Option<Vec<u8>>> {
        if self.finished {
            return Ok(None);
        }

        loop {
            let unit = self.udt.recv_data().await?;
            match self.state.on_data(&unit) {
                Verdict::Accept => {
                    self.last_ack = self.state.last_ack().encode();
                    self.send_last_ack().await?;
                    log::debug!(
                        "[rdt] ← DATA seq={} len={}; → ACK ack={}",
                        unit.seq,
                        unit.len(),
                        unit.seq
                    );
                    if unit.is_empty() {
                        self.finished = true;
                        log::debug!("[rdt] end-of-stream");
                        return Ok(None);
                    }
                    self.stats.delivered += 1;
                    return Ok(Some(unit.payload));
                }
                verdict => {
                    self.count_rejection(verdict, &unit);
                    self.send_last_ack().await?;
                }
            }
        }
    }

    /// Release the transport.
    ///
    /// After end-of-stream the receiver first lingers for
    /// [`RdtConfig::linger`], answering any retransmission with the last ack
    /// in case the final ack was lost.  Lingering stops early once the peer
    /// closes.
    pub async fn close(mut self) -> Result<ReceiverStats> {
        let lingered = if self.finished && !self.config.linger.is_zero() {
            self.linger().await
        } else {
            Ok(())
        };
        let released = self.udt.close().await;
        lingered?;
        released?;

        log::info!(
            "[rdt] receiver closed: {} delivered, {} duplicates, {} corrupted",
            self.stats.delivered,
            self.stats.duplicates,
            self.stats.corrupted
        );
        Ok(self.stats)
    }

    async fn linger(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.config.linger;
        loop {
            match timeout_at(deadline, self.udt.recv_data()).await {
                Err(_elapsed) => return Ok(()),
                Ok(Err(TransportError::PeerClosed)) => return Ok(()),
                Ok(Err(e)) => return Err(e.into()),
                Ok(Ok(unit)) => {
                    let verdict = if unit.corrupted {
                        Verdict::Corrupted
                    } else {
                        Verdict::Duplicate
                    };
                    self.count_rejection(verdict, &unit);
                    match self.send_last_ack().await {
                        Err(e) if e.is_peer_closed() => return Ok(()),
                        other => other?,
                    }
                }
            }
        }
    }

    fn count_rejection(&mut self, verdict: Verdict, unit: &DataPacket) {
        match verdict {
            Verdict::Corrupted => {
                self.stats.corrupted += 1;
                log::debug!("[rdt] ← corrupted DATA; → ACK (repeat)");
            }
            _ => {
                self.stats.duplicates += 1;
                log::debug!(
                    "[rdt] ← duplicate DATA seq={} (expected {}); → ACK (repeat)",
                    unit.seq,
                    self.state.expected_bit()
                );
            }
        }
    }

    async fn send_last_ack(&mut self) -> Result<()> {
        self.udt.send_encoded(&self.last_ack).await?;
        self.stats.acks_sent += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(seq: Bit, payload: &[u8]) -> DataPacket {
        DataPacket::new(seq, payload.to_vec())
    }

    #[test]
    fn initial_repeat_ack_is_for_the_other_bit() {
        let s = ReceiveState::new();
        assert_eq!(s.last_ack(), AckPacket::new(Bit::One));
    }

    #[test]
    fn accept_flips_and_acks_the_accepted_bit() {
        let mut s = ReceiveState::new();
        assert_eq!(s.on_data(&unit(Bit::Zero, b"a")), Verdict::Accept);
        assert_eq!(s.expected_bit(), Bit::One);
        assert_eq!(s.last_ack(), AckPacket::new(Bit::Zero));
    }

    #[test]
    fn duplicate_is_judged_by_bit_not_content() {
        let mut s = ReceiveState::new();
        s.on_data(&unit(Bit::Zero, b"a"));
        // Same bit, different bytes: still a duplicate.
        assert_eq!(s.on_data(&unit(Bit::Zero, b"zzz")), Verdict::Duplicate);
        // Same bytes, next bit: a new unit.
        assert_eq!(s.on_data(&unit(Bit::One, b"a")), Verdict::Accept);
    }

    #[test]
    fn corrupted_unit_never_advances() {
        let mut s = ReceiveState::new();
        let mut bad = unit(Bit::Zero, b"a");
        bad.corrupted = true;
        assert_eq!(s.on_data(&bad), Verdict::Corrupted);
        assert_eq!(s.expected_bit(), Bit::Zero);
    }
}
