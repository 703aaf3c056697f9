//! Sending side of the alternating-bit protocol.
//!
//! [`SendState`] tracks the current sequence bit and the single in-flight
//! unit.  It does **not** touch the transport; [`Sender`] calls these methods
//! and owns the actual send/wait/retransmit loop.
//!
//! # Stop-and-wait contract
//! - At most **one** unit is in flight at any moment (`unacked`).
//! - On an uncorrupted ack echoing the current bit: flip the bit, clear
//!   `unacked`.  This is the only way the bit ever changes.
//! - A corrupted ack, or one echoing the other bit, changes nothing.  The
//!   sender keeps waiting and lets the timer decide when to resend.
//! - On timeout: resend the stored bytes unchanged and rearm the timer.

use tokio::time::timeout_at;

use crate::config::RdtConfig;
use crate::error::{RdtError, Result};
use crate::packet::{AckPacket, Bit, DataPacket, Packet};
use crate::timer::RetransmitTimer;
use crate::transport::Transport;
use crate::udt::Udt;

// ---------------------------------------------------------------------------
// RetransmitEntry
// ---------------------------------------------------------------------------

/// A unit that has been sent but not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetransmitEntry {
    /// Encoded form; every retransmission sends exactly these bytes.
    pub bytes: Vec<u8>,
    /// How many times this unit has been transmitted (1 = first send).
    pub tx_count: u32,
}

/// How [`SendState::on_ack`] classified an incoming ack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckVerdict {
    /// Matches the in-flight unit; the bit has flipped.
    Confirmed,
    /// Failed the integrity check.
    Corrupted,
    /// Echoes the other bit: a late duplicate for an already-confirmed unit.
    Stale,
    /// Nothing is in flight.
    Idle,
}

// ---------------------------------------------------------------------------
// SendState
// ---------------------------------------------------------------------------

/// Stop-and-wait send-side state for one session.
#[derive(Debug, Default)]
pub struct SendState {
    current: Bit,
    unacked: Option<RetransmitEntry>,
}

impl SendState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bit carried by the next (or current in-flight) unit.
    pub fn current_bit(&self) -> Bit {
        self.current
    }

    pub fn build_data_packet(&self, payload: Vec<u8>) -> DataPacket {
        DataPacket::new(self.current, payload)
    }

    /// Store the encoded unit in the in-flight slot (first transmission).
    ///
    /// Replaces any unit left behind by a send that failed with a transport
    /// error; such a session should not be reused.
    pub fn record_sent(&mut self, bytes: Vec<u8>) {
        self.unacked = Some(RetransmitEntry { bytes, tx_count: 1 });
    }

    /// Classify an ack and, if it confirms the in-flight unit, advance.
    pub fn on_ack(&mut self, ack: &AckPacket) -> AckVerdict {
        if self.unacked.is_none() {
            return AckVerdict::Idle;
        }
        if ack.corrupted {
            return AckVerdict::Corrupted;
        }
        if ack.ack != self.current {
            return AckVerdict::Stale;
        }
        self.unacked = None;
        self.current.flip();
        AckVerdict::Confirmed
    }

    /// Record one more transmission of the in-flight unit.
    pub fn on_retransmit(&mut self) {
        if let Some(ref mut e) = self.unacked {
            e.tx_count += 1;
        }
    }

    /// Drop the in-flight unit without flipping the bit.
    pub fn abandon(&mut self) -> Option<RetransmitEntry> {
        self.unacked.take()
    }

    pub fn in_flight(&self) -> Option<&RetransmitEntry> {
        self.unacked.as_ref()
    }

    /// Returns the number of times the in-flight unit has been sent,
    /// or `0` if the sender is idle.
    pub fn retransmit_count(&self) -> u32 {
        self.unacked.as_ref().map_or(0, |e| e.tx_count)
    }

    pub fn has_unacked(&self) -> bool {
        self.unacked.is_some()
    }
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Per-session counters, mostly useful in tests and logs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// Every data unit put on the wire, first sends and resends alike.
    pub transmissions: u64,
    pub retransmissions: u64,
    /// Units confirmed by a matching ack, end-of-stream included.
    pub confirmed: u64,
    pub stale_acks: u64,
    pub corrupted_acks: u64,
}

enum Delivery {
    Confirmed,
    /// The attempt budget ran out before an ack arrived.
    Abandoned,
}

/// Reliable sending endpoint.  Owns its transport exclusively.
#[derive(Debug)]
pub struct Sender<T> {
    udt: Udt<T>,
    state: SendState,
    timer: RetransmitTimer,
    config: RdtConfig,
    stats: SenderStats,
}

impl<T: Transport> Sender<T> {
    pub fn new(transport: T, config: RdtConfig) -> Self {
        Self {
            udt: Udt::new(transport),
            state: SendState::new(),
            timer: RetransmitTimer::new(config.retransmit_timeout),
            config,
            stats: SenderStats::default(),
        }
    }

    pub fn current_bit(&self) -> Bit {
        self.state.current_bit()
    }

    pub fn stats(&self) -> SenderStats {
        self.stats
    }

    pub fn transport(&self) -> &T {
        self.udt.transport()
    }

    /// Deliver `payload` reliably.  Returns only once the receiver has
    /// acknowledged it.
    ///
    /// An empty payload is ignored: the zero-length unit is reserved for
    /// [`Sender::close`].  Loss and corruption are retried indefinitely;
    /// only transport failures and unframeable payloads are returned.
    pub async fn send(&mut self, payload: &[u8]) -> Result<()> {
        if payload.is_empty() {
            log::debug!("[rdt] empty send ignored");
            return Ok(());
        }
        self.deliver(payload.to_vec(), None).await.map(|_| ())
    }

    /// Send end-of-stream and release the transport.
    ///
    /// Blocks until the end-of-stream unit is acknowledged or the peer is
    /// seen to have closed, which counts as confirmation.
    pub async fn close(mut self) -> Result<SenderStats> {
        let outcome = match self.deliver(Vec::new(), self.config.close_attempts).await {
            Ok(Delivery::Confirmed) => {
                log::debug!("[rdt] ← ACK of end-of-stream");
                Ok(())
            }
            Ok(Delivery::Abandoned) => {
                log::warn!("[rdt] end-of-stream not ACKed; force-closing");
                Ok(())
            }
            Err(e) if e.is_peer_closed() => {
                log::debug!("[rdt] peer closed during close handshake");
                self.timer.cancel();
                self.state.abandon();
                Ok(())
            }
            Err(e) => Err(e),
        };

        let released = self.udt.close().await;
        outcome?;
        released?;

        log::info!(
            "[rdt] sender closed: {} confirmed, {} sent, {} retransmitted",
            self.stats.confirmed,
            self.stats.transmissions,
            self.stats.retransmissions
        );
        Ok(self.stats)
    }

    /// Transmit one unit and wait for its ack, retransmitting on timeout.
    ///
    /// With `max_tx` set, gives up after that many transmissions.
    async fn deliver(&mut self, payload: Vec<u8>, max_tx: Option<u32>) -> Result<Delivery> {
        let packet = self.state.build_data_packet(payload);
        let (seq, len) = (packet.seq, packet.len());
        let bytes = Packet::Data(packet).encode()?;
        log::debug!("[rdt] → DATA seq={seq} len={len}");
        self.state.record_sent(bytes);
        self.transmit().await?;

        self.timer.arm();
        loop {
            let waited = match self.timer.deadline() {
                Some(deadline) => timeout_at(deadline, self.udt.recv_ack()).await,
                None => Ok(self.udt.recv_ack().await),
            };
            match waited {
                Ok(ack) => {
                    let ack = ack?;
                    match self.state.on_ack(&ack) {
                        AckVerdict::Confirmed => {
                            self.timer.cancel();
                            self.stats.confirmed += 1;
                            log::debug!("[rdt] ← ACK ack={} confirmed", ack.ack);
                            return Ok(Delivery::Confirmed);
                        }
                        AckVerdict::Corrupted => {
                            self.stats.corrupted_acks += 1;
                            log::debug!("[rdt] ← corrupted ACK; still waiting");
                        }
                        AckVerdict::Stale => {
                            self.stats.stale_acks += 1;
                            log::debug!("[rdt] ← stale ACK ack={}; still waiting", ack.ack);
                        }
                        AckVerdict::Idle => {}
                    }
                }
                Err(_elapsed) => {
                    if max_tx.is_some_and(|max| self.state.retransmit_count() >= max) {
                        self.timer.cancel();
                        self.state.abandon();
                        return Ok(Delivery::Abandoned);
                    }
                    self.state.on_retransmit();
                    self.stats.retransmissions += 1;
                    log::debug!(
                        "[rdt] timeout — retransmitting seq={} (tx #{})",
                        self.state.current_bit(),
                        self.state.retransmit_count()
                    );
                    self.transmit().await?;
                    self.timer.arm();
                }
            }
        }
    }

    /// Put the stored bytes of the in-flight unit on the wire.
    async fn transmit(&mut self) -> Result<()> {
        let Some(entry) = self.state.in_flight() else {
            return Ok(());
        };
        self.udt
            .send_encoded(&entry.bytes)
            .await
            .map_err(RdtError::from)?;
        self.stats.transmissions += 1;
        Ok(())
    }
}
