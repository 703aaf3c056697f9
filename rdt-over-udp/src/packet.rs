//! Wire-format definitions for data and acknowledgement units.
//!
//! Every datagram exchanged between peers is a [`Packet`]: either a
//! [`DataPacket`] travelling sender → receiver or an [`AckPacket`] travelling
//! back.  This module is responsible for:
//! - Defining the on-wire binary layout.
//! - Serialising a [`Packet`] into a byte buffer ready for transmission.
//! - Deserialising a raw byte slice back into a [`Packet`], returning errors
//!   for malformed, truncated, or damaged input.
//!
//! No I/O happens here; this is pure data transformation.  Turning a decode
//! failure into a `corrupted` unit is the job of [`crate::udt`].
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Kind      |      Bit      |         Payload Length        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           Checksum            |          Payload ...          |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Total header size: [`HEADER_LEN`] = 6 bytes.
//! kind(1) + bit(1) + payload_len(2) + checksum(2)

use thiserror::Error;

/// Unit-kind constants for the `kind` header field.
pub mod kind {
    /// Data unit carrying an application payload (empty = end-of-stream).
    pub const DATA: u8 = 0x01;
    /// Acknowledgement of a data unit.
    pub const ACK: u8 = 0x02;
}

/// Byte length of the fixed-size header on the wire.
pub const HEADER_LEN: usize = 6;

/// Largest datagram that fits in a single IPv4 UDP packet.
pub const MAX_DATAGRAM: usize = 65_507;

/// Largest payload a single data unit may carry.
pub const MAX_PAYLOAD: usize = MAX_DATAGRAM - HEADER_LEN;

// Byte offsets of each field within the serialised header.
const OFF_KIND: usize = 0;
const OFF_BIT: usize = 1;
const OFF_PAYLOAD_LEN: usize = 2;
const OFF_CHECKSUM: usize = 4;

// ---------------------------------------------------------------------------
// Bit
// ---------------------------------------------------------------------------

/// The one-bit sequence space of the alternating-bit protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Bit {
    #[default]
    Zero,
    One,
}

impl Bit {
    /// The other bit: `0 → 1`, `1 → 0`.
    #[must_use]
    pub fn alternate(self) -> Self {
        match self {
            Bit::Zero => Bit::One,
            Bit::One => Bit::Zero,
        }
    }

    /// Flip in place and return the new value.
    pub fn flip(&mut self) -> Self {
        *self = self.alternate();
        *self
    }

    fn to_wire(self) -> u8 {
        match self {
            Bit::Zero => 0,
            Bit::One => 1,
        }
    }

    fn from_wire(byte: u8) -> Result<Self, PacketError> {
        match byte {
            0 => Ok(Bit::Zero),
            1 => Ok(Bit::One),
            other => Err(PacketError::InvalidBit(other)),
        }
    }
}

impl std::fmt::Display for Bit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_wire())
    }
}

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

/// One application payload tagged with the sender's current sequence bit.
///
/// An empty payload marks the end of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPacket {
    pub seq: Bit,
    pub payload: Vec<u8>,
    /// Set by the receiving transport when the unit failed its integrity
    /// check.  Never encoded; always `false` on units built for sending.
    pub corrupted: bool,
}

impl DataPacket {
    pub fn new(seq: Bit, payload: Vec<u8>) -> Self {
        Self {
            seq,
            payload,
            corrupted: false,
        }
    }

    /// Placeholder for a datagram that could not be trusted.
    pub fn corrupted() -> Self {
        Self {
            seq: Bit::Zero,
            payload: Vec::new(),
            corrupted: true,
        }
    }

    /// Byte count of the payload.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// `true` for the end-of-stream marker.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Acknowledgement echoing the sequence bit of the data unit it confirms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckPacket {
    pub ack: Bit,
    /// Set by the receiving transport; never encoded.
    pub corrupted: bool,
}

impl AckPacket {
    pub fn new(ack: Bit) -> Self {
        Self {
            ack,
            corrupted: false,
        }
    }

    pub fn corrupted() -> Self {
        Self {
            ack: Bit::Zero,
            corrupted: true,
        }
    }

    /// Ack units have no payload, so encoding cannot fail.
    pub fn encode(&self) -> Vec<u8> {
        write_frame(kind::ACK, self.ack, &[])
    }
}

/// A complete protocol datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Data(DataPacket),
    Ack(AckPacket),
}

impl Packet {
    /// Serialise this packet into a newly allocated byte vector.
    ///
    /// The `corrupted` flag is receive-side state and is not written.
    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        match self {
            Packet::Data(d) if d.payload.len() > MAX_PAYLOAD => {
                Err(PacketError::PayloadTooLarge(d.payload.len()))
            }
            Packet::Data(d) => Ok(write_frame(kind::DATA, d.seq, &d.payload)),
            Packet::Ack(a) => Ok(a.encode()),
        }
    }

    /// Parse a [`Packet`] from a raw byte slice.
    ///
    /// The checksum is verified before any field is interpreted, so a damaged
    /// datagram always yields [`PacketError::ChecksumFailed`] rather than a
    /// plausible-looking unit.
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < HEADER_LEN {
            return Err(PacketError::BufferTooShort);
        }

        let payload_len =
            u16::from_be_bytes([buf[OFF_PAYLOAD_LEN], buf[OFF_PAYLOAD_LEN + 1]]) as usize;
        let checksum = u16::from_be_bytes([buf[OFF_CHECKSUM], buf[OFF_CHECKSUM + 1]]);

        if buf.len() != HEADER_LEN + payload_len {
            return Err(PacketError::LengthMismatch);
        }

        let mut scratch = buf.to_vec();
        scratch[OFF_CHECKSUM..OFF_CHECKSUM + 2].copy_from_slice(&[0, 0]);
        if internet_checksum(&scratch) != checksum {
            return Err(PacketError::ChecksumFailed);
        }

        let bit = Bit::from_wire(buf[OFF_BIT])?;
        match buf[OFF_KIND] {
            kind::DATA => Ok(Packet::Data(DataPacket::new(bit, buf[HEADER_LEN..].to_vec()))),
            kind::ACK if payload_len == 0 => Ok(Packet::Ack(AckPacket::new(bit))),
            kind::ACK => Err(PacketError::AckWithPayload),
            other => Err(PacketError::UnknownKind(other)),
        }
    }
}

/// Errors that can arise when building or parsing a datagram.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("buffer too short to contain a header")]
    BufferTooShort,
    #[error("payload_len field does not match remaining bytes")]
    LengthMismatch,
    #[error("checksum verification failed")]
    ChecksumFailed,
    #[error("unknown unit kind {0:#04x}")]
    UnknownKind(u8),
    #[error("sequence bit must be 0 or 1, got {0}")]
    InvalidBit(u8),
    #[error("ack unit carries a payload")]
    AckWithPayload,
    #[error("payload of {0} bytes exceeds the {MAX_PAYLOAD}-byte limit")]
    PayloadTooLarge(usize),
}

/// Lay out header and payload, then fill in the checksum.
fn write_frame(kind: u8, bit: Bit, payload: &[u8]) -> Vec<u8> {
    debug_assert!(payload.len() <= MAX_PAYLOAD);
    let mut buf = vec![0u8; HEADER_LEN + payload.len()];
    buf[OFF_KIND] = kind;
    buf[OFF_BIT] = bit.to_wire();
    buf[OFF_PAYLOAD_LEN..OFF_PAYLOAD_LEN + 2]
        .copy_from_slice(&(payload.len() as u16).to_be_bytes());
    // Checksum field is zero while computing the checksum.
    buf[HEADER_LEN..].copy_from_slice(payload);

    let csum = internet_checksum(&buf);
    buf[OFF_CHECKSUM..OFF_CHECKSUM + 2].copy_from_slice(&csum.to_be_bytes());
    buf
}

/// Compute the Internet checksum (RFC 1071) over `data`.
///
/// The caller must zero the checksum field within `data` first.
fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(2);
    for word in &mut chunks {
        sum += u32::from(u16::from_be_bytes([word[0], word[1]]));
    }
    // Odd trailing byte: pad with a zero byte on the right.
    if let [last] = chunks.remainder() {
        sum += u32::from(*last) << 8;
    }

    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }

    !(sum as u16)
}
