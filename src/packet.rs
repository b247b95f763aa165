//! Wire-format definitions for RDT 3.0 packets.
//!
//! Every datagram exchanged between the two engines is a [`Packet`].  This
//! module is responsible for:
//! - Defining the on-wire binary layout (magic tag, checksum, flags, payload).
//! - Building data and ACK packets with the Internet checksum filled in.
//! - Accepting a raw datagram as a [`Packet`], rejecting framing noise.
//! - Verifying checksums and extracting the ACK and sequence bits.
//!
//! No I/O happens here; this is pure data transformation.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! ```text
//!  0               1               2               3
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                   Magic tag "COMPNETW" (8 bytes)              |
//! +                                                               +
//! |                                                               |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           Checksum            |     Total length      |A|S|
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                        Payload ...                            |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The flags word packs `total_length << 2 | ack << 1 | seq`.  The total
//! length counts the magic tag, the flags word and the payload; the checksum
//! field itself is not included.
//!
//! Total header size: [`HEADER_LEN`] = 12 bytes.

use std::fmt;

use thiserror::Error;

/// Framing sentinel carried by every conforming packet.
pub const MAGIC: [u8; 8] = *b"COMPNETW";

/// Byte length of the fixed-size header on the wire.
pub const HEADER_LEN: usize = 12;

// Byte offsets of each field within the serialised header.
const OFF_MAGIC: usize = 0;
const OFF_CHECKSUM: usize = 8;
const OFF_FLAGS: usize = 10;

const FLAGS_LEN: usize = 2;
const LENGTH_SHIFT: u16 = 2;
const ACK_MASK: u16 = 0b10;
const SEQ_MASK: u16 = 0b01;

/// Largest value the 14-bit length sub-field can hold.
pub const MAX_TOTAL_LENGTH: usize = (u16::MAX >> LENGTH_SHIFT) as usize;

/// Largest payload that still produces a reversible encoding.
pub const MAX_PAYLOAD: usize = MAX_TOTAL_LENGTH - MAGIC.len() - FLAGS_LEN;

// ---------------------------------------------------------------------------
// SeqBit
// ---------------------------------------------------------------------------

/// The alternating one-bit sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SeqBit {
    #[default]
    Zero,
    One,
}

impl SeqBit {
    /// The other sequence slot.
    #[must_use]
    pub fn flip(self) -> Self {
        match self {
            SeqBit::Zero => SeqBit::One,
            SeqBit::One => SeqBit::Zero,
        }
    }

    /// Take the lowest bit of `bits`.
    pub fn from_bit(bits: u16) -> Self {
        if bits & 1 == 0 {
            SeqBit::Zero
        } else {
            SeqBit::One
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            SeqBit::Zero => 0,
            SeqBit::One => 1,
        }
    }
}

impl fmt::Display for SeqBit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can arise when building or framing a datagram.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    /// Payload does not fit in the 14-bit length sub-field.
    #[error("payload of {0} bytes exceeds the maximum payload size")]
    PayloadTooLarge(usize),
    /// Buffer shorter than the fixed header size.
    #[error("datagram of {0} bytes is too short to contain a header")]
    Truncated(usize),
    /// The first eight bytes are not the protocol's magic tag.
    #[error("magic tag mismatch")]
    BadMagic,
    /// The length sub-field disagrees with the datagram size.
    #[error("length field says {declared} bytes but datagram carries {actual}")]
    LengthMismatch { declared: usize, actual: usize },
}

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

/// A complete encoded datagram.
///
/// A `Packet` is immutable once built: it owns exactly the bytes that go on
/// the wire, so retransmitting it resends the original bytes unchanged.
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    bytes: Vec<u8>,
}

impl Packet {
    /// Build a data packet carrying `payload` in sequence slot `seq`.
    pub fn data(payload: &[u8], seq: SeqBit) -> Result<Self, PacketError> {
        Self::build(payload, false, seq)
    }

    /// Build a pure acknowledgment for sequence slot `seq`.
    pub fn ack(seq: SeqBit) -> Self {
        Self::encode(&[], true, seq)
    }

    /// Build a packet with an arbitrary ACK bit.
    ///
    /// The checksum is computed over the assembled packet with its own field
    /// zeroed, then written back.
    pub fn build(payload: &[u8], ack: bool, seq: SeqBit) -> Result<Self, PacketError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(PacketError::PayloadTooLarge(payload.len()));
        }
        Ok(Self::encode(payload, ack, seq))
    }

    fn encode(payload: &[u8], ack: bool, seq: SeqBit) -> Self {
        let total_len = (MAGIC.len() + FLAGS_LEN + payload.len()) as u16;
        let flags = (total_len << LENGTH_SHIFT) | (u16::from(ack) << 1) | u16::from(seq.as_u8());

        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(&MAGIC);
        // Checksum field is zero while computing the checksum.
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(&flags.to_be_bytes());
        bytes.extend_from_slice(payload);

        let csum = internet_checksum(&bytes);
        bytes[OFF_CHECKSUM..OFF_CHECKSUM + 2].copy_from_slice(&csum.to_be_bytes());

        Self { bytes }
    }

    /// Accept a raw datagram as a packet.
    ///
    /// Returns [`Err`] if:
    /// - `buf` is shorter than [`HEADER_LEN`],
    /// - the magic tag is wrong, or
    /// - the length sub-field disagrees with `buf.len()`.
    ///
    /// The checksum is **not** checked here; see [`Packet::verify_checksum`].
    pub fn decode(buf: &[u8]) -> Result<Self, PacketError> {
        if buf.len() < HEADER_LEN {
            return Err(PacketError::Truncated(buf.len()));
        }
        if buf[OFF_MAGIC..OFF_MAGIC + MAGIC.len()] != MAGIC {
            return Err(PacketError::BadMagic);
        }

        let declared = usize::from(read_flags(buf) >> LENGTH_SHIFT);
        let actual = buf.len() - 2;
        if declared != actual {
            return Err(PacketError::LengthMismatch { declared, actual });
        }

        Ok(Self {
            bytes: buf.to_vec(),
        })
    }

    /// The bytes that go on the wire.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The checksum stored in the header.
    pub fn checksum(&self) -> u16 {
        u16::from_be_bytes([self.bytes[OFF_CHECKSUM], self.bytes[OFF_CHECKSUM + 1]])
    }

    /// Value of the `total_length` sub-field.
    pub fn total_length(&self) -> usize {
        usize::from(read_flags(&self.bytes) >> LENGTH_SHIFT)
    }

    /// `true` when the ACK bit is set.
    pub fn is_ack(&self) -> bool {
        read_flags(&self.bytes) & ACK_MASK != 0
    }

    pub fn seq_bit(&self) -> SeqBit {
        SeqBit::from_bit(read_flags(&self.bytes) & SEQ_MASK)
    }

    /// Payload bytes; empty for pure ACKs.
    pub fn payload(&self) -> &[u8] {
        &self.bytes[HEADER_LEN.min(self.bytes.len())..]
    }

    /// `true` only when the stored checksum matches a recomputation.
    pub fn verify_checksum(&self) -> bool {
        verify_checksum(&self.bytes)
    }

    /// Copy of this packet with bit `bit` of the encoding inverted.
    ///
    /// Bit 0 is the most significant bit of the first byte; indices wrap
    /// around the packet length.  The copy may no longer decode.
    #[must_use]
    pub fn with_bit_flipped(&self, bit: usize) -> Self {
        let mut bytes = self.bytes.clone();
        if !bytes.is_empty() {
            let bit = bit % (bytes.len() * 8);
            bytes[bit / 8] ^= 0x80 >> (bit % 8);
        }
        Self { bytes }
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("ack", &self.is_ack())
            .field("seq", &self.seq_bit())
            .field("total_length", &self.total_length())
            .field("checksum", &format_args!("{:#06x}", self.checksum()))
            .field("payload_len", &self.payload().len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Free-standing codec operations
// ---------------------------------------------------------------------------

/// Assemble a packet with the given ACK and sequence bits.
pub fn build_data_packet(payload: &[u8], ack: bool, seq: SeqBit) -> Result<Packet, PacketError> {
    Packet::build(payload, ack, seq)
}

/// Assemble a pure ACK for `seq`.
pub fn build_ack_packet(seq: SeqBit) -> Packet {
    Packet::ack(seq)
}

/// Verify the checksum of a raw datagram.
///
/// The stored checksum is compared with one recomputed over `bytes` with the
/// checksum field zeroed.  Datagrams too short to hold the field fail.
pub fn verify_checksum(bytes: &[u8]) -> bool {
    if bytes.len() < OFF_CHECKSUM + 2 {
        return false;
    }
    let stored = [bytes[OFF_CHECKSUM], bytes[OFF_CHECKSUM + 1]];

    let mut scratch = bytes.to_vec();
    scratch[OFF_CHECKSUM..OFF_CHECKSUM + 2].copy_from_slice(&[0, 0]);
    internet_checksum(&scratch).to_be_bytes() == stored
}

/// Sequence bit of a raw datagram, or `None` if it has no flags word.
pub fn extract_seq_bit(bytes: &[u8]) -> Option<SeqBit> {
    (bytes.len() >= HEADER_LEN).then(|| SeqBit::from_bit(read_flags(bytes) & SEQ_MASK))
}

/// ACK bit of a raw datagram, or `None` if it has no flags word.
pub fn extract_ack_bit(bytes: &[u8]) -> Option<bool> {
    (bytes.len() >= HEADER_LEN).then(|| read_flags(bytes) & ACK_MASK != 0)
}

/// Compute the Internet checksum (RFC 1071) over `data`.
///
/// Sum consecutive 16-bit big-endian words with end-around carry after each
/// addition, then return the one's-complement.  An odd trailing byte is
/// padded with a zero byte on the right.  The caller must zero any checksum
/// field within `data` before calling this function.
pub fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;

    for word in data.chunks(2) {
        let hi = word[0];
        let lo = word.get(1).copied().unwrap_or(0);
        sum += u32::from(u16::from_be_bytes([hi, lo]));
        sum = (sum & 0xffff) + (sum >> 16);
    }

    !(sum as u16)
}

fn read_flags(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[OFF_FLAGS], bytes[OFF_FLAGS + 1]])
}
