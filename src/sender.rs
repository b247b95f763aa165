//! Send-side alternating-bit state machine.
//!
//! [`Sender`] tracks the current sequence bit and the single in-flight
//! packet.  It does **not** touch the transport; [`crate::connection::RdtSender`]
//! calls these methods and owns the actual send/receive loop.
//!
//! # Stop-and-Wait contract
//! - At most **one** packet is in flight at any moment (`unacked`).
//! - Building a new packet discards any packet still in flight.
//! - On a valid ACK: flip the sequence bit; clear `unacked`.
//! - On timeout or a rejected response: resend the same packet unchanged.

use crate::packet::{Packet, PacketError, SeqBit};
use crate::state::SenderState;

// ---------------------------------------------------------------------------
// RetransmitEntry
// ---------------------------------------------------------------------------

/// A packet that has been built but not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetransmitEntry {
    /// The packet on the wire.
    pub packet: Packet,
    /// How many times this packet has been transmitted (1 = first send).
    pub tx_count: u32,
}

/// How a response to the in-flight packet was judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckVerdict {
    /// Checksum valid, ACK bit set, sequence bit matches: delivery confirmed.
    Accepted,
    /// Checksum did not verify.
    Corrupt,
    /// A data packet arrived where an ACK was expected.
    NotAck,
    /// A valid ACK for the other sequence bit (the previous message).
    Stale(SeqBit),
    /// Nothing is in flight.
    Unsolicited,
}

impl AckVerdict {
    pub fn is_accepted(self) -> bool {
        self == Self::Accepted
    }
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Alternating-bit send-side state for one session.
#[derive(Debug, Default)]
pub struct Sender {
    state: SenderState,

    /// The in-flight packet, or `None` when the sender is idle.
    unacked: Option<RetransmitEntry>,

    /// Every transmission, retransmissions included.
    packets_sent: u64,
}

impl Sender {
    /// Create an idle sender whose first message will carry bit 0.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    /// The bit the current (or next) message carries.
    pub fn seq_bit(&self) -> SeqBit {
        self.state.seq_bit()
    }

    /// `true` when nothing is waiting for an ACK.
    pub fn is_acknowledged(&self) -> bool {
        self.unacked.is_none()
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    /// Build the data packet for `message` and place it in the in-flight slot.
    ///
    /// Returns a copy of the packet for the caller to transmit; every
    /// retransmission must reuse it.  A packet still in flight (its send was
    /// cancelled) is abandoned first, as by [`Sender::abandon`].
    pub fn begin(&mut self, message: &[u8]) -> Result<Packet, PacketError> {
        let seq = self.seq_bit();
        let packet = Packet::data(message, seq)?;
        if let Some(stale) = self.abandon() {
            log::debug!(
                "[sender] abandoning unacknowledged seq={} after {} transmission(s)",
                stale.packet.seq_bit(),
                stale.tx_count
            );
        }
        self.unacked = Some(RetransmitEntry {
            packet: packet.clone(),
            tx_count: 0,
        });
        self.state = SenderState::WaitForAck(seq);
        Ok(packet)
    }

    /// Record one (re)transmission of the in-flight packet.
    ///
    /// Returns the number of times it has now been sent.
    pub fn on_transmit(&mut self) -> u32 {
        self.packets_sent += 1;
        match self.unacked {
            Some(ref mut e) => {
                e.tx_count += 1;
                e.tx_count
            }
            None => 0,
        }
    }

    /// Judge a response to the in-flight packet.
    ///
    /// Only a response whose checksum verifies, whose ACK bit is set and
    /// whose sequence bit equals the in-flight bit is accepted.  On
    /// acceptance the in-flight slot is cleared and the bit flips.
    pub fn on_response(&mut self, response: &Packet) -> AckVerdict {
        let SenderState::WaitForAck(seq) = self.state else {
            return AckVerdict::Unsolicited;
        };

        let verdict = if !response.verify_checksum() {
            AckVerdict::Corrupt
        } else if !response.is_ack() {
            AckVerdict::NotAck
        } else if response.seq_bit() != seq {
            AckVerdict::Stale(response.seq_bit())
        } else {
            AckVerdict::Accepted
        };

        if verdict.is_accepted() {
            self.unacked = None;
            self.state = SenderState::WaitForCall(seq.flip());
        }
        verdict
    }

    /// Abandon the in-flight packet without changing the sequence bit.
    ///
    /// Used when a bounded retry policy gives up.  The peer may or may not
    /// have delivered the abandoned message, so pairing with the receiver's
    /// bit is no longer guaranteed after this call.
    pub fn abandon(&mut self) -> Option<RetransmitEntry> {
        self.state = SenderState::WaitForCall(self.seq_bit());
        self.unacked.take()
    }
}
