//! Alternating-bit finite-state machine (FSM) types.
//!
//! The classical RDT 3.0 sender has four states and the receiver two.  Each
//! pair differs only by the sequence bit, so both are modelled as a state
//! parameterised by [`SeqBit`].  Transitions live in [`crate::sender`] and
//! [`crate::receiver`].
//!
//! ```text
//!  sender:   WaitForCall(0) ──send──▶ WaitForAck(0) ──ACK 0──▶ WaitForCall(1)
//!                 ▲                                                  │
//!                 └──────── ACK 1 ◀── WaitForAck(1) ◀──send──────────┘
//!
//!  receiver: WaitForBelow(0) ──deliver seq 0──▶ WaitForBelow(1)
//!                 ▲                                  │
//!                 └────────── deliver seq 1 ─────────┘
//! ```

use std::fmt;

use crate::packet::SeqBit;

/// Send-side states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    /// Idle; the next message will carry this bit.
    WaitForCall(SeqBit),
    /// A packet with this bit is in flight and unacknowledged.
    WaitForAck(SeqBit),
}

impl SenderState {
    /// Sequence bit the state is parameterised by.
    pub fn seq_bit(self) -> SeqBit {
        match self {
            Self::WaitForCall(bit) | Self::WaitForAck(bit) => bit,
        }
    }
}

impl Default for SenderState {
    fn default() -> Self {
        Self::WaitForCall(SeqBit::Zero)
    }
}

impl fmt::Display for SenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WaitForCall(bit) => write!(f, "wait-for-call-{bit}"),
            Self::WaitForAck(bit) => write!(f, "wait-for-ack-{bit}"),
        }
    }
}

/// Receive-side states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// Waiting for the packet with this bit from below.
    WaitForBelow(SeqBit),
}

impl ReceiverState {
    pub fn expected(self) -> SeqBit {
        match self {
            Self::WaitForBelow(bit) => bit,
        }
    }
}

impl Default for ReceiverState {
    fn default() -> Self {
        Self::WaitForBelow(SeqBit::Zero)
    }
}

impl fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WaitForBelow(bit) => write!(f, "wait-for-{bit}-from-below"),
        }
    }
}
