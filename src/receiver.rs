//! Receive-side alternating-bit state machine.
//!
//! The [`Receiver`] is responsible for everything that happens *after* a raw
//! datagram is accepted as a [`crate::packet::Packet`] and *before* the
//! payload is handed upward:
//! - Counting inbound datagrams and consulting the fault schedule.
//! - Validating the checksum.
//! - Detecting and discarding duplicates of already-delivered packets.
//! - Choosing the sequence bit of the ACK to send back.
//!
//! The [`Receiver`] does **not** send ACKs itself; it returns a [`Reaction`]
//! that [`crate::connection::RdtReceiver`] carries out.

use crate::fault::{EveryNth, Fault, FaultPolicy};
use crate::packet::{Packet, SeqBit};
use crate::state::ReceiverState;

/// Why a datagram was or was not delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// In-order payload, handed upward exactly once.
    Delivered(Vec<u8>),
    /// Fault schedule treated the datagram as lost.
    SimulatedLoss,
    /// Fault schedule treated the datagram as corrupted.
    SimulatedCorruption,
    /// Checksum did not verify.
    Corrupt,
    /// Sequence bit of an already-delivered packet.
    Duplicate(SeqBit),
}

/// What the engine must do in response to one datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub outcome: Outcome,
    /// Sequence bit to acknowledge, or `None` to stay silent.
    pub ack: Option<SeqBit>,
}

/// Alternating-bit receive-side state for one session.
pub struct Receiver {
    state: ReceiverState,
    /// Datagrams seen, including lost and corrupted ones.
    packets_received: u64,
    /// Payloads handed upward.
    delivered: u64,
    faults: Box<dyn FaultPolicy>,
}

impl Receiver {
    /// Create a receiver expecting bit 0 with the given fault schedule.
    pub fn new(faults: Box<dyn FaultPolicy>) -> Self {
        Self {
            state: ReceiverState::default(),
            packets_received: 0,
            delivered: 0,
            faults,
        }
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    /// Sequence bit of the next packet to deliver.
    pub fn expected_seq_bit(&self) -> SeqBit {
        self.state.expected()
    }

    pub fn packets_received(&self) -> u64 {
        self.packets_received
    }

    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Process one inbound datagram.
    ///
    /// Every failure re-acknowledges the last delivered bit
    /// (`1 - expected`); only an intact, in-order packet is delivered,
    /// acknowledged with its own bit, and flips the expected bit.
    pub fn on_packet(&mut self, packet: &Packet) -> Reaction {
        self.packets_received += 1;
        let expected = self.expected_seq_bit();
        let last_good = expected.flip();

        match self.faults.decide(self.packets_received) {
            Fault::Drop => {
                return Reaction {
                    outcome: Outcome::SimulatedLoss,
                    ack: None,
                }
            }
            Fault::Corrupt => {
                return Reaction {
                    outcome: Outcome::SimulatedCorruption,
                    ack: Some(last_good),
                }
            }
            Fault::Pass => {}
        }

        if !packet.verify_checksum() {
            return Reaction {
                outcome: Outcome::Corrupt,
                ack: Some(last_good),
            };
        }

        let seq = packet.seq_bit();
        if seq != expected {
            return Reaction {
                outcome: Outcome::Duplicate(seq),
                ack: Some(last_good),
            };
        }

        self.delivered += 1;
        self.state = ReceiverState::WaitForBelow(last_good);
        Reaction {
            outcome: Outcome::Delivered(packet.payload().to_vec()),
            ack: Some(expected),
        }
    }
}

impl Default for Receiver {
    /// Reference behavior: drop every 6th datagram, corrupt every 3rd.
    fn default() -> Self {
        Self::new(Box::new(EveryNth::REFERENCE))
    }
}

impl std::fmt::Debug for Receiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver")
            .field("state", &self.state)
            .field("packets_received", &self.packets_received)
            .field("delivered", &self.delivered)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::{NoFaults, Schedule};

    fn clean() -> Receiver {
        Receiver::new(Box::new(NoFaults))
    }

    fn data(payload: &[u8], seq: SeqBit) -> Packet {
        Packet::data(payload, seq).unwrap()
    }

    #[test]
    fn in_order_packet_is_delivered_and_acked() {
        let mut r = clean();
        let reaction = r.on_packet(&data(b"hello", SeqBit::Zero));
        assert_eq!(reaction.outcome, Outcome::Delivered(b"hello".to_vec()));
        assert_eq!(reaction.ack, Some(SeqBit::Zero));
        assert_eq!(r.expected_seq_bit(), SeqBit::One);
        assert_eq!(r.delivered(), 1);
    }

    #[test]
    fn duplicate_is_reacked_but_not_redelivered() {
        let mut r = clean();
        let pkt = data(b"once", SeqBit::Zero);

        let first = r.on_packet(&pkt);
        let second = r.on_packet(&pkt);

        assert_eq!(first.outcome, Outcome::Delivered(b"once".to_vec()));
        assert_eq!(second.outcome, Outcome::Duplicate(SeqBit::Zero));
        assert_eq!(first.ack, Some(SeqBit::Zero));
        assert_eq!(second.ack, Some(SeqBit::Zero));
        assert_eq!(r.delivered(), 1);
        assert_eq!(r.packets_received(), 2);
    }

    #[test]
    fn corrupt_packet_reacks_previous_bit() {
        let mut r = clean();
        let pkt = data(b"mangled", SeqBit::Zero).with_bit_flipped(100);
        let reaction = r.on_packet(&pkt);
        assert_eq!(reaction.outcome, Outcome::Corrupt);
        assert_eq!(reaction.ack, Some(SeqBit::One));
        assert_eq!(r.expected_seq_bit(), SeqBit::Zero);
    }

    #[test]
    fn expected_bit_alternates() {
        let mut r = clean();
        let mut seen = vec![r.expected_seq_bit()];
        let mut bit = SeqBit::Zero;
        for i in 0..5 {
            r.on_packet(&data(format!("m{i}").as_bytes(), bit));
            bit = bit.flip();
            seen.push(r.expected_seq_bit());
        }
        use SeqBit::*;
        assert_eq!(seen, vec![Zero, One, Zero, One, Zero, One]);
    }

    #[test]
    fn simulated_faults_follow_the_schedule() {
        let mut r = Receiver::new(Box::new(Schedule::new([Fault::Drop, Fault::Corrupt])));
        let pkt = data(b"x", SeqBit::Zero);

        let lost = r.on_packet(&pkt);
        assert_eq!(lost.outcome, Outcome::SimulatedLoss);
        assert_eq!(lost.ack, None);

        let corrupted = r.on_packet(&pkt);
        assert_eq!(corrupted.outcome, Outcome::SimulatedCorruption);
        assert_eq!(corrupted.ack, Some(SeqBit::One));

        let delivered = r.on_packet(&pkt);
        assert_eq!(delivered.outcome, Outcome::Delivered(b"x".to_vec()));
    }

    #[test]
    fn reference_receiver_drops_sixth_and_corrupts_third() {
        let mut r = Receiver::default();
        let mut bit = SeqBit::Zero;
        let mut outcomes = Vec::new();
        for _ in 0..6 {
            let reaction = r.on_packet(&data(b"p", bit));
            if matches!(reaction.outcome, Outcome::Delivered(_)) {
                bit = bit.flip();
            }
            outcomes.push(reaction.outcome);
        }
        assert_eq!(outcomes[2], Outcome::SimulatedCorruption);
        assert_eq!(outcomes[5], Outcome::SimulatedLoss);
        assert_eq!(r.delivered(), 4);
    }
}
