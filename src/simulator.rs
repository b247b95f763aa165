//! Fault-injecting channel for deterministic testing.
//!
//! Real networks drop and damage datagrams.  To exercise the recovery paths
//! without depending on actual network conditions, [`Simulator`] wraps any
//! [`Transport`] and applies a [`FaultPolicy`] to every **outbound**
//! datagram:
//!
//! | Fault            | Effect on the wire                               |
//! |------------------|--------------------------------------------------|
//! | `Pass`           | Sent unchanged.                                  |
//! | `Drop`           | Never sent; the peer sees silence.               |
//! | `Corrupt`        | One bit of the encoding is inverted.             |
//!
//! Inbound datagrams pass straight through.  Wrapping the receiver's
//! transport damages ACKs; wrapping the sender's damages data packets.

use std::net::SocketAddr;
use std::sync::Mutex;

use crate::fault::{Fault, FaultPolicy};
use crate::packet::{Packet, HEADER_LEN};
use crate::socket::{SocketError, Transport};

struct Schedule {
    policy: Box<dyn FaultPolicy>,
    sent: u64,
}

/// A fault-injecting wrapper around another transport.
pub struct Simulator<T> {
    inner: T,
    schedule: Mutex<Schedule>,
}

impl<T: Transport> Simulator<T> {
    pub fn new(inner: T, policy: impl FaultPolicy + 'static) -> Self {
        Self {
            inner,
            schedule: Mutex::new(Schedule {
                policy: Box::new(policy),
                sent: 0,
            }),
        }
    }

    /// Datagrams offered for sending so far, dropped ones included.
    pub fn offered(&self) -> u64 {
        self.schedule.lock().map_or(0, |s| s.sent)
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    fn next_fault(&self) -> (u64, Fault) {
        // A poisoned lock only means a policy panicked; keep the schedule.
        let mut schedule = self.schedule.lock().unwrap_or_else(|e| e.into_inner());
        schedule.sent += 1;
        let n = schedule.sent;
        (n, schedule.policy.decide(n))
    }
}

impl<T: Transport> Transport for Simulator<T> {
    fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr()
    }

    async fn send_to(&self, packet: &Packet, dest: SocketAddr) -> Result<(), SocketError> {
        let (n, fault) = self.next_fault();
        match fault {
            Fault::Pass => self.inner.send_to(packet, dest).await,
            Fault::Drop => {
                log::debug!("[simulator] dropped datagram #{n} to {dest}");
                Ok(())
            }
            Fault::Corrupt => {
                // Damage the checksum or payload region so the packet still
                // frames correctly and is caught by checksum verification.
                let bit = corruptible_bit(packet, n);
                log::debug!("[simulator] corrupted datagram #{n} to {dest} at bit {bit}");
                self.inner
                    .send_to(&packet.with_bit_flipped(bit), dest)
                    .await
            }
        }
    }

    async fn recv_from(&self) -> Result<(Packet, SocketAddr), SocketError> {
        self.inner.recv_from().await
    }
}

/// Pick a bit in the checksum field or the payload, varying with `n`.
fn corruptible_bit(packet: &Packet, n: u64) -> usize {
    const CHECKSUM_BITS: std::ops::Range<usize> = 64..80;
    let payload_bits = packet.len().saturating_sub(HEADER_LEN) * 8;
    let span = CHECKSUM_BITS.len() + payload_bits;
    let k = (n as usize).wrapping_mul(7) % span;
    if k < CHECKSUM_BITS.len() {
        CHECKSUM_BITS.start + k
    } else {
        HEADER_LEN * 8 + (k - CHECKSUM_BITS.len())
    }
}
