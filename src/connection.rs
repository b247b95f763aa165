//! Sender and receiver engines.
//!
//! An engine owns the complete state for one side of a session: the
//! alternating-bit state machine plus the one transport endpoint it talks
//! through.  Nothing is shared between engines, so any number of independent
//! sessions can coexist in one process.
//!
//! - [`RdtSender`] drives [`crate::sender::Sender`]: transmit, wait for a
//!   response with a deadline, retransmit the identical packet until an
//!   acceptable ACK arrives.
//! - [`RdtReceiver`] drives [`crate::receiver::Receiver`]: read a datagram,
//!   carry out the [`Reaction`] (ACK or silence), hand delivered payloads
//!   upward.

use std::net::SocketAddr;

use thiserror::Error;

use crate::fault::FaultPolicy;
use crate::packet::{Packet, PacketError, SeqBit};
use crate::receiver::{Outcome, Reaction, Receiver};
use crate::sender::Sender;
use crate::socket::{Socket, SocketError, Transport};
use crate::state::{ReceiverState, SenderState};
use crate::timer::{RetransmitTimer, TimerConfig};

/// Sender configuration: response deadline and optional attempt cap.
pub type SenderConfig = TimerConfig;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by [`RdtSender::send`].
///
/// Timeouts, corrupted ACKs and stale ACKs never appear here; they are
/// recovered by retransmission.
#[derive(Debug, Error)]
pub enum SendError {
    /// The message cannot be framed.
    #[error("cannot build packet: {0}")]
    Packet(#[from] PacketError),
    /// The transport failed outright.
    #[error("transport failure: {0}")]
    Socket(#[from] SocketError),
    /// The opt-in attempt cap was reached without an acceptable ACK.
    #[error("no acceptable ACK after {attempts} transmissions")]
    RetriesExhausted { attempts: u32 },
}

/// Errors surfaced by the receiver engine; only fatal transport failures.
#[derive(Debug, Error)]
pub enum ReceiveError {
    #[error("transport failure: {0}")]
    Socket(#[from] SocketError),
}

// ---------------------------------------------------------------------------
// RdtSender
// ---------------------------------------------------------------------------

/// Send side of an RDT 3.0 session.
pub struct RdtSender<T = Socket> {
    machine: Sender,
    timer: RetransmitTimer,
    transport: T,
    peer: SocketAddr,
}

impl<T: Transport> RdtSender<T> {
    /// Create a sender that delivers to `peer` through `transport`.
    pub fn new(transport: T, peer: SocketAddr, config: SenderConfig) -> Self {
        Self {
            machine: Sender::new(),
            timer: RetransmitTimer::new(config),
            transport,
            peer,
        }
    }

    /// Reliably deliver one message.
    ///
    /// Returns only once the receiver has acknowledged this message's
    /// sequence bit.  Timeouts and rejected responses trigger retransmission
    /// of the byte-identical packet; with the default configuration there is
    /// no limit on how often.
    ///
    /// Dropping the returned future abandons the message as a failed send
    /// would; the next call reuses the same sequence bit.
    pub async fn send(&mut self, message: impl AsRef<[u8]>) -> Result<(), SendError> {
        let message = message.as_ref();
        let packet = self.machine.begin(message)?;
        self.timer.reset();

        let result = self.deliver(&packet).await;
        if result.is_err() {
            self.machine.abandon();
        }
        result
    }

    async fn deliver(&mut self, packet: &Packet) -> Result<(), SendError> {
        let seq = packet.seq_bit();
        log::debug!(
            "[sender] {} → DATA seq={} len={}",
            self.machine.state(),
            seq,
            packet.payload().len()
        );

        loop {
            if !self.timer.may_transmit() {
                let attempts = self.timer.attempts();
                log::warn!("[sender] giving up on seq={seq} after {attempts} transmissions");
                return Err(SendError::RetriesExhausted { attempts });
            }

            self.timer.on_transmit();
            let tx = self.machine.on_transmit();
            self.transport.send_to(packet, self.peer).await?;
            log::debug!("[sender] → DATA seq={seq} to {} (transmission #{tx})", self.peer);

            match self.transport.recv_within(self.timer.timeout()).await {
                Ok((response, from)) => {
                    let verdict = self.machine.on_response(&response);
                    if verdict.is_accepted() {
                        log::info!("[sender] ← ACK seq={seq} from {from}; delivered after {tx} transmission(s)");
                        return Ok(());
                    }
                    log::debug!("[sender] ← {verdict:?} from {from}; retransmitting seq={seq}");
                }
                Err(SocketError::TimedOut(after)) => {
                    log::debug!("[sender] timeout after {after:?}; retransmitting seq={seq}");
                }
                Err(SocketError::Packet(e)) => {
                    log::warn!("[sender] discarding malformed response ({e}); retransmitting seq={seq}");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn state(&self) -> SenderState {
        self.machine.state()
    }

    /// Bit the next message will carry.
    pub fn seq_bit(&self) -> SeqBit {
        self.machine.seq_bit()
    }

    /// Every transmission so far, retransmissions included.
    pub fn packets_sent(&self) -> u64 {
        self.machine.packets_sent()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}

// ---------------------------------------------------------------------------
// RdtReceiver
// ---------------------------------------------------------------------------

/// Receive side of an RDT 3.0 session.
pub struct RdtReceiver<T = Socket> {
    machine: Receiver,
    transport: T,
}

impl<T: Transport> RdtReceiver<T> {
    /// Create a receiver with the reference fault schedule (drop every 6th
    /// datagram, corrupt every 3rd).
    pub fn new(transport: T) -> Self {
        Self {
            machine: Receiver::default(),
            transport,
        }
    }

    /// Create a receiver with a custom fault schedule.
    pub fn with_faults(transport: T, faults: impl FaultPolicy + 'static) -> Self {
        Self {
            machine: Receiver::new(Box::new(faults)),
            transport,
        }
    }

    /// Read and fully handle one framed datagram, ACK included.
    ///
    /// Malformed datagrams are discarded as channel noise and do not count.
    pub async fn step(&mut self) -> Result<Outcome, ReceiveError> {
        let (packet, from) = loop {
            match self.transport.recv_from().await {
                Ok(received) => break received,
                Err(SocketError::Packet(e)) => {
                    log::warn!("[receiver] discarding malformed datagram: {e}");
                }
                Err(e) => return Err(e.into()),
            }
        };

        let n = self.machine.packets_received() + 1;
        log::debug!("[receiver] ← packet #{n} from {from}");

        let Reaction { outcome, ack } = self.machine.on_packet(&packet);
        match &outcome {
            Outcome::Delivered(payload) => log::info!(
                "[receiver] delivered seq={} ({} bytes): {}",
                packet.seq_bit(),
                payload.len(),
                String::from_utf8_lossy(payload)
            ),
            Outcome::SimulatedLoss => log::debug!("[receiver] simulated loss of packet #{n}"),
            Outcome::SimulatedCorruption => {
                log::debug!("[receiver] simulated corruption of packet #{n}")
            }
            Outcome::Corrupt => log::debug!("[receiver] checksum failed on packet #{n}"),
            Outcome::Duplicate(seq) => log::debug!(
                "[receiver] duplicate seq={seq}, expected seq={}",
                self.machine.expected_seq_bit()
            ),
        }

        if let Some(seq) = ack {
            self.transport.send_to(&Packet::ack(seq), from).await?;
            log::debug!("[receiver] → ACK seq={seq} to {from}");
        }
        Ok(outcome)
    }

    /// Process datagrams until one payload is delivered, and return it.
    pub async fn recv(&mut self) -> Result<Vec<u8>, ReceiveError> {
        loop {
            if let Outcome::Delivered(payload) = self.step().await? {
                return Ok(payload);
            }
        }
    }

    /// Hand every delivered payload to `consumer`, forever.
    ///
    /// Returns only on a fatal transport error; stop it by dropping the
    /// future (e.g. on Ctrl-C).
    pub async fn start<F>(&mut self, mut consumer: F) -> Result<(), ReceiveError>
    where
        F: FnMut(Vec<u8>),
    {
        loop {
            let payload = self.recv().await?;
            consumer(payload);
        }
    }

    pub fn state(&self) -> ReceiverState {
        self.machine.state()
    }

    pub fn expected_seq_bit(&self) -> SeqBit {
        self.machine.expected_seq_bit()
    }

    /// Framed datagrams seen, including simulated losses.
    pub fn packets_received(&self) -> u64 {
        self.machine.packets_received()
    }

    pub fn delivered(&self) -> u64 {
        self.machine.delivered()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    pub fn into_transport(self) -> T {
        self.transport
    }
}
