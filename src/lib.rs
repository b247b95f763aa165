//! `rdt3`: RDT 3.0 (alternating-bit) reliable delivery over UDP.
//!
//! # Architecture
//!
//! ```text
//!  send(msg)                                         consumer(payload)
//!      │                                                    ▲
//!  ┌───▼────────┐     DATA seq=b      ┌──────────────┐      │
//!  │ RdtSender  │────────────────────▶│ RdtReceiver  │──────┘
//!  │  (Sender)  │◀────────────────────│  (Receiver)  │
//!  └───┬────────┘     ACK  seq=b      └──────┬───────┘
//!      │ owns                                │ owns
//!  ┌───▼────────┐                     ┌──────▼───────┐
//!  │ Transport  │  unreliable UDP     │  Transport   │
//!  └────────────┘                     └──────────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]     : wire format and Internet checksum
//! - [`socket`]     : transport trait and tokio UDP socket
//! - [`state`]      : finite-state-machine types
//! - [`sender`]     : alternating-bit send-side state machine
//! - [`receiver`]   : alternating-bit receive-side state machine
//! - [`timer`]      : retransmission timeout and attempt cap
//! - [`connection`] : sender/receiver engines (state machine + transport)
//! - [`fault`]      : deterministic and seeded fault schedules
//! - [`simulator`]  : fault-injecting transport wrapper for testing

pub mod connection;
pub mod fault;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod simulator;
pub mod socket;
pub mod state;
pub mod timer;

pub use connection::{RdtReceiver, RdtSender, ReceiveError, SendError, SenderConfig};
pub use packet::{Packet, PacketError, SeqBit};
pub use socket::{Socket, SocketError, Transport};
