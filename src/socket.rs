//! Datagram transport abstraction.
//!
//! [`Transport`] is the seam between the protocol engines and the unreliable
//! channel.  [`Socket`] is a thin wrapper around `tokio::net::UdpSocket` that
//! speaks [`crate::packet::Packet`] instead of raw bytes; the fault
//! [`crate::simulator::Simulator`] wraps any other transport.  All protocol
//! logic lives elsewhere; this module owns only byte I/O.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::net::UdpSocket;

use crate::packet::{Packet, PacketError};

/// Maximum UDP payload size.
const MAX_DATAGRAM: usize = 65_535;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can arise from transport operations.
#[derive(Debug, Error)]
pub enum SocketError {
    /// Underlying I/O error from the OS.
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The received datagram is not a conforming packet.
    #[error("malformed datagram: {0}")]
    Packet(#[from] PacketError),
    /// No datagram arrived before the read deadline.
    #[error("no datagram within {0:?}")]
    TimedOut(Duration),
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// A packet-oriented, unreliable datagram channel.
///
/// Each engine owns exactly one transport; there is never more than one
/// outstanding operation on it.
pub trait Transport: Send + Sync {
    /// Address this endpoint is bound to.
    fn local_addr(&self) -> SocketAddr;

    /// Send `packet` as a single datagram to `dest`.
    fn send_to(
        &self,
        packet: &Packet,
        dest: SocketAddr,
    ) -> impl Future<Output = Result<(), SocketError>> + Send;

    /// Wait, without a deadline, for the next datagram.
    ///
    /// Datagrams that fail framing are returned as
    /// [`SocketError::Packet`]; the caller decides whether to keep reading.
    fn recv_from(&self) -> impl Future<Output = Result<(Packet, SocketAddr), SocketError>> + Send;

    /// Like [`Transport::recv_from`] but gives up after `deadline`.
    ///
    /// Expiry is reported as [`SocketError::TimedOut`], distinct from a
    /// datagram that arrived and was later rejected.
    fn recv_within(
        &self,
        deadline: Duration,
    ) -> impl Future<Output = Result<(Packet, SocketAddr), SocketError>> + Send {
        async move {
            match tokio::time::timeout(deadline, self.recv_from()).await {
                Ok(result) => result,
                Err(_) => Err(SocketError::TimedOut(deadline)),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Socket
// ---------------------------------------------------------------------------

/// An async, packet-oriented UDP socket.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing `127.0.0.1:0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> Result<Self, SocketError> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self { local_addr, inner })
    }

    /// Send arbitrary bytes, bypassing the codec.
    pub async fn send_raw(&self, bytes: &[u8], dest: SocketAddr) -> Result<(), SocketError> {
        self.inner.send_to(bytes, dest).await?;
        Ok(())
    }
}

impl Transport for Socket {
    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    async fn send_to(&self, packet: &Packet, dest: SocketAddr) -> Result<(), SocketError> {
        self.inner.send_to(packet.as_bytes(), dest).await?;
        Ok(())
    }

    async fn recv_from(&self) -> Result<(Packet, SocketAddr), SocketError> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let (n, addr) = self.inner.recv_from(&mut buf).await?;
        let packet = Packet::decode(&buf[..n])?;
        Ok((packet, addr))
    }
}
