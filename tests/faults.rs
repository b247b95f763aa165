//! Recovery-path tests.
//!
//! These drive one engine against a hand-operated loopback socket (or a
//! scripted [`Simulator`]) so each loss, corruption and duplication happens
//! exactly where the test wants it.

use std::net::SocketAddr;
use std::time::Duration;

use rdt3::{
    fault::{Fault, NoFaults, Schedule},
    receiver::Outcome,
    simulator::Simulator,
    Packet, RdtReceiver, RdtSender, SenderConfig, SeqBit, Socket, Transport,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn ephemeral() -> Socket {
    Socket::bind("127.0.0.1:0".parse().unwrap())
        .await
        .expect("bind failed")
}

fn quick() -> SenderConfig {
    SenderConfig {
        timeout: Duration::from_millis(100),
        max_attempts: None,
    }
}

/// Next datagram on `socket`, failing the test after five seconds.
async fn next(socket: &Socket) -> (Packet, SocketAddr) {
    tokio::time::timeout(Duration::from_secs(5), socket.recv_from())
        .await
        .expect("nothing arrived")
        .expect("recv failed")
}

// ---------------------------------------------------------------------------
// Sender side
// ---------------------------------------------------------------------------

/// A packet that gets no response is retransmitted byte-for-byte, and the
/// send completes once a matching ACK finally arrives.
#[tokio::test]
async fn loss_triggers_identical_retransmission() {
    let peer = ephemeral().await;
    let mut sender = RdtSender::new(ephemeral().await, peer.local_addr, quick());

    let client = tokio::spawn(async move {
        sender.send("hello").await.expect("send");
        sender
    });

    // Swallow the first transmission; the sender must time out.
    let (first, _) = next(&peer).await;
    let (second, from) = next(&peer).await;
    assert_eq!(first.as_bytes(), second.as_bytes());
    assert_eq!(second.seq_bit(), SeqBit::Zero);
    assert_eq!(second.payload(), b"hello");

    peer.send_to(&Packet::ack(SeqBit::Zero), from).await.unwrap();

    let sender = tokio::time::timeout(Duration::from_secs(5), client)
        .await
        .expect("sender never finished")
        .expect("sender panicked");
    assert_eq!(sender.packets_sent(), 2);
    assert_eq!(sender.seq_bit(), SeqBit::One);
}

/// An ACK for the previous bit is rejected and provokes an immediate
/// retransmission rather than completing the send.
#[tokio::test]
async fn stale_ack_is_not_accepted() {
    let peer = ephemeral().await;
    let mut sender = RdtSender::new(
        ephemeral().await,
        peer.local_addr,
        SenderConfig {
            // Long enough that only the stale ACK can explain a resend.
            timeout: Duration::from_secs(30),
            max_attempts: None,
        },
    );

    let client = tokio::spawn(async move {
        sender.send("fresh").await.expect("send");
        sender
    });

    let (first, from) = next(&peer).await;
    peer.send_to(&Packet::ack(SeqBit::One), from).await.unwrap();
    let (second, _) = next(&peer).await;
    assert_eq!(first, second);

    // A data packet is not an ACK either.
    peer.send_to(&Packet::data(b"", SeqBit::Zero).unwrap(), from)
        .await
        .unwrap();
    let (third, _) = next(&peer).await;
    assert_eq!(first, third);

    peer.send_to(&Packet::ack(SeqBit::Zero), from).await.unwrap();
    let sender = tokio::time::timeout(Duration::from_secs(5), client)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sender.packets_sent(), 3);
}

/// Garbage on the channel is treated like a rejected response.
#[tokio::test]
async fn malformed_response_is_noise() {
    let peer = ephemeral().await;
    let mut sender = RdtSender::new(ephemeral().await, peer.local_addr, quick());

    let client = tokio::spawn(async move { sender.send("x").await });

    let (_, from) = next(&peer).await;
    peer.send_raw(b"garbage", from).await.unwrap();
    let (retransmitted, _) = next(&peer).await;
    assert_eq!(retransmitted.payload(), b"x");
    peer.send_to(&Packet::ack(SeqBit::Zero), from).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), client)
        .await
        .unwrap()
        .unwrap()
        .expect("send");
}

// ---------------------------------------------------------------------------
// Receiver side
// ---------------------------------------------------------------------------

/// The same packet arriving twice is delivered once and ACKed twice.
#[tokio::test]
async fn duplicate_is_delivered_at_most_once() {
    let mut receiver = RdtReceiver::with_faults(ephemeral().await, NoFaults);
    let client = ephemeral().await;
    let pkt = Packet::data(b"only once", SeqBit::Zero).unwrap();

    client.send_to(&pkt, receiver.local_addr()).await.unwrap();
    client.send_to(&pkt, receiver.local_addr()).await.unwrap();

    assert_eq!(
        receiver.step().await.unwrap(),
        Outcome::Delivered(b"only once".to_vec())
    );
    assert_eq!(
        receiver.step().await.unwrap(),
        Outcome::Duplicate(SeqBit::Zero)
    );
    assert_eq!(receiver.delivered(), 1);

    for _ in 0..2 {
        let (ack, _) = next(&client).await;
        assert!(ack.verify_checksum());
        assert!(ack.is_ack());
        assert_eq!(ack.seq_bit(), SeqBit::Zero);
    }
}

/// A data packet with a bad checksum is answered with the previous ACK.
#[tokio::test]
async fn corrupt_data_gets_previous_ack() {
    let mut receiver = RdtReceiver::with_faults(ephemeral().await, NoFaults);
    let client = ephemeral().await;
    let pkt = Packet::data(b"damaged", SeqBit::Zero).unwrap();

    client
        .send_to(&pkt.with_bit_flipped(13 * 8), receiver.local_addr())
        .await
        .unwrap();
    assert_eq!(receiver.step().await.unwrap(), Outcome::Corrupt);

    let (ack, _) = next(&client).await;
    assert_eq!(ack.seq_bit(), SeqBit::One);
    assert_eq!(receiver.expected_seq_bit(), SeqBit::Zero);
}

/// Framing noise is skipped without a response and without being counted.
#[tokio::test]
async fn malformed_datagrams_are_discarded() {
    let mut receiver = RdtReceiver::with_faults(ephemeral().await, NoFaults);
    let client = ephemeral().await;

    client.send_raw(b"short", receiver.local_addr()).await.unwrap();
    client
        .send_raw(b"WRONGTAG\x00\x00\x00\x28", receiver.local_addr())
        .await
        .unwrap();
    client
        .send_to(&Packet::data(b"real", SeqBit::Zero).unwrap(), receiver.local_addr())
        .await
        .unwrap();

    assert_eq!(receiver.recv().await.unwrap(), b"real");
    assert_eq!(receiver.packets_received(), 1);

    let (ack, _) = next(&client).await;
    assert_eq!(ack.seq_bit(), SeqBit::Zero);
    let nothing = client.recv_within(Duration::from_millis(50)).await;
    assert!(nothing.is_err());
}

// ---------------------------------------------------------------------------
// Both engines
// ---------------------------------------------------------------------------

/// The receiver delivers and ACKs seq 0 but the ACK is corrupted in
/// transit.  The sender retransmits; the receiver recognises the duplicate,
/// does not re-deliver, and re-sends the ACK, which the sender accepts.
#[tokio::test]
async fn corrupted_ack_scenario() {
    let ack_channel = Simulator::new(ephemeral().await, Schedule::new([Fault::Corrupt]));
    let mut receiver = RdtReceiver::with_faults(ack_channel, NoFaults);
    let mut sender = RdtSender::new(ephemeral().await, receiver.local_addr(), quick());

    let server = tokio::spawn(async move {
        let first = receiver.step().await.unwrap();
        let second = receiver.step().await.unwrap();
        (first, second, receiver)
    });

    sender.send("hello").await.expect("send");
    assert_eq!(sender.seq_bit(), SeqBit::One);
    assert_eq!(sender.packets_sent(), 2);

    let (first, second, receiver) = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first, Outcome::Delivered(b"hello".to_vec()));
    assert_eq!(second, Outcome::Duplicate(SeqBit::Zero));
    assert_eq!(receiver.delivered(), 1);
    assert_eq!(receiver.expected_seq_bit(), SeqBit::One);
    assert_eq!(receiver.into_transport().offered(), 2);
}

/// A lost data packet is recovered by the sender's timeout.
#[tokio::test]
async fn lost_data_packet_scenario() {
    let mut receiver = RdtReceiver::with_faults(ephemeral().await, NoFaults);
    let data_channel = Simulator::new(ephemeral().await, Schedule::new([Fault::Drop]));
    let mut sender = RdtSender::new(data_channel, receiver.local_addr(), quick());

    let server = tokio::spawn(async move {
        let payload = receiver.recv().await;
        payload.map(|p| (p, receiver))
    });

    sender.send("eventually").await.expect("send");
    assert_eq!(sender.packets_sent(), 2);
    assert_eq!(sender.transport().offered(), 2);

    let (payload, receiver) = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(payload, b"eventually");
    // Only the retransmission reached the receiver.
    assert_eq!(receiver.packets_received(), 1);
}
