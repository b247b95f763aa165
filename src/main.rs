//! Entry point for `rdt3`.
//!
//! Parses CLI arguments and dispatches into either **receiver** or **sender**
//! mode.  All actual protocol work is delegated to library modules; `main.rs`
//! owns only process setup (logging, signal handling, argument parsing).

use std::error::Error;
use std::net::SocketAddr;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use rdt3::fault::EveryNth;
use rdt3::{RdtReceiver, RdtSender, SenderConfig, Socket};

/// Reliable single-message delivery over UDP (RDT 3.0).
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Receive messages and print each delivered payload.
    Receiver {
        /// Local address to bind.
        #[arg(short, long, default_value = "127.0.0.1:10116")]
        bind: SocketAddr,
        /// Treat every Nth datagram as lost.
        #[arg(long, default_value_t = 6)]
        drop_every: u64,
        /// Treat every Nth datagram as corrupted.
        #[arg(long, default_value_t = 3)]
        corrupt_every: u64,
        /// Disable simulated loss and corruption.
        #[arg(long)]
        no_faults: bool,
    },
    /// Send each message reliably, one at a time.
    Sender {
        /// Receiver address.
        #[arg(short, long, default_value = "127.0.0.1:10116")]
        peer: SocketAddr,
        /// Local address to bind.
        #[arg(short, long, default_value = "0.0.0.0:0")]
        bind: SocketAddr,
        /// How long to wait for an ACK before retransmitting.
        #[arg(long, default_value_t = 2000)]
        timeout_ms: u64,
        /// Give up after this many transmissions of one message.
        #[arg(long)]
        max_attempts: Option<u32>,
        /// Messages to send; read one per line from stdin when omitted.
        messages: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.mode {
        Mode::Receiver {
            bind,
            drop_every,
            corrupt_every,
            no_faults,
        } => {
            let faults = if no_faults {
                EveryNth::new(None, None)
            } else {
                EveryNth::new(Some(drop_every), Some(corrupt_every))
            };
            let socket = Socket::bind(bind).await?;
            log::info!("Receiver listening on {}", socket.local_addr);
            let mut receiver = RdtReceiver::with_faults(socket, faults);

            let interrupted = tokio::select! {
                result = receiver.start(|payload| {
                    println!("{}", String::from_utf8_lossy(&payload));
                }) => {
                    result?;
                    false
                }
                _ = tokio::signal::ctrl_c() => true,
            };
            if interrupted {
                log::info!(
                    "Receiver interrupted after {} datagrams, {} deliveries",
                    receiver.packets_received(),
                    receiver.delivered()
                );
            }
            // Dropping the receiver closes the socket.
        }
        Mode::Sender {
            peer,
            bind,
            timeout_ms,
            max_attempts,
            messages,
        } => {
            let socket = Socket::bind(bind).await?;
            log::info!("Sender bound to {}, delivering to {peer}", socket.local_addr);
            let config = SenderConfig {
                timeout: Duration::from_millis(timeout_ms),
                max_attempts,
            };
            let mut sender = RdtSender::new(socket, peer, config);

            if messages.is_empty() {
                let mut lines = BufReader::new(tokio::io::stdin()).lines();
                while let Some(line) = lines.next_line().await? {
                    sender.send(&line).await?;
                }
            } else {
                for message in &messages {
                    sender.send(message).await?;
                }
            }
            log::info!("All messages delivered ({} transmissions)", sender.packets_sent());
        }
    }

    Ok(())
}
