//! Entry point for `rdt-over-udp`.
//!
//! A small file-transfer driver: `send` chunks a file (or stdin) into
//! payloads and delivers them; `recv` writes what arrives to a file (or
//! stdout).  All protocol work is delegated to the library; `main.rs` owns
//! only process setup (logging, argument parsing, file I/O).
//!
//! The receiver may be started after the sender: until the receiver first
//! answers, refused datagrams are retried like lost ones.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use rdt_over_udp::simulator::{Simulator, SimulatorConfig};
use rdt_over_udp::socket::Socket;
use rdt_over_udp::{RdtConfig, Receiver, Sender};

/// Reliable file transfer over UDP with the alternating-bit protocol.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Send a file to a listening receiver.
    Send {
        /// Receiver address (e.g. 127.0.0.1:9000).
        #[arg(short, long)]
        to: SocketAddr,
        /// Local address to bind.
        #[arg(short, long, default_value = "0.0.0.0:0")]
        bind: SocketAddr,
        /// File to send; stdin when omitted.
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Bytes per data unit.
        #[arg(long, default_value_t = 1000)]
        chunk_size: usize,
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Receive a file and write it out.
    Recv {
        /// Local address to listen on.
        #[arg(short, long, default_value = "0.0.0.0:9000")]
        bind: SocketAddr,
        /// Output path; stdout when omitted.
        #[arg(short, long)]
        out: Option<PathBuf>,
        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Retransmission timeout in milliseconds.
    #[arg(long, default_value_t = 100)]
    rto_ms: u64,
    /// How long the receiver keeps answering retransmissions after
    /// end-of-stream, in milliseconds.
    #[arg(long, default_value_t = 200)]
    linger_ms: u64,
    /// Give up on the end-of-stream ack after this many transmissions.
    #[arg(long)]
    close_attempts: Option<u32>,
    /// Simulated probability of dropping an outgoing datagram.
    #[arg(long, default_value_t = 0.0)]
    loss: f64,
    /// Simulated probability of corrupting an outgoing datagram.
    #[arg(long, default_value_t = 0.0)]
    corrupt: f64,
    /// Seed for the fault simulator.
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

impl CommonArgs {
    fn rdt_config(&self) -> RdtConfig {
        let config = RdtConfig::default()
            .with_retransmit_timeout(Duration::from_millis(self.rto_ms))
            .with_linger(Duration::from_millis(self.linger_ms));
        match self.close_attempts {
            Some(n) => config.with_close_attempts(n),
            None => config,
        }
    }

    fn simulator_config(&self) -> SimulatorConfig {
        SimulatorConfig {
            loss_rate: self.loss,
            corrupt_rate: self.corrupt,
            seed: self.seed,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();

    match cli.mode {
        Mode::Send {
            to,
            bind,
            file,
            chunk_size,
            common,
        } => {
            anyhow::ensure!(chunk_size > 0, "--chunk-size must be positive");
            let input: Box<dyn AsyncRead + Unpin + Send> = match &file {
                Some(path) => Box::new(
                    tokio::fs::File::open(path)
                        .await
                        .with_context(|| format!("opening {}", path.display()))?,
                ),
                None => Box::new(tokio::io::stdin()),
            };
            log::info!("Sending to {to}");
            run_sender(to, bind, input, chunk_size, &common).await
        }
        Mode::Recv { bind, out, common } => {
            let output: Box<dyn AsyncWrite + Unpin + Send> = match &out {
                Some(path) => Box::new(
                    tokio::fs::File::create(path)
                        .await
                        .with_context(|| format!("creating {}", path.display()))?,
                ),
                None => Box::new(tokio::io::stdout()),
            };
            log::info!("Listening on {bind}");
            run_receiver(bind, output, &common).await
        }
    }
}

async fn run_sender(
    to: SocketAddr,
    bind: SocketAddr,
    mut input: Box<dyn AsyncRead + Unpin + Send>,
    chunk_size: usize,
    common: &CommonArgs,
) -> Result<()> {
    let mut socket = Socket::bind(bind).await.context("binding sender socket")?;
    socket.connect(to).await.context("connecting to receiver")?;
    let transport = Simulator::new(socket, common.simulator_config());
    let mut sender = Sender::new(transport, common.rdt_config());

    let mut buf = vec![0u8; chunk_size];
    let mut total = 0usize;
    loop {
        let n = input.read(&mut buf).await.context("reading input")?;
        if n == 0 {
            break;
        }
        sender.send(&buf[..n]).await.context("sending chunk")?;
        total += n;
    }

    let stats = sender.close().await.context("closing sender")?;
    log::info!(
        "Sent {total} bytes in {} units ({} retransmissions)",
        stats.confirmed,
        stats.retransmissions
    );
    Ok(())
}

async fn run_receiver(
    bind: SocketAddr,
    mut output: Box<dyn AsyncWrite + Unpin + Send>,
    common: &CommonArgs,
) -> Result<()> {
    let socket = Socket::bind(bind).await.context("binding receiver socket")?;
    let transport = Simulator::new(socket, common.simulator_config());
    let mut receiver = Receiver::new(transport, common.rdt_config());

    let mut total = 0usize;
    while let Some(chunk) = receiver.recv().await.context("receiving chunk")? {
        output.write_all(&chunk).await.context("writing output")?;
        total += chunk.len();
    }
    output.flush().await.context("flushing output")?;

    let stats = receiver.close().await.context("closing receiver")?;
    log::info!(
        "Received {total} bytes in {} units ({} duplicates, {} corrupted)",
        stats.delivered,
        stats.duplicates,
        stats.corrupted
    );
    Ok(())
}
