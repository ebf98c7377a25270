// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reference relay switch binary: listens for slave (master-side)
//! connections over TCP and drives a [`capns_relay::Switch`], reading
//! `<cap-urn> <text>` request lines from stdin and printing each
//! request's outcome as it resolves (spec.md §4.K).

use std::sync::Arc;

use capns_cli::relay::{parse_request_line, request_frame, RequestOutcome, ResponseAssembler};
use capns_relay::Switch;
use capns_transport::{FrameReader, FrameWriter, SharedLimits};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "capns-relay-cli", about = "Switch front end accepting plugin-host slaves over TCP")]
struct Cli {
    /// Address slaves connect to.
    #[arg(long, default_value = "127.0.0.1:4455")]
    listen: String,
    /// Widen log verbosity.
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    capns_telemetry::init_tracing(cli.debug);

    let (switch, engine_inbound) = Switch::<OwnedWriteHalf>::new();
    let switch = Arc::new(switch);

    let listener = match TcpListener::bind(&cli.listen).await {
        Ok(listener) => listener,
        Err(err) => {
            eprintln!("failed to bind {}: {err}", cli.listen);
            std::process::exit(3);
        }
    };
    tracing::info!(target: "capns.relay.cli", addr = %cli.listen, "listening for slaves");

    let accept_switch = Arc::clone(&switch);
    tokio::spawn(async move {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(pair) => pair,
                Err(err) => {
                    tracing::warn!(target: "capns.relay.cli", error = %err, "accept failed");
                    continue;
                }
            };
            let (read_half, write_half) = stream.into_split();
            let limits = SharedLimits::default();
            let reader = FrameReader::new(read_half, limits.clone());
            let writer = FrameWriter::new(write_half, limits);
            match accept_switch.connect_master(reader, writer).await {
                Ok(index) => tracing::info!(target: "capns.relay.cli", %peer, index, "slave connected"),
                Err(err) => tracing::warn!(target: "capns.relay.cli", %peer, error = %err, "slave handshake failed"),
            }
        }
    });

    tokio::spawn(drain_engine_inbound(engine_inbound));

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                eprintln!("stdin read failed: {err}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let request = match parse_request_line(&line) {
            Ok(request) => request,
            Err(err) => {
                eprintln!("{err}");
                continue;
            }
        };
        let id = Uuid::new_v4();
        let frame = request_frame(id, &request);
        if let Err(err) = switch.route_engine_request(id, &request.cap_urn, frame).await {
            println!("{id} err {err}");
        }
    }
}

async fn drain_engine_inbound(mut inbound: tokio::sync::mpsc::Receiver<capns_frame::Frame>) {
    let assembler = Mutex::new(ResponseAssembler::new());
    while let Some(frame) = inbound.recv().await {
        let resolved = assembler.lock().await.feed(frame);
        if let Some((id, outcome)) = resolved {
            match outcome {
                RequestOutcome::Ok(bytes) => println!("{id} ok {}", String::from_utf8_lossy(&bytes)),
                RequestOutcome::Err(message) => println!("{id} err {message}"),
            }
        }
    }
}
