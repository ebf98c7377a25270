// SPDX-License-Identifier: MIT OR Apache-2.0
//! Reference plugin binary: with zero arguments it speaks the CBOR wire
//! protocol on stdin/stdout against a host; with any arguments it runs
//! one cap directly as a subcommand, no host involved (spec.md §4.J's
//! mode-selection rule).

use std::sync::Arc;

use capns_cli::plugin::build_runtime;
use capns_plugin::{cli, CliFrameSender, TransportFrameSender};
use capns_transport::{FrameReader, FrameWriter, Limits, SharedLimits};

#[tokio::main]
async fn main() {
    let argv: Vec<String> = std::env::args().collect();
    capns_telemetry::init_tracing(std::env::var_os("CAPNS_DEBUG").is_some());

    let code = if argv.len() <= 1 {
        run_wire_mode().await
    } else {
        run_cli_mode(argv).await
    };
    std::process::exit(code);
}

async fn run_wire_mode() -> i32 {
    let runtime = build_runtime::<TransportFrameSender<tokio::io::Stdout>>();
    let manifest_bytes = match serde_json::to_vec(runtime.manifest()) {
        Ok(bytes) => bytes,
        Err(err) => {
            eprintln!("failed to serialize manifest: {err}");
            return 64;
        }
    };

    let limits = SharedLimits::default();
    let reader = FrameReader::new(tokio::io::stdin(), limits.clone());
    let writer = FrameWriter::new(tokio::io::stdout(), limits);

    match runtime.run(reader, writer, manifest_bytes, Limits::default()).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("plugin runtime exited: {err}");
            64
        }
    }
}

async fn run_cli_mode(argv: Vec<String>) -> i32 {
    let runtime = build_runtime::<CliFrameSender<tokio::io::Stdout>>();
    let sender = Arc::new(CliFrameSender::new(tokio::io::stdout()));
    let mut stdin = tokio::io::stdin();
    cli::run_cli(&runtime, sender, argv, &mut stdin).await
}
