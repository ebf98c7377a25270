// SPDX-License-Identifier: MIT OR Apache-2.0
//! CLI fallback mode (spec.md §6): no host, no CBOR wire — a plugin binary
//! invoked directly from a shell runs exactly one cap as a subcommand,
//! reads its arguments from argv/stdin per the cap's declared [`Source`]s,
//! and writes its single output straight to stdout.
//!
//! Exit codes: `0` success, `1` unrecognized subcommand, `2` a required
//! argument had no satisfied source, `3` an I/O failure, `64` the
//! manifest itself failed to serialize (there is no handshake to fail in
//! this mode, but `64` is reserved for "this plugin cannot describe
//! itself").

use std::sync::Arc;

use capns_catalog::{Arg, Manifest, Source};
use clap::error::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::frame_sender::CliFrameSender;
use crate::handler::Invocation;
use crate::io_stream::{InputPackage, InputStream};
use crate::runtime::PluginRuntime;

/// Build the `clap` command tree for `manifest`: a `manifest` subcommand
/// plus one subcommand per declared cap, with one `Arg` per
/// [`Source::CliFlag`]/[`Source::Position`] entry any of the cap's
/// arguments declares (a [`Source::Stdin`] entry needs no flag at all).
#[must_use]
pub fn build_command(manifest: &Manifest) -> clap::Command {
    let mut cmd = clap::Command::new(manifest.name.clone())
        .version(manifest.version.clone())
        .about(manifest.description.clone())
        .subcommand(clap::Command::new("manifest").about("Print this plugin's manifest as JSON"));

    for cap in &manifest.caps {
        let mut sub = clap::Command::new(cap.command.clone());
        if let Some(description) = &cap.description {
            sub = sub.about(description.clone());
        }
        for arg in &cap.args {
            for source in &arg.sources {
                match source {
                    Source::CliFlag(name) => {
                        let id = name.trim_start_matches('-').to_owned();
                        sub = sub.arg(clap::Arg::new(id).long(name.trim_start_matches('-').to_owned()).required(false));
                    }
                    Source::Position(index) => {
                        let id = format!("pos{index}");
                        sub = sub.arg(clap::Arg::new(id).index(*index + 1).required(false));
                    }
                    Source::Stdin(_) => {}
                }
            }
        }
        cmd = cmd.subcommand(sub);
    }
    cmd
}

async fn resolve_argument<R>(arg: &Arg, matches: &clap::ArgMatches, stdin: &mut R) -> std::io::Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    for source in &arg.sources {
        match source {
            Source::CliFlag(name) => {
                let id = name.trim_start_matches('-');
                if let Some(value) = matches.get_one::<String>(id) {
                    return Ok(Some(value.clone().into_bytes()));
                }
            }
            Source::Position(index) => {
                let id = format!("pos{index}");
                if let Some(value) = matches.get_one::<String>(&id) {
                    return Ok(Some(value.clone().into_bytes()));
                }
            }
            Source::Stdin(_) => {
                let mut buf = Vec::new();
                stdin.read_to_end(&mut buf).await?;
                return Ok(Some(buf));
            }
        }
    }
    Ok(arg.default.as_ref().map(|value| value.to_string().into_bytes()))
}

/// Parse `argv` and run the matching cap, reading arguments and writing
/// the single output directly, with no wire framing at all. Returns the
/// process exit code.
pub async fn run_cli<R, W>(
    runtime: &PluginRuntime<CliFrameSender<W>>,
    sender: Arc<CliFrameSender<W>>,
    argv: Vec<String>,
    stdin: &mut R,
) -> i32
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send,
{
    let manifest = runtime.manifest();
    let command = build_command(manifest);
    let matches = match command.try_get_matches_from(argv) {
        Ok(matches) => matches,
        Err(err) => {
            let code = match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand | ErrorKind::DisplayVersion => 0,
                ErrorKind::InvalidSubcommand | ErrorKind::UnknownArgument => 1,
                _ => 2,
            };
            let _ = err.print();
            return code;
        }
    };

    let Some((sub_name, sub_matches)) = matches.subcommand() else {
        eprintln!("no subcommand given; try --help");
        return 1;
    };

    if sub_name == "manifest" {
        return match serde_json::to_string_pretty(manifest) {
            Ok(json) => {
                println!("{json}");
                0
            }
            Err(err) => {
                eprintln!("failed to serialize manifest: {err}");
                64
            }
        };
    }

    let Some(cap) = manifest.caps.iter().find(|cap| cap.command == sub_name) else {
        eprintln!("unrecognized subcommand: {sub_name}");
        return 1;
    };
    let Some(handler) = runtime.find(&cap.urn) else {
        eprintln!("no handler registered for cap {}", cap.urn);
        return 1;
    };

    let (streams_tx, streams_rx) = mpsc::channel(cap.args.len().max(1));
    for arg in &cap.args {
        let value = match resolve_argument(arg, sub_matches, stdin).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) if !arg.required => continue,
            Ok(None) => {
                eprintln!("missing required argument of type {}", arg.media_urn);
                return 2;
            }
            Err(err) => {
                eprintln!("i/o error reading argument: {err}");
                return 3;
            }
        };
        let (chunk_tx, chunk_rx) = mpsc::channel(1);
        let _ = chunk_tx.send(value).await;
        drop(chunk_tx);
        let stream = InputStream::new(String::new(), Some(arg.media_urn.to_string()), chunk_rx);
        if streams_tx.send(stream).await.is_err() {
            break;
        }
    }
    drop(streams_tx);

    let package = InputPackage::new(streams_rx);
    let ctx = Invocation::new(Uuid::new_v4(), sender, usize::MAX, None);
    match handler.handle(package, ctx).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("handler failed: {err}");
            3
        }
    }
}
