// SPDX-License-Identifier: MIT OR Apache-2.0
//! A reference plugin: one "uppercase" cap alongside the mandatory
//! identity cap, shared by `capns-plugin-cli`'s wire and CLI-fallback
//! modes so the same manifest and handler back both.

use std::sync::Arc;

use async_trait::async_trait;
use capns_catalog::{Arg, Cap, Manifest, Output, Source};
use capns_plugin::{CapHandler, FrameSender, InputPackage, Invocation, PluginError, PluginRuntime};
use capns_urn::{CapUrn, MediaUrn};

/// The cap urn `capns-plugin-cli upper` exposes.
#[must_use]
pub fn uppercase_urn() -> CapUrn {
    CapUrn::parse("cap:in=media:txt;out=media:txt;upper").expect("uppercase urn is valid")
}

/// The manifest `capns-plugin-cli` serves, before
/// [`PluginRuntime::new`] adds the mandatory identity cap.
#[must_use]
pub fn sample_manifest() -> Manifest {
    let txt = || MediaUrn::parse("media:txt").expect("media:txt is valid");
    Manifest {
        name: "capns-sample-plugin".to_owned(),
        version: "0.1.0".to_owned(),
        description: "Reference plugin exposing an uppercase cap.".to_owned(),
        author: None,
        page_url: None,
        caps: vec![Cap {
            urn: uppercase_urn(),
            title: "Uppercase".to_owned(),
            description: Some("Uppercases UTF-8 text.".to_owned()),
            command: "upper".to_owned(),
            args: vec![Arg {
                media_urn: txt(),
                required: true,
                sources: vec![Source::CliFlag("--input".to_owned()), Source::Stdin(txt())],
                description: None,
                default: None,
                metadata: None,
            }],
            output: Some(Output {
                media_urn: txt(),
                description: None,
                metadata: None,
            }),
            media_specs: Vec::new(),
        }],
    }
}

/// Uppercases each input chunk independently and writes it straight to
/// the single declared output; works a UTF-8 boundary at a time rather
/// than buffering the whole stream, so it degrades to lossy replacement
/// only within a chunk that splits a multi-byte character.
pub struct UppercaseHandler;

#[async_trait]
impl<F> CapHandler<F> for UppercaseHandler
where
    F: FrameSender,
{
    async fn handle(&self, mut args: InputPackage, ctx: Invocation<F>) -> Result<(), PluginError> {
        let output = ctx.output("media:txt");
        while let Some(mut stream) = args.next_stream().await {
            while let Some(chunk) = stream.next_chunk().await {
                let upper = String::from_utf8_lossy(&chunk).to_uppercase();
                output.write(upper.as_bytes()).await?;
            }
        }
        output.close().await
    }
}

/// Build the runtime `capns-plugin-cli` serves in either mode.
#[must_use]
pub fn build_runtime<F>() -> PluginRuntime<F>
where
    F: FrameSender + 'static,
{
    let mut runtime = PluginRuntime::new(sample_manifest());
    runtime.register(uppercase_urn(), Arc::new(UppercaseHandler));
    runtime
}

#[cfg(test)]
mod tests {
    use super::*;
    use capns_plugin::cli;
    use capns_plugin::CliFrameSender;
    use tokio::io::{duplex, AsyncReadExt};

    #[test]
    fn runtime_serves_uppercase_and_identity() {
        let runtime = build_runtime::<CliFrameSender<tokio::io::DuplexStream>>();
        assert!(runtime.manifest().has_identity());
        assert!(runtime.manifest().caps.iter().any(|cap| cap.urn == uppercase_urn()));
    }

    #[tokio::test]
    async fn uppercase_cap_runs_end_to_end_in_cli_mode() {
        let runtime = build_runtime::<CliFrameSender<tokio::io::DuplexStream>>();
        let (mut output_reader, output_writer) = duplex(4096);
        let sender = Arc::new(CliFrameSender::new(output_writer));

        let argv = vec!["capns-sample-plugin".to_owned(), "upper".to_owned(), "--input".to_owned(), "hello".to_owned()];
        let code = cli::run_cli(&runtime, sender, argv, &mut tokio::io::empty()).await;
        assert_eq!(code, 0);

        let mut buf = Vec::new();
        output_reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"HELLO");
    }

    #[tokio::test]
    async fn manifest_subcommand_is_always_available() {
        let runtime = build_runtime::<CliFrameSender<tokio::io::DuplexStream>>();
        let (_reader, output_writer) = duplex(4096);
        let sender = Arc::new(CliFrameSender::new(output_writer));
        let argv = vec!["capns-sample-plugin".to_owned(), "manifest".to_owned()];
        let code = cli::run_cli(&runtime, sender, argv, &mut tokio::io::empty()).await;
        assert_eq!(code, 0);
    }
}
