// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bridges an inbound `LOG` frame (`meta.level`, `meta.message`) to a
//! `tracing` event, instead of silently dropping it (spec.md §3, §7).

use capns_frame::Frame;
use ciborium::Value;
use tracing::{debug, error, info, trace, warn};

/// Emit `frame` as a `tracing` event under the `capns.peer_log` target.
///
/// Frames that aren't `LOG`, or that carry no `meta.message`, are ignored.
/// An unrecognized `meta.level` falls back to `info`.
pub fn emit_log_frame(frame: &Frame) {
    if frame.frame_type != capns_frame::FrameType::Log {
        return;
    }
    let Some(meta) = frame.meta.as_ref() else {
        return;
    };
    let Some(message) = meta.get("message").and_then(Value::as_text) else {
        return;
    };
    let level = meta.get("level").and_then(Value::as_text).unwrap_or("info");
    match level {
        "trace" => trace!(target: "capns.peer_log", message),
        "debug" => debug!(target: "capns.peer_log", message),
        "warn" => warn!(target: "capns.peer_log", message),
        "error" => error!(target: "capns.peer_log", message),
        _ => info!(target: "capns.peer_log", message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capns_frame::{FrameId, FrameType};
    use std::collections::BTreeMap;

    fn log_frame(level: &str, message: &str) -> Frame {
        let mut meta = BTreeMap::new();
        meta.insert("level".to_owned(), Value::Text(level.to_owned()));
        meta.insert("message".to_owned(), Value::Text(message.to_owned()));
        let mut frame = Frame::new(2, FrameType::Log, FrameId::Number(0), 0);
        frame.meta = Some(meta);
        frame
    }

    #[test]
    fn non_log_frame_is_ignored() {
        let frame = Frame::new(2, FrameType::Heartbeat, FrameId::Number(1), 0);
        emit_log_frame(&frame); // must not panic
    }

    #[test]
    fn log_frame_without_message_is_ignored() {
        let frame = Frame::new(2, FrameType::Log, FrameId::Number(1), 0);
        emit_log_frame(&frame); // must not panic
    }

    #[test]
    fn log_frame_with_message_emits_without_panicking() {
        emit_log_frame(&log_frame("warn", "plugin is low on memory"));
        emit_log_frame(&log_frame("bogus-level", "falls back to info"));
    }
}
