// SPDX-License-Identifier: MIT OR Apache-2.0
//! Plugin-side error taxonomy. Mirrors [`capns_host::HostError`]'s shape
//! (the two sides of the same wire see roughly the same failure modes)
//! plus the handful of CLI-mode-only cases.

/// Errors raised by [`crate::PluginRuntime`] and its collaborators.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PluginError {
    /// The host's HELLO was malformed, or our own manifest failed
    /// validation before it could be sent.
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),
    /// No registered [`crate::CapHandler`] matches the requested cap.
    #[error("no handler registered for cap {0}")]
    NoHandler(String),
    /// A handler returned an error while servicing a request.
    #[error("handler failed: {0}")]
    HandlerFailed(String),
    /// Writing a frame to the transport failed.
    #[error("failed to send frame: {0}")]
    SendFailed(String),
    /// Reading a frame from the transport failed.
    #[error("failed to receive frame: {0}")]
    ReceiveFailed(String),
    /// The connection closed (host exited, or we are shutting down) while
    /// a request was still outstanding.
    #[error("request closed")]
    Closed,
    /// A peer-invoked call we issued came back with a terminal `ERR`.
    #[error("remote error {code}: {message}")]
    Remote {
        /// The `ERR` frame's stable `code` string.
        code: String,
        /// The `ERR` frame's human-readable message.
        message: String,
    },
    /// Our own manifest is missing the mandatory identity cap.
    #[error("manifest invalid: {0}")]
    InvalidManifest(#[from] capns_catalog::ManifestError),
    /// CLI-mode argument parsing failed: a required argument had no
    /// source that could satisfy it.
    #[error("missing required argument: {0}")]
    MissingArgument(String),
    /// CLI-mode invocation named a command with no matching cap.
    #[error("unrecognized subcommand: {0}")]
    UnknownSubcommand(String),
    /// A caller-supplied input or output could not be read/written.
    #[error("i/o error: {0}")]
    Io(String),
}

impl From<capns_transport::TransportError> for PluginError {
    fn from(err: capns_transport::TransportError) -> Self {
        Self::SendFailed(err.to_string())
    }
}

impl From<std::io::Error> for PluginError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
