use crate::ws::{protocol::Response, session::ConnectionState, transport::TransportError};

/// Which catalog a key was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogKind {
    Expression,
    Motion,
}

impl std::fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogKind::Expression => f.write_str("expression"),
            CatalogKind::Motion => f.write_str("motion"),
        }
    }
}

/// Everything a controller call can fail with.
///
/// All variants are returned synchronously from the call that caused them;
/// latency alerts travel separately through the notifier.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    /// The transport could not be opened, or died during the handshake.
    #[error("failed to connect to {url}: {source}")]
    Connection {
        url: String,
        #[source]
        source: TransportError,
    },
    /// The handshake reply did not acknowledge the protocol version.
    #[error("authentication failed: {reason}")]
    Authentication { reason: String, reply: String },
    /// A command was issued outside the authenticated state. Nothing was sent.
    #[error("not connected (state: {state:?})")]
    NotConnected { state: ConnectionState },
    /// The reply did not echo the request type. The connection is still usable.
    #[error("unexpected response to `{expected}`: got `{}`", .response.discriminator)]
    Protocol { expected: String, response: Response },
    /// The transport failed mid-command. The connection should be considered lost.
    #[error("transport failed during `{request_type}`: {source}")]
    Transport {
        request_type: String,
        #[source]
        source: TransportError,
    },
    /// A catalog helper was given a key that is not configured. Nothing was sent.
    #[error("unknown {kind} key `{key}`")]
    UnknownKey { kind: CatalogKind, key: String },
    /// No `TriggerAnimation` hotkey of the current model carries this name.
    #[error("no animation hotkey named `{name}`")]
    UnknownAnimation { name: String },
    /// The request could not be encoded. Nothing was sent.
    #[error("failed to encode request: {0}")]
    Serialization(#[from] serde_json::Error),
}
