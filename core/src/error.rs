//! Error types for the session pipeline.
//!
//! # Design
//! Every failure a caller can observe lands in one `Error` enum so endpoint
//! call sites only ever match a single type. The variants follow the points
//! in the pipeline where a call can stop: configuration before any I/O,
//! bootstrap, misuse of a session that is not `Ready`, the crypto codec, the
//! server's own status code, and the transport.
//!
//! `Api` keeps the server's code and message verbatim. Its `code` is `None`
//! only when the HTTP layer itself answered with a non-2xx status.

use thiserror::Error;

use crate::context::SessionState;
use crate::http::TransportError;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by session construction, bootstrap and endpoint calls.
#[derive(Debug, Error)]
pub enum Error {
    /// Identity fields or options were rejected before any network access.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The login handshake failed. The session must be bootstrapped again
    /// (or rebuilt) before it can be used.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// The session was used in a state that does not allow the operation.
    #[error("session misuse: {operation} is not allowed while the session is {state}")]
    Misuse {
        operation: &'static str,
        state: SessionState,
    },

    /// The crypto codec could not encrypt or decrypt a payload.
    #[error("crypto codec failure: {0}")]
    Encryption(&'static str),

    /// The server rejected the call with a nonzero status code.
    #[error("api error{}: {message}", .code.map(|c| format!(" {c}")).unwrap_or_default())]
    Api { code: Option<i64>, message: String },

    /// The transport could not complete the round-trip.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The service locator has no candidates for this service name.
    #[error("unknown service: {0}")]
    UnknownService(String),

    /// A base URL could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request parameters could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A reply or its payload could not be deserialized.
    #[error("deserialization failed: {0}")]
    Deserialization(String),
}

impl Error {
    /// The server's status code, when this is an `Api` error that carries one.
    pub fn api_code(&self) -> Option<i64> {
        match self {
            Error::Api { code, .. } => *code,
            _ => None,
        }
    }
}

/// Reasons the login handshake can fail.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The server answered with a nonzero status code.
    #[error("handshake rejected ({code}): {message}")]
    Rejected { code: i64, message: String },

    /// The reply was not the JSON shape the handshake expects.
    #[error("malformed handshake reply: {0}")]
    MalformedReply(String),

    /// A field the session needs was absent or empty.
    #[error("handshake reply is missing `{0}`")]
    MissingField(&'static str),

    /// The handshake never reached the server.
    #[error("handshake transport failure: {0}")]
    Transport(#[source] TransportError),
}
