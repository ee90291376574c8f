//! Error types for SMTP sessions.

use std::io;

use crate::types::{AuthScheme, ResponseKind};

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Terminal session errors.
///
/// An incomplete reply is not represented here: the engine keeps reading
/// until the parser has a full reply, so only genuine failures surface.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Connect/read/write failure on the transport.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// The server bytes did not match the reply grammar.
    #[error("malformed reply at {stage}")]
    InvalidReply {
        /// Stage whose reply was malformed.
        stage: ResponseKind,
    },

    /// No mutually acceptable authentication scheme.
    #[error("server does not support authentication scheme {scheme:?}")]
    UnsupportedScheme {
        /// The scheme the caller asked for.
        scheme: AuthScheme,
    },

    /// Authentication sub-protocol violation (round trips exhausted,
    /// undecodable challenge, or the server asking for more rounds than
    /// the scheme has).
    #[error("authentication protocol error: {0}")]
    AuthProtocol(String),

    /// Valid reply whose code is in the stage's error set.
    #[error("server rejected {stage} with {code}: {message}")]
    Rejected {
        /// Stage the server rejected.
        stage: ResponseKind,
        /// The error reply code.
        code: u16,
        /// The reply text.
        message: String,
    },

    /// Valid reply whose code is in neither the success nor the error set.
    #[error("unexpected {code} reply at {stage}: {message}")]
    UnexpectedReply {
        /// Stage that received the reply.
        stage: ResponseKind,
        /// The out-of-table reply code.
        code: u16,
        /// The reply text.
        message: String,
    },

    /// A checkpoint exceeded its time budget.
    #[error("timed out at {stage}")]
    Timeout {
        /// Stage whose checkpoint expired.
        stage: ResponseKind,
    },

    /// The session was cancelled while a checkpoint was pending.
    #[error("cancelled at {stage}")]
    Cancelled {
        /// Stage that was pending at cancellation.
        stage: ResponseKind,
    },

    /// Invalid envelope address.
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    /// Envelope without recipients.
    #[error("envelope has no recipients")]
    EmptyEnvelope,
}

impl Error {
    /// Returns true if this is a server rejection with a permanent (5xx)
    /// code.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Rejected { code, .. } if *code >= 500 && *code < 600)
    }

    /// Returns true if this is a server rejection with a transient (4xx)
    /// code.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Rejected { code, .. } if *code >= 400 && *code < 500)
    }
}
