//! SMTP request builder.

use crate::types::{Address, ResponseKind};

/// SMTP command, serialized to wire text on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// EHLO - Extended greeting
    Ehlo {
        /// Name announced to the server
        greeting: String,
    },
    /// AUTH - Begin authentication
    Auth {
        /// SASL mechanism name
        mechanism: &'static str,
    },
    /// One client line of an AUTH round trip
    AuthResponse {
        /// Base64 response produced by the authenticator
        line: String,
    },
    /// MAIL FROM - Start mail transaction
    MailFrom {
        /// Sender address
        from: Address,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Recipient address
        to: Address,
    },
    /// DATA - Request the go-ahead for the message payload
    Data,
    /// The message payload, terminated by the lone-dot line
    MessageBody {
        /// RFC 5322 message bytes
        body: Vec<u8>,
    },
    /// RSET - Reset transaction
    Rset,
    /// QUIT - Close connection
    Quit,
}

impl Command {
    /// Serializes the command to bytes.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        match self {
            Self::Ehlo { greeting } => {
                buf.extend_from_slice(b"EHLO ");
                buf.extend_from_slice(greeting.as_bytes());
            }
            Self::Auth { mechanism } => {
                buf.extend_from_slice(b"AUTH ");
                buf.extend_from_slice(mechanism.as_bytes());
            }
            Self::AuthResponse { line } => {
                buf.extend_from_slice(line.as_bytes());
            }
            Self::MailFrom { from } => {
                buf.extend_from_slice(b"MAIL FROM:<");
                buf.extend_from_slice(from.as_str().as_bytes());
                buf.push(b'>');
            }
            Self::RcptTo { to } => {
                buf.extend_from_slice(b"RCPT TO:<");
                buf.extend_from_slice(to.as_str().as_bytes());
                buf.push(b'>');
            }
            Self::Data => {
                buf.extend_from_slice(b"DATA");
            }
            Self::MessageBody { body } => {
                return serialize_body(body);
            }
            Self::Rset => {
                buf.extend_from_slice(b"RSET");
            }
            Self::Quit => {
                buf.extend_from_slice(b"QUIT");
            }
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }
}

/// Normalizes line endings to CRLF, dot-stuffs leading periods and appends
/// the end-of-message terminator.
fn serialize_body(body: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(body.len() + 8);

    let mut lines: Vec<&[u8]> = if body.is_empty() {
        Vec::new()
    } else {
        body.split(|&b| b == b'\n').collect()
    };
    if body.last() == Some(&b'\n') {
        // the trailing newline already ended the final line
        lines.pop();
    }

    for line in lines {
        let line = if line.last() == Some(&b'\r') {
            &line[..line.len() - 1]
        } else {
            line
        };

        if line.first() == Some(&b'.') {
            buf.push(b'.');
        }
        buf.extend_from_slice(line);
        buf.extend_from_slice(b"\r\n");
    }

    buf.extend_from_slice(b".\r\n");
    buf
}

/// A serialized request together with the kind of reply it solicits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    kind: ResponseKind,
    bytes: Vec<u8>,
}

impl Request {
    /// Builds the wire bytes for a command.
    #[must_use]
    pub fn new(kind: ResponseKind, command: &Command) -> Self {
        Self {
            kind,
            bytes: command.serialize(),
        }
    }

    /// The kind of reply this request solicits.
    #[must_use]
    pub const fn kind(&self) -> ResponseKind {
        self.kind
    }

    /// The bytes sent on the wire.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}
