//! The message value object the engine transmits.

use super::Address;
use crate::error::{Error, Result};

/// One message transmission: sender, recipients and the RFC 5322 payload.
///
/// The engine treats the payload as opaque bytes; line-ending
/// normalization and dot-stuffing happen when the request is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    sender: Address,
    recipients: Vec<Address>,
    body: Vec<u8>,
}

impl Envelope {
    /// Creates a new envelope.
    ///
    /// # Errors
    ///
    /// Returns an error if `recipients` is empty.
    pub fn new(
        sender: Address,
        recipients: Vec<Address>,
        body: impl Into<Vec<u8>>,
    ) -> Result<Self> {
        if recipients.is_empty() {
            return Err(Error::EmptyEnvelope);
        }
        Ok(Self {
            sender,
            recipients,
            body: body.into(),
        })
    }

    /// The envelope sender (MAIL FROM).
    #[must_use]
    pub const fn sender(&self) -> &Address {
        &self.sender
    }

    /// The envelope recipients (one RCPT TO each).
    #[must_use]
    pub fn recipients(&self) -> &[Address] {
        &self.recipients
    }

    /// The message payload.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}
