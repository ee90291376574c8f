//! # postrider-smtp
//!
//! An SMTP client protocol engine implementing RFC 2821 and RFC 2554.
//!
//! ## Features
//!
//! - **Sequential protocol engine**: one cancellable session per
//!   transmission, driven as send-then-await checkpoints with
//!   per-checkpoint timeouts
//! - **Full command sequence**: CONNECT, EHLO, AUTH, MAIL FROM, RCPT TO,
//!   DATA, RSET, QUIT
//! - **Authentication**: PLAIN, LOGIN, CRAM-MD5, DIGEST-MD5, driven as
//!   challenge/response round trips with lazily fetched credentials
//! - **RFC-checked replies**: every reply code is validated against the
//!   per-stage tables of RFC 2821 §4.3.2 and RFC 2554 §6
//! - **TLS support**: implicit TLS via the server profile's TLS flag
//! - **Verification mode**: validate credentials without sending mail
//!
//! ## Quick Start
//!
//! ```ignore
//! use postrider_smtp::{Address, AuthScheme, Envelope, ServerProfile, Transporter};
//!
//! #[tokio::main]
//! async fn main() -> postrider_smtp::Result<()> {
//!     let server = ServerProfile::new("smtp.example.com", 587)
//!         .preferred_scheme(AuthScheme::CramMd5)
//!         .credentials("user@example.com", "password");
//!
//!     let envelope = Envelope::new(
//!         Address::new("sender@example.com")?,
//!         vec![Address::new("recipient@example.com")?],
//!         b"Subject: Test\r\n\r\nHello, World!\r\n".as_slice(),
//!     )?;
//!
//!     let mut session = Transporter::new(envelope, server);
//!     session.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Session Flow
//!
//! ```text
//! Idle → Connecting → Connected → EhloSent → SchemeSelected
//!      → Authenticating(round) → Authenticated | NoAuthNeeded
//!      → MailSent → RcptSent → DataReady → BodySent
//!      → QuitSent → Closed       (terminal: Succeeded | Failed)
//! ```
//!
//! A verification session ([`Transporter::verifier`]) stops after
//! authentication and never starts a mail transaction.
//!
//! ## Modules
//!
//! - [`command`]: SMTP request builder
//! - [`connection`]: Stream handling and session configuration
//! - [`parser`]: Reply parser and per-stage validation
//! - [`auth`]: Challenge/response authentication strategies
//! - [`transporter`]: The protocol engine
//! - [`types`]: Core SMTP types (replies, schemes, envelope, server profile)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod transporter;
pub mod types;

pub use connection::SessionConfig;
pub use error::{Error, Result};
pub use transporter::{
    CancelHandle, SessionState, Transporter, send_message, verify_credentials,
};
pub use types::{
    Address, AuthScheme, CommandKind, Credentials, CredentialsProvider, Envelope, Phase,
    ProtocolProgress, ReplyCode, Response, ResponseKind, SchemeSet, SchemeSupport, ServerProfile,
    StaticCredentials, TextEncoding,
};

/// SMTP protocol version supported.
pub const SMTP_VERSION: &str = "SMTP/ESMTP (RFC 2821, AUTH per RFC 2554)";
