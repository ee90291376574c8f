//! Core SMTP types.

mod address;
mod envelope;
mod progress;
mod response;
mod scheme;
mod server;

pub use address::Address;
pub use envelope::Envelope;
pub use progress::ProtocolProgress;
pub use response::{CommandKind, Phase, ReplyCode, Response, ResponseKind, TextEncoding};
pub use scheme::{AuthScheme, SchemeSet, SchemeSupport};
pub use server::{Credentials, CredentialsProvider, ServerProfile, StaticCredentials};
