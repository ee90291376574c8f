//! Authentication strategies for the AUTH sub-protocol.
//!
//! One [`Authenticator`] drives the challenge/response exchange for a
//! single session. The engine alternates [`Authenticator::submit_challenge`]
//! and [`Authenticator::response`] once per round trip; how many round
//! trips a scheme needs is fixed per variant.

mod cram;
mod digest;

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::{Error, Result};
use crate::types::{AuthScheme, Credentials, CredentialsProvider};

/// Challenge/response strategy for one authentication scheme.
///
/// Constructed exclusively through [`Authenticator::for_scheme`]; there is
/// no meaningful default instance without a scheme.
pub struct Authenticator {
    scheme: AuthScheme,
    provider: Arc<dyn CredentialsProvider>,
    credentials: Option<Credentials>,
    variant: Variant,
}

enum Variant {
    None,
    Plain,
    Login,
    CramMd5 {
        challenge: Option<Vec<u8>>,
    },
    DigestMd5 {
        digest_uri: String,
        challenge: Option<digest::DigestChallenge>,
    },
}

impl Authenticator {
    /// Creates the strategy for the given scheme.
    ///
    /// `hostname` is the server host, used by DIGEST-MD5 for its
    /// `digest-uri`. Credentials are not read here; the provider is
    /// consulted lazily when the first round trip needs them.
    #[must_use]
    pub fn for_scheme(
        scheme: AuthScheme,
        provider: Arc<dyn CredentialsProvider>,
        hostname: &str,
    ) -> Self {
        let variant = match scheme {
            AuthScheme::None => Variant::None,
            AuthScheme::Plain => Variant::Plain,
            AuthScheme::Login => Variant::Login,
            AuthScheme::CramMd5 => Variant::CramMd5 { challenge: None },
            AuthScheme::DigestMd5 => Variant::DigestMd5 {
                digest_uri: format!("smtp/{hostname}"),
                challenge: None,
            },
        };
        Self {
            scheme,
            provider,
            credentials: None,
            variant,
        }
    }

    /// The scheme this strategy implements.
    #[must_use]
    pub const fn scheme(&self) -> AuthScheme {
        self.scheme
    }

    /// Number of challenge/response round trips the scheme needs.
    #[must_use]
    pub const fn round_trips(&self) -> u8 {
        match self.scheme {
            AuthScheme::None => 0,
            AuthScheme::Plain | AuthScheme::CramMd5 => 1,
            AuthScheme::Login | AuthScheme::DigestMd5 => 2,
        }
    }

    /// Feeds the decoded challenge text of the given round trip.
    ///
    /// # Errors
    ///
    /// Returns an authentication-protocol error if the round index exceeds
    /// the scheme's round trips or the challenge cannot be decoded.
    pub fn submit_challenge(&mut self, text: &str, round: u8) -> Result<()> {
        self.check_round(round)?;

        match &mut self.variant {
            // LOGIN/PLAIN prompts are informational only
            Variant::None | Variant::Plain | Variant::Login => Ok(()),
            Variant::CramMd5 { challenge } => {
                let decoded = STANDARD.decode(text.trim()).map_err(|e| {
                    Error::AuthProtocol(format!("undecodable CRAM-MD5 challenge: {e}"))
                })?;
                *challenge = Some(decoded);
                Ok(())
            }
            Variant::DigestMd5 { challenge, .. } => {
                if round == 0 {
                    let decoded = STANDARD.decode(text.trim()).map_err(|e| {
                        Error::AuthProtocol(format!("undecodable DIGEST-MD5 challenge: {e}"))
                    })?;
                    let decoded = String::from_utf8(decoded).map_err(|e| {
                        Error::AuthProtocol(format!("DIGEST-MD5 challenge is not UTF-8: {e}"))
                    })?;
                    *challenge = Some(digest::parse_challenge(&decoded)?);
                }
                // round 1 carries the server's rspauth; there is nothing to
                // extract from it for the empty acknowledgement
                Ok(())
            }
        }
    }

    /// Produces the response line for the given round trip.
    ///
    /// # Errors
    ///
    /// Returns an authentication-protocol error if the round index exceeds
    /// the scheme's round trips or no challenge was submitted where the
    /// scheme needs one.
    pub fn response(&mut self, round: u8) -> Result<String> {
        self.check_round(round)?;
        let creds = self.credentials();

        match (&self.variant, round) {
            (Variant::Plain, 0) => Ok(STANDARD.encode(
                format!("\0{}\0{}", creds.username, creds.password).as_bytes(),
            )),
            (Variant::Login, 0) => Ok(STANDARD.encode(creds.username.as_bytes())),
            (Variant::Login, 1) => Ok(STANDARD.encode(creds.password.as_bytes())),
            (Variant::CramMd5 { challenge }, 0) => {
                let challenge = challenge.as_ref().ok_or_else(|| {
                    Error::AuthProtocol("no CRAM-MD5 challenge submitted".into())
                })?;
                cram::respond(&creds.username, &creds.password, challenge)
            }
            (
                Variant::DigestMd5 {
                    digest_uri,
                    challenge,
                },
                0,
            ) => {
                let challenge = challenge.as_ref().ok_or_else(|| {
                    Error::AuthProtocol("no DIGEST-MD5 challenge submitted".into())
                })?;
                let cnonce = digest::generate_cnonce();
                let line = digest::respond(
                    &creds.username,
                    &creds.password,
                    challenge,
                    digest_uri,
                    &cnonce,
                );
                Ok(STANDARD.encode(line.as_bytes()))
            }
            // acknowledge the server's rspauth
            (Variant::DigestMd5 { .. }, 1) => Ok(String::new()),
            _ => Err(Error::AuthProtocol(format!(
                "no response defined for round trip {round}"
            ))),
        }
    }

    fn check_round(&self, round: u8) -> Result<()> {
        if round >= self.round_trips() {
            return Err(Error::AuthProtocol(format!(
                "round trip {round} exceeds the {} round trips of {:?}",
                self.round_trips(),
                self.scheme
            )));
        }
        Ok(())
    }

    /// Credentials are read from the provider exactly once, the first time
    /// a round trip needs them.
    fn credentials(&mut self) -> Credentials {
        self.credentials
            .get_or_insert_with(|| self.provider.credentials())
            .clone()
    }
}
