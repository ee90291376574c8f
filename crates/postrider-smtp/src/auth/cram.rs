//! CRAM-MD5 keyed-hash response (RFC 2195).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use md5::Md5;

use crate::error::{Error, Result};

/// Computes the CRAM-MD5 response line for a decoded server challenge.
///
/// The digest is HMAC-MD5 keyed with the password over the challenge
/// bytes; the response is `base64(username SP lowercase-hex(digest))`.
///
/// # Errors
///
/// Returns an authentication-protocol error if the keyed hash cannot be
/// initialized from the password.
pub(crate) fn respond(username: &str, password: &str, challenge: &[u8]) -> Result<String> {
    let digest = digest(password.as_bytes(), challenge)?;
    let line = format!("{username} {}", hex(&digest));
    Ok(STANDARD.encode(line.as_bytes()))
}

/// HMAC-MD5 over the challenge, keyed with the shared secret.
pub(crate) fn digest(key: &[u8], challenge: &[u8]) -> Result<[u8; 16]> {
    let mut mac = <Hmac<Md5> as Mac>::new_from_slice(key)
        .map_err(|e| Error::AuthProtocol(format!("cannot key HMAC-MD5: {e}")))?;
    mac.update(challenge);
    Ok(mac.finalize().into_bytes().into())
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}
