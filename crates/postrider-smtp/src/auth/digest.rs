//! DIGEST-MD5 challenge/response computation (RFC 2831).

use md5::{Digest, Md5};
use rand::Rng;

use super::cram::hex;
use crate::error::{Error, Result};

/// Fields of a decoded `digest-challenge`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub qop: String,
}

/// Parses the comma-separated `key=value` challenge list.
///
/// Values may be quoted and quoted values may contain commas
/// (e.g. `qop="auth,auth-int"`).
///
/// # Errors
///
/// Returns an authentication-protocol error if the nonce is missing or the
/// server does not offer the `auth` quality of protection.
pub(crate) fn parse_challenge(text: &str) -> Result<DigestChallenge> {
    let mut realm = String::new();
    let mut nonce = None;
    let mut qop = "auth".to_string();

    for (key, value) in pairs(text) {
        match key.as_str() {
            "realm" => realm = value,
            "nonce" => nonce = Some(value),
            "qop" => qop = value,
            _ => {}
        }
    }

    let Some(nonce) = nonce else {
        return Err(Error::AuthProtocol(
            "DIGEST-MD5 challenge carries no nonce".into(),
        ));
    };
    if !qop.split(',').any(|q| q.trim() == "auth") {
        return Err(Error::AuthProtocol(format!(
            "DIGEST-MD5 qop \"{qop}\" does not offer auth"
        )));
    }

    Ok(DigestChallenge { realm, nonce, qop })
}

/// Computes the `digest-response` line for a parsed challenge.
///
/// Uses the md5-sess construction with `qop=auth` and `nc=00000001`; the
/// caller base64-encodes the returned line.
pub(crate) fn respond(
    username: &str,
    password: &str,
    challenge: &DigestChallenge,
    digest_uri: &str,
    cnonce: &str,
) -> String {
    let DigestChallenge { realm, nonce, .. } = challenge;
    let nc = "00000001";

    // A1 = H(user:realm:pass) : nonce : cnonce, fed to H as raw bytes
    let mut a1 = md5_raw(format!("{username}:{realm}:{password}").as_bytes()).to_vec();
    a1.extend_from_slice(format!(":{nonce}:{cnonce}").as_bytes());
    let ha1 = hex(&md5_raw(&a1));

    let ha2 = hex(&md5_raw(format!("AUTHENTICATE:{digest_uri}").as_bytes()));
    let response = hex(&md5_raw(
        format!("{ha1}:{nonce}:{nc}:{cnonce}:auth:{ha2}").as_bytes(),
    ));

    format!(
        "username=\"{username}\",realm=\"{realm}\",nonce=\"{nonce}\",cnonce=\"{cnonce}\",\
         nc={nc},qop=auth,digest-uri=\"{digest_uri}\",response={response},charset=utf-8"
    )
}

/// Random client nonce, hex-encoded.
pub(crate) fn generate_cnonce() -> String {
    let bytes: Vec<u8> = (0..16).map(|_| rand::thread_rng().r#gen::<u8>()).collect();
    hex(&bytes)
}

fn md5_raw(bytes: &[u8]) -> [u8; 16] {
    Md5::digest(bytes).into()
}

fn pairs(text: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut rest = text.trim();

    while let Some(eq) = rest.find('=') {
        let key = rest[..eq].trim().trim_start_matches(',').trim().to_ascii_lowercase();
        rest = &rest[eq + 1..];

        let value = if let Some(quoted) = rest.strip_prefix('"') {
            let end = quoted.find('"').unwrap_or(quoted.len());
            let value = quoted[..end].to_string();
            rest = quoted.get(end + 1..).unwrap_or("");
            value
        } else {
            let end = rest.find(',').unwrap_or(rest.len());
            let value = rest[..end].trim().to_string();
            rest = &rest[end..];
            value
        };

        rest = rest.trim_start().trim_start_matches(',');
        out.push((key, value));
    }

    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    // Challenge and response values from the RFC 2831 §4 example.
    const CHALLENGE: &str = "realm=\"elwood.innosoft.com\",nonce=\"OA6MG9tEQGm2hh\",\
                             qop=\"auth\",algorithm=md5-sess,charset=utf-8";

    #[test]
    fn parses_quoted_values() {
        let challenge = parse_challenge(CHALLENGE).unwrap();
        assert_eq!(challenge.realm, "elwood.innosoft.com");
        assert_eq!(challenge.nonce, "OA6MG9tEQGm2hh");
        assert_eq!(challenge.qop, "auth");
    }

    #[test]
    fn quoted_qop_list_with_comma() {
        let challenge =
            parse_challenge("nonce=\"abc\",qop=\"auth,auth-int\",realm=\"r\"").unwrap();
        assert_eq!(challenge.qop, "auth,auth-int");
        assert_eq!(challenge.realm, "r");
    }

    #[test]
    fn missing_nonce_is_rejected() {
        assert!(parse_challenge("realm=\"r\",qop=\"auth\"").is_err());
    }

    #[test]
    fn qop_without_auth_is_rejected() {
        assert!(parse_challenge("nonce=\"abc\",qop=\"auth-int\"").is_err());
    }

    #[test]
    fn matches_rfc_2831_reference_response() {
        let challenge = parse_challenge(CHALLENGE).unwrap();
        let line = respond(
            "chris",
            "secret",
            &challenge,
            "imap/elwood.innosoft.com",
            "OA6MHXh6VqTrRk",
        );
        assert!(
            line.contains("response=d388dad90d4bbd760a152321f2143af7"),
            "{line}"
        );
        assert!(line.contains("username=\"chris\""));
        assert!(line.contains("nc=00000001"));
        assert!(line.contains("digest-uri=\"imap/elwood.innosoft.com\""));
    }

    #[test]
    fn response_is_cnonce_sensitive() {
        let challenge = parse_challenge(CHALLENGE).unwrap();
        let a = respond("chris", "secret", &challenge, "smtp/host", "cnonce-a");
        let b = respond("chris", "secret", &challenge, "smtp/host", "cnonce-b");
        assert_ne!(a, b);
    }

    #[test]
    fn cnonce_is_hex_and_unique() {
        let a = generate_cnonce();
        let b = generate_cnonce();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }
}
