//! SMTP reply parser and per-stage validation.
//!
//! Replies are one or more CRLF-terminated lines, each starting with the
//! same 3-digit code. Continuation lines carry `-` after the code, the
//! final line a space (or nothing):
//!
//! - Single: `250 OK\r\n`
//! - Multi: `250-First line\r\n250-Second line\r\n250 Last line\r\n`
//!
//! The parser is incremental: it is handed whatever bytes have arrived so
//! far and reports [`Parse::Incomplete`] until the terminal line is
//! present, so the engine's read loop can keep pulling from the socket
//! without ever misreading a half-received reply as malformed.

use crate::types::{
    AuthScheme, CommandKind, Phase, ReplyCode, Response, ResponseKind, SchemeSet, SchemeSupport,
    TextEncoding,
};

/// Outcome of feeding buffered bytes to the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parse {
    /// A full reply was present; its raw bytes were consumed.
    Complete(Response),
    /// The buffer ends mid-reply; read more bytes and try again.
    Incomplete,
    /// The bytes do not match the reply grammar.
    Invalid,
}

/// How a reply code relates to its stage's RFC tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Code is in the stage's success set.
    Success,
    /// Code is in the stage's error set.
    Rejected,
    /// Code is in neither set.
    Unexpected,
}

/// Parses a reply of the given kind from buffered bytes.
#[must_use]
pub fn parse(raw: &[u8], kind: ResponseKind) -> Parse {
    let mut code: Option<u16> = None;
    let mut text: Vec<u8> = Vec::new();
    let mut pos = 0;

    loop {
        let rest = &raw[pos..];
        let Some(eol) = find_crlf(rest) else {
            return if is_plausible_prefix(rest) {
                Parse::Incomplete
            } else {
                Parse::Invalid
            };
        };

        let line = &rest[..eol];
        let Some((line_code, last, segment)) = split_line(line) else {
            return Parse::Invalid;
        };
        if code.is_some_and(|c| c != line_code) {
            // all lines of one reply carry the same code
            return Parse::Invalid;
        }
        code = Some(line_code);

        if !text.is_empty() {
            text.push(b'\n');
        }
        text.extend_from_slice(segment);
        pos += eol + 2;

        if last {
            let (decoded, encoding) = decode_text(&text);
            return Parse::Complete(Response::new(
                kind,
                ReplyCode::new(line_code),
                decoded,
                raw[..pos].to_vec(),
                encoding,
            ));
        }
    }
}

/// Success codes for a stage, per RFC 2821 §4.3.2 and RFC 2554.
#[must_use]
pub fn success_codes(kind: ResponseKind) -> &'static [u16] {
    match (kind.command(), kind.phase()) {
        (CommandKind::Connect, _) => &[220],
        (CommandKind::Ehlo | CommandKind::Mail | CommandKind::Rset, _)
        | (CommandKind::Data, Some(Phase::MessageAccepted)) => &[250],
        (CommandKind::Auth, Some(Phase::AuthContinue(_))) => &[334],
        (CommandKind::Auth, _) => &[235],
        (CommandKind::Rcpt, _) => &[250, 251],
        (CommandKind::Data, _) => &[354],
        (CommandKind::Quit, _) => &[221],
    }
}

/// Error codes for a stage, per RFC 2821 §4.3.2 and RFC 2554 §6.
#[must_use]
pub fn error_codes(kind: ResponseKind) -> &'static [u16] {
    match (kind.command(), kind.phase()) {
        (CommandKind::Connect, _) => &[554],
        (CommandKind::Ehlo, _) => &[504, 550],
        (CommandKind::Auth, _) => &[432, 454, 500, 501, 503, 504, 530, 534, 535, 538],
        (CommandKind::Mail, _) => &[552, 451, 452, 550, 553, 503],
        (CommandKind::Rcpt, _) => &[550, 551, 552, 553, 450, 451, 452, 503],
        (CommandKind::Data, Some(Phase::MessageAccepted)) => &[552, 554, 451, 452],
        (CommandKind::Data, _) => &[451, 554, 503],
        (CommandKind::Rset | CommandKind::Quit, _) => &[],
    }
}

/// Checks a reply against its stage's tables.
///
/// Codes outside both the success and the error set are [`Verdict::Unexpected`]
/// and must be treated as failure by the caller.
#[must_use]
pub fn classify(response: &Response) -> Verdict {
    let code = response.code().as_u16();
    if success_codes(response.kind()).contains(&code) {
        Verdict::Success
    } else if error_codes(response.kind()).contains(&code) {
        Verdict::Rejected
    } else {
        Verdict::Unexpected
    }
}

/// Returns true if the reply code is in its stage's success set.
#[must_use]
pub fn is_success(response: &Response) -> bool {
    classify(response) == Verdict::Success
}

/// Returns true if the reply code is in its stage's error set.
#[must_use]
pub fn is_error(response: &Response) -> bool {
    classify(response) == Verdict::Rejected
}

/// Detects the authentication schemes advertised in an EHLO reply.
///
/// Scans the reply text for an `AUTH` capability line (tokens separated by
/// spaces or `=`) and unions the recognized mechanisms. A non-EHLO reply
/// yields [`SchemeSupport::Unknown`]; an EHLO reply without recognizable
/// mechanisms yields an empty detected set.
#[must_use]
pub fn supported_schemes(response: &Response) -> SchemeSupport {
    if response.kind().command() != CommandKind::Ehlo {
        return SchemeSupport::Unknown;
    }

    let mut set = SchemeSet::empty();
    for line in response.text().lines() {
        let mut tokens = line
            .split(|c: char| c.is_whitespace() || c == '=')
            .filter(|t| !t.is_empty());
        if tokens.next().is_some_and(|t| t.eq_ignore_ascii_case("AUTH")) {
            for token in tokens {
                if let Some(scheme) = AuthScheme::parse(token) {
                    set = set.union(scheme.bits());
                }
            }
        }
    }
    SchemeSupport::Detected(set)
}

fn find_crlf(bytes: &[u8]) -> Option<usize> {
    bytes.windows(2).position(|w| w == b"\r\n")
}

/// Splits one complete reply line into (code, is-last, text bytes).
fn split_line(line: &[u8]) -> Option<(u16, bool, &[u8])> {
    if line.len() < 3 || !line[..3].iter().all(u8::is_ascii_digit) {
        return None;
    }
    // a stray CR inside the line cannot occur in a conforming reply
    if line.contains(&b'\r') {
        return None;
    }

    let code = line[..3]
        .iter()
        .fold(0_u16, |acc, &d| acc * 10 + u16::from(d - b'0'));

    match line.get(3) {
        None => Some((code, true, &[][..])),
        Some(b' ') => Some((code, true, &line[4..])),
        Some(b'-') => Some((code, false, &line[4..])),
        Some(_) => None,
    }
}

/// Could these bytes still grow into a valid reply line?
fn is_plausible_prefix(partial: &[u8]) -> bool {
    let last = partial.len().saturating_sub(1);
    partial.iter().enumerate().all(|(i, &b)| match i {
        0..=2 => b.is_ascii_digit(),
        3 => b == b'-' || b == b' ' || (b == b'\r' && i == last),
        _ => match b {
            b'\n' => false,
            b'\r' => i == last,
            _ => true,
        },
    })
}

/// Decodes reply text, recording which decoding succeeded.
fn decode_text(bytes: &[u8]) -> (String, TextEncoding) {
    match std::str::from_utf8(bytes) {
        Ok(text) => (text.to_owned(), TextEncoding::Utf8),
        Err(_) => (
            bytes.iter().map(|&b| char::from(b)).collect(),
            TextEncoding::Latin1,
        ),
    }
}
