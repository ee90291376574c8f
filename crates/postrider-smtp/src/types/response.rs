//! Typed server replies.

/// Primary command tag of a reply.
///
/// Every reply the engine reads is solicited by exactly one command stage;
/// the tag names that stage. The EHLO/HELO stage shares one tag since both
/// greetings are validated against the same reply-code table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Connection establishment (the server greeting).
    Connect,
    /// EHLO (or HELO) greeting.
    Ehlo,
    /// AUTH negotiation.
    Auth,
    /// MAIL FROM.
    Mail,
    /// RCPT TO.
    Rcpt,
    /// DATA.
    Data,
    /// RSET.
    Rset,
    /// QUIT.
    Quit,
}

impl CommandKind {
    /// Returns the stage name as it appears on the wire.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Connect => "CONNECT",
            Self::Ehlo => "EHLO",
            Self::Auth => "AUTH",
            Self::Mail => "MAIL",
            Self::Rcpt => "RCPT",
            Self::Data => "DATA",
            Self::Rset => "RSET",
            Self::Quit => "QUIT",
        }
    }
}

/// Phase subtag refining a [`CommandKind`].
///
/// A phase never replaces the primary tag, it narrows it: the reply to the
/// message payload is still a DATA-stage reply, an intermediate AUTH
/// challenge is still an AUTH-stage reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// An intermediate AUTH challenge for the given round trip.
    AuthContinue(u8),
    /// The reply after the message payload was transferred.
    MessageAccepted,
}

/// The composite kind of a reply: primary command tag plus optional phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResponseKind {
    command: CommandKind,
    phase: Option<Phase>,
}

impl ResponseKind {
    /// Kind for the plain reply of a command stage.
    #[must_use]
    pub const fn of(command: CommandKind) -> Self {
        Self {
            command,
            phase: None,
        }
    }

    /// Kind for the AUTH challenge of the given round trip.
    #[must_use]
    pub const fn auth_round(round: u8) -> Self {
        Self {
            command: CommandKind::Auth,
            phase: Some(Phase::AuthContinue(round)),
        }
    }

    /// Kind for the reply acknowledging the transferred message payload.
    #[must_use]
    pub const fn message_accepted() -> Self {
        Self {
            command: CommandKind::Data,
            phase: Some(Phase::MessageAccepted),
        }
    }

    /// The primary command tag.
    #[must_use]
    pub const fn command(self) -> CommandKind {
        self.command
    }

    /// The phase subtag, if any.
    #[must_use]
    pub const fn phase(self) -> Option<Phase> {
        self.phase
    }
}

impl std::fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.phase {
            None => write!(f, "{}", self.command.name()),
            Some(Phase::AuthContinue(round)) => {
                write!(f, "{} round trip {round}", self.command.name())
            }
            Some(Phase::MessageAccepted) => write!(f, "{} payload", self.command.name()),
        }
    }
}

/// Which decoding produced the reply text.
///
/// Servers are not obliged to send UTF-8; callers must not assume a fixed
/// encoding and can inspect which one was actually used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    /// The reply text decoded as valid UTF-8.
    Utf8,
    /// UTF-8 decoding failed; bytes were mapped as ISO-8859-1.
    Latin1,
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns true if this is a success code (2xx).
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Returns true if this is an intermediate code (3xx).
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.0 >= 300 && self.0 < 400
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.0 >= 400 && self.0 < 500
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.0 >= 500 && self.0 < 600
    }
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Common reply codes
impl ReplyCode {
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 235 Authentication successful
    pub const AUTH_SUCCEEDED: Self = Self(235);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 251 User not local; will forward
    pub const FORWARD: Self = Self(251);
    /// 334 Continue with authentication
    pub const AUTH_CONTINUE: Self = Self(334);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);
    /// 432 A password transition is needed
    pub const PASSWORD_TRANSITION: Self = Self(432);
    /// 450 Mailbox unavailable (busy)
    pub const MAILBOX_BUSY: Self = Self(450);
    /// 451 Local error in processing
    pub const LOCAL_ERROR: Self = Self(451);
    /// 452 Insufficient system storage
    pub const INSUFFICIENT_STORAGE: Self = Self(452);
    /// 454 Temporary authentication failure
    pub const TEMP_AUTH_FAILURE: Self = Self(454);
    /// 500 Syntax error, command unrecognized
    pub const SYNTAX_ERROR: Self = Self(500);
    /// 501 Syntax error in parameters or arguments
    pub const PARAMETER_ERROR: Self = Self(501);
    /// 503 Bad sequence of commands
    pub const BAD_SEQUENCE: Self = Self(503);
    /// 504 Command parameter not implemented
    pub const PARAMETER_NOT_IMPLEMENTED: Self = Self(504);
    /// 530 Authentication required
    pub const AUTH_REQUIRED: Self = Self(530);
    /// 534 Authentication mechanism is too weak
    pub const MECHANISM_TOO_WEAK: Self = Self(534);
    /// 535 Authentication credentials invalid
    pub const AUTH_FAILED: Self = Self(535);
    /// 538 Encryption required for requested authentication mechanism
    pub const ENCRYPTION_REQUIRED: Self = Self(538);
    /// 550 Mailbox unavailable (not found, access denied)
    pub const MAILBOX_UNAVAILABLE: Self = Self(550);
    /// 551 User not local
    pub const USER_NOT_LOCAL: Self = Self(551);
    /// 552 Exceeded storage allocation
    pub const EXCEEDED_STORAGE: Self = Self(552);
    /// 553 Mailbox name not allowed
    pub const MAILBOX_NAME_INVALID: Self = Self(553);
    /// 554 Transaction failed
    pub const TRANSACTION_FAILED: Self = Self(554);
}

/// A fully parsed server reply.
///
/// Instances only come out of the reply parser, so the kind always names
/// the command that solicited the reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    kind: ResponseKind,
    code: ReplyCode,
    text: String,
    raw: Vec<u8>,
    encoding: TextEncoding,
}

impl Response {
    pub(crate) fn new(
        kind: ResponseKind,
        code: ReplyCode,
        text: String,
        raw: Vec<u8>,
        encoding: TextEncoding,
    ) -> Self {
        Self {
            kind,
            code,
            text,
            raw,
            encoding,
        }
    }

    /// The kind of the command that solicited this reply.
    #[must_use]
    pub const fn kind(&self) -> ResponseKind {
        self.kind
    }

    /// The reply code shared by every line of the reply.
    #[must_use]
    pub const fn code(&self) -> ReplyCode {
        self.code
    }

    /// The continuation text of all reply lines, newline-joined in order.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The raw bytes consumed from the wire for this reply.
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// Which decoding produced [`Self::text`].
    #[must_use]
    pub const fn encoding(&self) -> TextEncoding {
        self.encoding
    }

    /// Returns true if the reply code is a success code (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Returns true if the reply code is a transient error (4xx).
    #[must_use]
    pub const fn is_transient_error(&self) -> bool {
        self.code.is_transient()
    }

    /// Returns true if the reply code is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent_error(&self) -> bool {
        self.code.is_permanent()
    }
}
