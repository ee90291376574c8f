//! The protocol engine driving one SMTP session.
//!
//! A [`Transporter`] owns one connection for the lifetime of one
//! transmission (or one credential verification). Every stage is the same
//! sequential step: build the request, write it, wait for a complete
//! reply, validate the reply code against the stage's table, then advance.
//! Waits are discrete checkpoints: each one races the underlying I/O
//! against its time budget and the session's cancellation signal, so an
//! abandoned session never blocks forever.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::auth::Authenticator;
use crate::command::{Command, Request};
use crate::connection::{self, SessionConfig, SmtpStream};
use crate::error::{Error, Result};
use crate::parser::{self, Parse, Verdict};
use crate::types::{
    AuthScheme, CommandKind, Envelope, ProtocolProgress, ReplyCode, Response, ResponseKind,
    ServerProfile,
};

/// Where a session currently stands.
///
/// Purely observational; the engine drives itself sequentially and never
/// branches on this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing has happened yet.
    Idle,
    /// TCP (and TLS) connection being established.
    Connecting,
    /// Server greeting accepted.
    Connected,
    /// EHLO sent, waiting for capabilities.
    EhloSent,
    /// Authentication scheme resolved.
    SchemeSelected,
    /// AUTH round trip in flight.
    Authenticating(u8),
    /// Authentication confirmed by the server.
    Authenticated,
    /// No authentication was needed for this session.
    NoAuthNeeded,
    /// MAIL FROM accepted.
    MailSent,
    /// RCPT TO accepted (most recent recipient).
    RcptSent,
    /// DATA go-ahead received.
    DataReady,
    /// Message payload accepted.
    BodySent,
    /// QUIT sent.
    QuitSent,
    /// Connection closed in good order.
    Closed,
    /// Terminal: the session completed successfully.
    Succeeded,
    /// Terminal: the session failed; the error was surfaced to the caller.
    Failed,
}

/// Cancels a running session from outside.
///
/// Cloneable and cheap; cancelling releases whatever checkpoint the
/// session is blocked on, which then observes [`Error::Cancelled`].
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Receiving side of the cancellation signal, owned by the engine.
struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// Resolves once cancellation has been requested; pends forever
    /// otherwise.
    async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// The state machine for one transmission or verification session.
pub struct Transporter {
    server: ServerProfile,
    config: SessionConfig,
    envelope: Option<Envelope>,
    state: SessionState,
    progress: ProtocolProgress,
    last_request: Option<Request>,
    last_response: Option<Response>,
    handle: CancelHandle,
    signal: CancelSignal,
    stream: Option<SmtpStream>,
    buffer: Vec<u8>,
}

impl Transporter {
    /// Creates a session that transmits `envelope` to `server`.
    #[must_use]
    pub fn new(envelope: Envelope, server: ServerProfile) -> Self {
        Self::build(Some(envelope), server)
    }

    /// Creates a verification-only session: it connects, greets and
    /// authenticates, but never starts a mail transaction.
    #[must_use]
    pub fn verifier(server: ServerProfile) -> Self {
        Self::build(None, server)
    }

    fn build(envelope: Option<Envelope>, server: ServerProfile) -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            server,
            config: SessionConfig::default(),
            envelope,
            state: SessionState::Idle,
            progress: ProtocolProgress::empty(),
            last_request: None,
            last_response: None,
            handle: CancelHandle { tx: Arc::new(tx) },
            signal: CancelSignal { rx },
            stream: None,
            buffer: Vec::new(),
        }
    }

    /// Replaces the default time budgets.
    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// A handle that cancels this session from another task.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.handle.clone()
    }

    /// The current session state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// The stages the server has confirmed so far.
    #[must_use]
    pub const fn progress(&self) -> ProtocolProgress {
        self.progress
    }

    /// The last request sent, if any.
    #[must_use]
    pub const fn last_request(&self) -> Option<&Request> {
        self.last_request.as_ref()
    }

    /// The last reply received, if any.
    #[must_use]
    pub const fn last_response(&self) -> Option<&Response> {
        self.last_response.as_ref()
    }

    /// The server descriptor, including the scheme support detected after
    /// EHLO.
    #[must_use]
    pub const fn server(&self) -> &ServerProfile {
        &self.server
    }

    /// Drives the session to its terminal outcome.
    ///
    /// # Errors
    ///
    /// Returns the terminal error described in [`Error`]; nothing is
    /// retried and the connection is torn down either way.
    pub async fn run(&mut self) -> Result<()> {
        let result = self.drive().await;
        self.stream = None;
        match &result {
            Ok(()) => {
                self.state = SessionState::Succeeded;
                tracing::info!(progress = ?self.progress, "session succeeded");
            }
            Err(error) => {
                self.state = SessionState::Failed;
                tracing::warn!(%error, progress = ?self.progress, "session failed");
            }
        }
        result
    }

    async fn drive(&mut self) -> Result<()> {
        let envelope = self.envelope.take();
        self.connect().await?;
        self.ehlo().await?;
        self.authenticate(envelope.is_none()).await?;
        if let Some(envelope) = &envelope {
            self.transmit(envelope).await?;
        }
        self.quit().await
    }

    async fn connect(&mut self) -> Result<()> {
        let stage = ResponseKind::of(CommandKind::Connect);
        self.state = SessionState::Connecting;
        tracing::debug!(
            host = %self.server.hostname(),
            port = self.server.port(),
            tls = self.server.is_tls(),
            "connecting"
        );

        let host = self.server.hostname().to_owned();
        let port = self.server.port();
        let tls = self.server.is_tls();
        let establish = async move {
            if tls {
                connection::connect_tls(&host, port).await
            } else {
                connection::connect(&host, port).await
            }
        };
        let stream = checkpoint(
            &mut self.signal,
            stage,
            self.config.connect_timeout,
            establish,
        )
        .await?;
        self.stream = Some(stream);

        let greeting = self.read_reply(stage).await?;
        validated(stage, greeting)?;
        self.state = SessionState::Connected;
        self.progress.insert(ProtocolProgress::CONNECT);
        Ok(())
    }

    async fn ehlo(&mut self) -> Result<()> {
        let stage = ResponseKind::of(CommandKind::Ehlo);
        self.state = SessionState::EhloSent;
        let greeting = self.server.greeting_name().to_owned();
        let reply = self.exchange(Command::Ehlo { greeting }, stage).await?;

        let support = parser::supported_schemes(&reply);
        tracing::debug!(?support, "EHLO capabilities");
        self.server.set_supported(support);
        self.progress.insert(ProtocolProgress::EHLO);
        Ok(())
    }

    /// Picks the scheme actually used: the preference, if the server
    /// advertises it. A transmission falls back to no authentication when
    /// it does not; a verification session fails instead, since verifying
    /// credentials without authenticating proves nothing.
    fn resolve_scheme(&self, verifying: bool) -> Result<AuthScheme> {
        let preferred = self.server.preferred();
        if !preferred.requires_auth() {
            return Ok(AuthScheme::None);
        }
        if self.server.supported().supports(preferred) {
            return Ok(preferred);
        }
        if verifying {
            return Err(Error::UnsupportedScheme { scheme: preferred });
        }
        tracing::warn!(
            scheme = ?preferred,
            "preferred scheme not advertised, proceeding unauthenticated"
        );
        Ok(AuthScheme::None)
    }

    async fn authenticate(&mut self, verifying: bool) -> Result<()> {
        let scheme = self.resolve_scheme(verifying)?;
        self.state = SessionState::SchemeSelected;
        let Some(mechanism) = scheme.mechanism() else {
            self.state = SessionState::NoAuthNeeded;
            return Ok(());
        };

        let provider = self.server.credentials_provider().ok_or_else(|| {
            Error::AuthProtocol(format!(
                "scheme {scheme:?} needs credentials but no provider is configured"
            ))
        })?;
        let mut authenticator =
            Authenticator::for_scheme(scheme, provider, self.server.hostname());
        let rounds = authenticator.round_trips();
        let final_stage = ResponseKind::of(CommandKind::Auth);

        // the AUTH command itself solicits the first challenge
        self.send(Command::Auth { mechanism }, ResponseKind::auth_round(0))
            .await?;

        for round in 0..rounds {
            self.state = SessionState::Authenticating(round);
            let stage = ResponseKind::auth_round(round);
            let reply = self.read_reply(stage).await?;
            let challenge = validated(stage, reply)?;

            authenticator.submit_challenge(challenge.text(), round)?;
            let line = authenticator.response(round)?;

            let solicits = if round + 1 < rounds {
                ResponseKind::auth_round(round + 1)
            } else {
                final_stage
            };
            self.send(Command::AuthResponse { line }, solicits).await?;
        }

        let reply = self.read_reply(final_stage).await?;
        if reply.code() == ReplyCode::AUTH_CONTINUE {
            return Err(Error::AuthProtocol(
                "server requested more round trips than the scheme has".into(),
            ));
        }
        validated(final_stage, reply)?;
        self.state = SessionState::Authenticated;
        self.progress.insert(ProtocolProgress::AUTH);
        Ok(())
    }

    async fn transmit(&mut self, envelope: &Envelope) -> Result<()> {
        let stage = ResponseKind::of(CommandKind::Mail);
        self.exchange(
            Command::MailFrom {
                from: envelope.sender().clone(),
            },
            stage,
        )
        .await?;
        self.state = SessionState::MailSent;
        self.progress.insert(ProtocolProgress::MAIL);

        // one RCPT per recipient; any single rejection aborts the session
        let stage = ResponseKind::of(CommandKind::Rcpt);
        for to in envelope.recipients() {
            self.exchange(Command::RcptTo { to: to.clone() }, stage)
                .await?;
            self.state = SessionState::RcptSent;
        }
        self.progress.insert(ProtocolProgress::RCPT);

        let stage = ResponseKind::of(CommandKind::Data);
        self.exchange(Command::Data, stage).await?;
        self.state = SessionState::DataReady;
        self.progress.insert(ProtocolProgress::DATA);

        let stage = ResponseKind::message_accepted();
        self.exchange(
            Command::MessageBody {
                body: envelope.body().to_vec(),
            },
            stage,
        )
        .await?;
        self.state = SessionState::BodySent;
        self.progress.insert(ProtocolProgress::MESSAGE);
        Ok(())
    }

    async fn quit(&mut self) -> Result<()> {
        let stage = ResponseKind::of(CommandKind::Quit);
        self.state = SessionState::QuitSent;
        self.exchange(Command::Quit, stage).await?;
        self.progress.insert(ProtocolProgress::QUIT);
        self.state = SessionState::Closed;
        Ok(())
    }

    /// One full stage step: send, await the reply, validate it.
    async fn exchange(&mut self, command: Command, kind: ResponseKind) -> Result<Response> {
        self.send(command, kind).await?;
        let response = self.read_reply(kind).await?;
        validated(kind, response)
    }

    async fn send(&mut self, command: Command, kind: ResponseKind) -> Result<()> {
        let request = Request::new(kind, &command);
        {
            let Self {
                stream,
                signal,
                config,
                ..
            } = self;
            let stream = stream.as_mut().ok_or_else(not_connected)?;
            checkpoint(signal, kind, config.io_timeout, stream.write_all(request.bytes()))
                .await?;
        }
        tracing::debug!(stage = %kind, bytes = request.bytes().len(), "request sent");
        self.last_request = Some(request);
        Ok(())
    }

    /// Reads until the buffered bytes form a complete reply of `kind`.
    ///
    /// An incomplete reply is never an error; it just means another read
    /// checkpoint.
    async fn read_reply(&mut self, kind: ResponseKind) -> Result<Response> {
        loop {
            match parser::parse(&self.buffer, kind) {
                Parse::Complete(response) => {
                    self.buffer.drain(..response.raw().len());
                    tracing::debug!(stage = %kind, code = response.code().as_u16(), "reply");
                    self.last_response = Some(response.clone());
                    return Ok(response);
                }
                Parse::Invalid => return Err(Error::InvalidReply { stage: kind }),
                Parse::Incomplete => {
                    let Self {
                        stream,
                        signal,
                        buffer,
                        config,
                        ..
                    } = self;
                    let stream = stream.as_mut().ok_or_else(not_connected)?;
                    checkpoint(signal, kind, config.io_timeout, stream.read_chunk(buffer))
                        .await?;
                }
            }
        }
    }
}

/// Transmits one message over a fresh session.
///
/// # Errors
///
/// Returns the session's terminal error.
pub async fn send_message(envelope: Envelope, server: ServerProfile) -> Result<()> {
    let mut transporter = Transporter::new(envelope, server);
    transporter.run().await
}

/// Validates credentials over a fresh session without sending mail.
///
/// # Errors
///
/// Returns the session's terminal error.
pub async fn verify_credentials(server: ServerProfile) -> Result<()> {
    let mut transporter = Transporter::verifier(server);
    transporter.run().await
}

/// Races one awaited resource against its time budget and the session's
/// cancellation signal.
async fn checkpoint<T>(
    signal: &mut CancelSignal,
    stage: ResponseKind,
    budget: Duration,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        () = signal.cancelled() => Err(Error::Cancelled { stage }),
        outcome = tokio::time::timeout(budget, fut) => match outcome {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout { stage }),
        },
    }
}

fn validated(kind: ResponseKind, response: Response) -> Result<Response> {
    match parser::classify(&response) {
        Verdict::Success => Ok(response),
        Verdict::Rejected => Err(Error::Rejected {
            stage: kind,
            code: response.code().as_u16(),
            message: response.text().to_owned(),
        }),
        Verdict::Unexpected => Err(Error::UnexpectedReply {
            stage: kind,
            code: response.code().as_u16(),
            message: response.text().to_owned(),
        }),
    }
}

fn not_connected() -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::NotConnected,
        "no open connection",
    ))
}
