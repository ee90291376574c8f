//! Integration tests for the SMTP protocol engine.
//!
//! Scripted localhost servers play back fixed reply sequences so full
//! sessions run against real sockets without a real mail server.

#![allow(clippy::unwrap_used)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use postrider_smtp::{
    Address, AuthScheme, CommandKind, Envelope, Error, ProtocolProgress, ResponseKind,
    ServerProfile, SessionConfig, SessionState, Transporter,
};

/// One scripted exchange on the server side.
enum Step {
    /// Read one command line, then send the given reply.
    Line(&'static str),
    /// Read payload lines until the lone dot, then send the given reply.
    Body(&'static str),
}

struct Script {
    greeting: Option<&'static str>,
    steps: Vec<Step>,
    /// Keep the socket open after the script ends (for stall scenarios).
    hold_open: bool,
}

struct ScriptedServer {
    port: u16,
    received: Arc<Mutex<Vec<String>>>,
    handle: JoinHandle<()>,
}

impl ScriptedServer {
    fn lines(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }

    fn saw_command(&self, prefix: &str) -> bool {
        self.lines().iter().any(|line| line.starts_with(prefix))
    }

    /// Waits for the scripted task to play out its whole script.
    async fn finished(&mut self) {
        (&mut self.handle).await.unwrap();
    }
}

async fn spawn_server(script: Script) -> ScriptedServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let received = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&received);

    let handle = tokio::spawn(async move {
        let Ok((mut socket, _)) = listener.accept().await else {
            return;
        };
        let (read_half, mut write_half) = socket.split();
        let mut reader = BufReader::new(read_half);

        if let Some(greeting) = script.greeting {
            write_half.write_all(greeting.as_bytes()).await.unwrap();
        }

        for step in script.steps {
            match step {
                Step::Line(reply) => {
                    let mut line = String::new();
                    if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                        return;
                    }
                    log.lock().unwrap().push(line.trim_end().to_string());
                    write_half.write_all(reply.as_bytes()).await.unwrap();
                }
                Step::Body(reply) => {
                    loop {
                        let mut line = String::new();
                        if reader.read_line(&mut line).await.unwrap_or(0) == 0 {
                            return;
                        }
                        let trimmed = line.trim_end().to_string();
                        let done = trimmed == ".";
                        log.lock().unwrap().push(trimmed);
                        if done {
                            break;
                        }
                    }
                    write_half.write_all(reply.as_bytes()).await.unwrap();
                }
            }
        }

        if script.hold_open {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
    });

    ScriptedServer {
        port,
        received,
        handle,
    }
}

fn profile(port: u16) -> ServerProfile {
    ServerProfile::new("127.0.0.1", port).greeting("client.test")
}

fn envelope() -> Envelope {
    Envelope::new(
        Address::new("sender@example.com").unwrap(),
        vec![Address::new("recipient@example.com").unwrap()],
        b"Subject: Hi\r\n\r\nHello!\r\n".as_slice(),
    )
    .unwrap()
}

fn quick() -> SessionConfig {
    SessionConfig::default()
        .connect_timeout(Duration::from_secs(5))
        .io_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn full_transmission_with_auth_plain_succeeds() {
    let mut server = spawn_server(Script {
        greeting: Some("220 mail.example.com ESMTP ready\r\n"),
        steps: vec![
            Step::Line("250-mail.example.com\r\n250 AUTH PLAIN\r\n"),
            Step::Line("334 \r\n"),
            Step::Line("235 2.7.0 accepted\r\n"),
            Step::Line("250 sender ok\r\n"),
            Step::Line("250 recipient ok\r\n"),
            Step::Line("354 go ahead\r\n"),
            Step::Body("250 queued\r\n"),
            Step::Line("221 bye\r\n"),
        ],
        hold_open: false,
    })
    .await;

    let mut session = Transporter::new(
        envelope(),
        profile(server.port)
            .preferred_scheme(AuthScheme::Plain)
            .credentials("user", "secret"),
    )
    .with_config(quick());

    session.run().await.unwrap();
    assert_eq!(session.state(), SessionState::Succeeded);

    for stage in [
        ProtocolProgress::CONNECT,
        ProtocolProgress::EHLO,
        ProtocolProgress::AUTH,
        ProtocolProgress::MAIL,
        ProtocolProgress::RCPT,
        ProtocolProgress::DATA,
        ProtocolProgress::MESSAGE,
        ProtocolProgress::QUIT,
    ] {
        assert!(session.progress().contains(stage), "{stage:?} missing");
    }

    server.finished().await;
    let lines = server.lines();
    assert_eq!(lines[0], "EHLO client.test");
    assert_eq!(lines[1], "AUTH PLAIN");
    assert_eq!(lines[2], STANDARD.encode(b"\0user\0secret"));
    assert_eq!(lines[3], "MAIL FROM:<sender@example.com>");
    assert_eq!(lines[4], "RCPT TO:<recipient@example.com>");
    assert_eq!(lines[5], "DATA");
    assert_eq!(lines.last().unwrap(), "QUIT");
    assert!(lines.contains(&".".to_string()));
}

#[tokio::test]
async fn rejected_recipient_aborts_before_data() {
    let server = spawn_server(Script {
        greeting: Some("220 mail.example.com ESMTP ready\r\n"),
        steps: vec![
            Step::Line("250-mail.example.com\r\n250 AUTH PLAIN\r\n"),
            Step::Line("334 \r\n"),
            Step::Line("235 accepted\r\n"),
            Step::Line("250 sender ok\r\n"),
            Step::Line("550 no such user\r\n"),
        ],
        hold_open: false,
    })
    .await;

    let mut session = Transporter::new(
        envelope(),
        profile(server.port)
            .preferred_scheme(AuthScheme::Plain)
            .credentials("user", "secret"),
    )
    .with_config(quick());

    let err = session.run().await.unwrap_err();
    assert!(
        matches!(
            &err,
            Error::Rejected { stage, code: 550, .. }
                if *stage == ResponseKind::of(CommandKind::Rcpt)
        ),
        "{err:?}"
    );
    assert_eq!(session.state(), SessionState::Failed);
    assert!(session.progress().contains(ProtocolProgress::MAIL));
    assert!(!session.progress().contains(ProtocolProgress::RCPT));

    assert!(!server.saw_command("DATA"));
}

#[tokio::test]
async fn silent_server_times_out_at_connect() {
    let server = spawn_server(Script {
        greeting: None,
        steps: vec![],
        hold_open: true,
    })
    .await;

    let mut session = Transporter::new(envelope(), profile(server.port)).with_config(
        SessionConfig::default()
            .connect_timeout(Duration::from_secs(5))
            .io_timeout(Duration::from_millis(200)),
    );

    let err = session.run().await.unwrap_err();
    assert!(
        matches!(
            &err,
            Error::Timeout { stage } if *stage == ResponseKind::of(CommandKind::Connect)
        ),
        "{err:?}"
    );
    assert_eq!(session.state(), SessionState::Failed);
    assert_eq!(session.progress(), ProtocolProgress::empty());
}

#[tokio::test]
async fn verification_never_starts_a_mail_transaction() {
    let mut server = spawn_server(Script {
        greeting: Some("220 mail.example.com ESMTP ready\r\n"),
        steps: vec![
            Step::Line("250-mail.example.com\r\n250 AUTH PLAIN LOGIN\r\n"),
            Step::Line("334 \r\n"),
            Step::Line("235 accepted\r\n"),
            Step::Line("221 bye\r\n"),
        ],
        hold_open: false,
    })
    .await;

    let mut session = Transporter::verifier(
        profile(server.port)
            .preferred_scheme(AuthScheme::Plain)
            .credentials("user", "secret"),
    )
    .with_config(quick());

    session.run().await.unwrap();
    assert_eq!(session.state(), SessionState::Succeeded);
    assert!(session.progress().contains(ProtocolProgress::AUTH));
    assert!(session.progress().contains(ProtocolProgress::QUIT));
    assert!(!session.progress().contains(ProtocolProgress::MAIL));

    server.finished().await;
    assert!(!server.saw_command("MAIL"));
    assert!(!server.saw_command("RCPT"));
    assert!(!server.saw_command("DATA"));
}

#[tokio::test]
async fn login_authentication_runs_two_round_trips() {
    let mut server = spawn_server(Script {
        greeting: Some("220 ready\r\n"),
        steps: vec![
            Step::Line("250-mail.example.com\r\n250 AUTH LOGIN\r\n"),
            Step::Line("334 VXNlcm5hbWU6\r\n"),
            Step::Line("334 UGFzc3dvcmQ6\r\n"),
            Step::Line("235 accepted\r\n"),
            Step::Line("221 bye\r\n"),
        ],
        hold_open: false,
    })
    .await;

    let mut session = Transporter::verifier(
        profile(server.port)
            .preferred_scheme(AuthScheme::Login)
            .credentials("user", "secret"),
    )
    .with_config(quick());

    session.run().await.unwrap();

    server.finished().await;
    let lines = server.lines();
    assert_eq!(lines[1], "AUTH LOGIN");
    assert_eq!(lines[2], STANDARD.encode(b"user"));
    assert_eq!(lines[3], STANDARD.encode(b"secret"));
}

#[tokio::test]
async fn cram_md5_sends_the_keyed_hash_response() {
    let mut server = spawn_server(Script {
        greeting: Some("220 ready\r\n"),
        steps: vec![
            Step::Line("250-mail.example.com\r\n250 AUTH CRAM-MD5\r\n"),
            Step::Line("334 PDE4OTYuNjk3MTcwOTUyQHBvc3RvZmZpY2UucmVzdG9uLm1jaS5uZXQ+\r\n"),
            Step::Line("235 accepted\r\n"),
            Step::Line("221 bye\r\n"),
        ],
        hold_open: false,
    })
    .await;

    let mut session = Transporter::verifier(
        profile(server.port)
            .preferred_scheme(AuthScheme::CramMd5)
            .credentials("tim", "tanstaaftanstaaf"),
    )
    .with_config(quick());

    session.run().await.unwrap();

    server.finished().await;
    // RFC 2195 reference digest for this challenge/secret pair
    let expected = STANDARD.encode(b"tim b913a602c7eda7a495b4e6e7334d3890");
    assert!(server.lines().contains(&expected));
}

#[tokio::test]
async fn unadvertised_scheme_falls_back_to_unauthenticated_send() {
    let mut server = spawn_server(Script {
        greeting: Some("220 ready\r\n"),
        steps: vec![
            Step::Line("250-mail.example.com\r\n250 PIPELINING\r\n"),
            Step::Line("250 sender ok\r\n"),
            Step::Line("250 recipient ok\r\n"),
            Step::Line("354 go ahead\r\n"),
            Step::Body("250 queued\r\n"),
            Step::Line("221 bye\r\n"),
        ],
        hold_open: false,
    })
    .await;

    let mut session = Transporter::new(
        envelope(),
        profile(server.port)
            .preferred_scheme(AuthScheme::Plain)
            .credentials("user", "secret"),
    )
    .with_config(quick());

    session.run().await.unwrap();
    assert!(!session.progress().contains(ProtocolProgress::AUTH));

    server.finished().await;
    assert!(!server.saw_command("AUTH"));
}

#[tokio::test]
async fn every_recipient_gets_its_own_rcpt() {
    let mut server = spawn_server(Script {
        greeting: Some("220 ready\r\n"),
        steps: vec![
            Step::Line("250 mail.example.com\r\n"),
            Step::Line("250 sender ok\r\n"),
            Step::Line("250 one ok\r\n"),
            Step::Line("250 two ok\r\n"),
            Step::Line("354 go ahead\r\n"),
            Step::Body("250 queued\r\n"),
            Step::Line("221 bye\r\n"),
        ],
        hold_open: false,
    })
    .await;

    let envelope = Envelope::new(
        Address::new("sender@example.com").unwrap(),
        vec![
            Address::new("one@example.com").unwrap(),
            Address::new("two@example.com").unwrap(),
        ],
        b"hi\r\n".as_slice(),
    )
    .unwrap();

    let mut session =
        Transporter::new(envelope, profile(server.port)).with_config(quick());
    session.run().await.unwrap();

    server.finished().await;
    let rcpts: Vec<String> = server
        .lines()
        .into_iter()
        .filter(|line| line.starts_with("RCPT TO:"))
        .collect();
    assert_eq!(
        rcpts,
        ["RCPT TO:<one@example.com>", "RCPT TO:<two@example.com>"]
    );
}

#[tokio::test]
async fn out_of_table_reply_is_reported_as_unexpected() {
    let server = spawn_server(Script {
        greeting: Some("220 ready\r\n"),
        steps: vec![
            Step::Line("250 mail.example.com\r\n"),
            Step::Line("299 weird\r\n"),
        ],
        hold_open: false,
    })
    .await;

    let mut session = Transporter::new(envelope(), profile(server.port)).with_config(quick());
    let err = session.run().await.unwrap_err();
    assert!(
        matches!(
            &err,
            Error::UnexpectedReply { stage, code: 299, .. }
                if *stage == ResponseKind::of(CommandKind::Mail)
        ),
        "{err:?}"
    );
}

#[tokio::test]
async fn malformed_reply_is_a_parse_failure() {
    let server = spawn_server(Script {
        greeting: Some("220 ready\r\n"),
        steps: vec![Step::Line("not a reply\r\n")],
        hold_open: false,
    })
    .await;

    let mut session = Transporter::new(envelope(), profile(server.port)).with_config(quick());
    let err = session.run().await.unwrap_err();
    assert!(
        matches!(
            &err,
            Error::InvalidReply { stage } if *stage == ResponseKind::of(CommandKind::Ehlo)
        ),
        "{err:?}"
    );
}

#[tokio::test]
async fn cancellation_releases_a_pending_checkpoint() {
    let server = spawn_server(Script {
        greeting: Some("220 ready\r\n"),
        steps: vec![],
        hold_open: true,
    })
    .await;

    let mut session = Transporter::new(envelope(), profile(server.port)).with_config(
        SessionConfig::default()
            .connect_timeout(Duration::from_secs(5))
            .io_timeout(Duration::from_secs(30)),
    );

    let handle = session.cancel_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.cancel();
    });

    let err = session.run().await.unwrap_err();
    assert!(
        matches!(
            &err,
            Error::Cancelled { stage } if *stage == ResponseKind::of(CommandKind::Ehlo)
        ),
        "{err:?}"
    );
    assert_eq!(session.state(), SessionState::Failed);
}
