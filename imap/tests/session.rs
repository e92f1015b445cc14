use std::time::Duration;

use imap_emails::{Builder, ConnectionConfig, ImapError, Session, SessionState, Stage, Timeouts};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio_test::io::{Builder as MockBuilder, Mock};

const GREETING: &[u8] = b"* OK [CAPABILITY IMAP4rev1] Dovecot ready.\r\n";
const LOGIN: &[u8] = b"A0001 LOGIN \"user@example.com\" \"secret\"\r\n";

fn config() -> ConnectionConfig {
    Builder::new("imap.example.com", 143)
        .plain()
        .credentials("user@example.com", "secret")
        .build()
}

async fn ready_session(mock: Mock) -> Session<Mock> {
    let mut session = Session::new(config());
    session.connect_with(mock).await.unwrap();
    session
}

#[tokio::test]
async fn test_connect_and_disconnect() {
    let mock = MockBuilder::new()
        .read(GREETING)
        .write(LOGIN)
        .read(b"A0001 OK [CAPABILITY IMAP4rev1] Logged in\r\n")
        .write(b"A0002 LOGOUT\r\n")
        .read(b"* BYE Logging out\r\nA0002 OK Logout completed.\r\n")
        .build();

    let mut session = Session::new(config());
    assert_eq!(session.state(), SessionState::Disconnected);

    session.connect_with(mock).await.unwrap();
    assert_eq!(session.state(), SessionState::Ready);
    assert!(session.is_ready());

    session.disconnect().await;
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_bad_credentials() {
    let mock = MockBuilder::new()
        .read(GREETING)
        .write(LOGIN)
        .read(b"A0001 NO [AUTHENTICATIONFAILED] Authentication failed.\r\n")
        .build();

    let mut session = Session::new(config());
    let err = session.connect_with(mock).await.unwrap_err();

    assert!(matches!(err, ImapError::Connection(ref msg) if msg.contains("AUTHENTICATIONFAILED")));
    assert_eq!(session.state(), SessionState::Failed);
}

#[tokio::test]
async fn test_greeting_bye_refuses_connection() {
    let mock = MockBuilder::new().read(b"* BYE Too many connections\r\n").build();

    let mut session = Session::new(config());
    let err = session.connect_with(mock).await.unwrap_err();

    assert!(matches!(err, ImapError::Connection(_)));
    assert_eq!(session.state(), SessionState::Failed);
}

#[tokio::test]
async fn test_connection_closed_before_greeting() {
    let mock = MockBuilder::new().build();

    let mut session = Session::new(config());
    let err = session.connect_with(mock).await.unwrap_err();

    assert!(matches!(err, ImapError::Connection(_)));
    assert_eq!(session.state(), SessionState::Failed);
}

#[tokio::test]
async fn test_preauth_skips_login() {
    let mock = MockBuilder::new()
        .read(b"* PREAUTH Logged in as user\r\n")
        .write(b"A0001 LOGOUT\r\n")
        .read(b"A0001 OK bye\r\n")
        .build();

    let mut session = ready_session(mock).await;
    assert!(session.is_ready());
    session.disconnect().await;
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_missing_credentials() {
    let mock = MockBuilder::new().read(GREETING).build();
    let config = Builder::new("imap.example.com", 143).plain().build();

    let mut session = Session::new(config);
    let err = session.connect_with(mock).await.unwrap_err();

    assert!(matches!(err, ImapError::Connection(_)));
}

#[tokio::test]
async fn test_connect_twice_is_rejected() {
    let mock = MockBuilder::new()
        .read(GREETING)
        .write(LOGIN)
        .read(b"A0001 OK Logged in\r\n")
        .build();
    let mut session = ready_session(mock).await;

    let err = session.connect_with(MockBuilder::new().build()).await.unwrap_err();
    assert!(matches!(
        err,
        ImapError::InvalidState {
            operation: "connect",
            state: SessionState::Ready
        }
    ));
    assert!(session.is_ready());
}

#[tokio::test]
async fn test_operations_require_ready_session() {
    let mut session: Session<Mock> = Session::new(config());
    let since = chrono::NaiveDate::from_ymd_opt(2022, 9, 1).unwrap();

    let err = session.search_since("INBOX", since).await.unwrap_err();
    assert!(matches!(err, ImapError::InvalidState { operation: "search", .. }));

    let err = session.fetch_raw(&[1]).await.unwrap_err();
    assert!(matches!(err, ImapError::InvalidState { operation: "fetch", .. }));
}

#[tokio::test]
async fn test_disconnect_when_server_hangs_up() {
    let mock = MockBuilder::new()
        .read(GREETING)
        .write(LOGIN)
        .read(b"A0001 OK Logged in\r\n")
        .write(b"A0002 LOGOUT\r\n")
        .build();
    let mut session = ready_session(mock).await;

    session.disconnect().await;
    assert_eq!(session.state(), SessionState::Closed);

    // Nothing left to do the second time.
    session.disconnect().await;
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_resolves_without_logout_reply() {
    let (client, mut server) = tokio::io::duplex(64 * 1024);
    server
        .write_all(b"* OK ready\r\nA0001 OK Logged in\r\n")
        .await
        .unwrap();

    let mut session = Session::new(config());
    session.connect_with(client).await.unwrap();

    // The server never answers LOGOUT; the logout deadline cuts it short.
    session.disconnect().await;
    assert_eq!(session.state(), SessionState::Closed);
    drop(server);
}

#[tokio::test(start_paused = true)]
async fn test_connect_deadline() {
    let (client, _server) = tokio::io::duplex(1024);
    let timeouts = Timeouts {
        connect: Some(Duration::from_secs(5)),
        ..Timeouts::default()
    };
    let config = Builder::new("imap.example.com", 143)
        .plain()
        .credentials("user@example.com", "secret")
        .timeouts(timeouts)
        .build();

    let mut session = Session::new(config);
    let err = session.connect_with(client).await.unwrap_err();

    assert!(matches!(
        err,
        ImapError::Timeout {
            stage: Stage::Connect,
            ..
        }
    ));
    assert_eq!(session.state(), SessionState::Failed);
}

#[tokio::test]
async fn test_login_rejects_line_breaks() {
    let mock = MockBuilder::new().read(GREETING).build();
    let config = Builder::new("imap.example.com", 143)
        .plain()
        .credentials("user@example.com", "p\r\nA9 LOGOUT")
        .build();

    let mut session = Session::new(config);
    let err = session.connect_with(mock).await.unwrap_err();

    assert!(matches!(err, ImapError::Connection(ref msg) if msg.contains("CR, LF or NUL")));
    assert_eq!(session.state(), SessionState::Failed);
}

/// Accepts one connection, sends `greeting`, then answers each command line
/// with the next entry of `replies`.
async fn fake_server(greeting: &'static [u8], replies: &'static [&'static [u8]]) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        let (read, mut write) = sock.into_split();
        let mut lines = BufReader::new(read).lines();
        write.write_all(greeting).await.unwrap();
        for reply in replies {
            if lines.next_line().await.ok().flatten().is_none() {
                return;
            }
            write.write_all(reply).await.unwrap();
        }
        while let Ok(Some(_)) = lines.next_line().await {}
    });
    port
}

fn starttls_config(port: u16) -> ConnectionConfig {
    Builder::new("127.0.0.1", port)
        .starttls()
        .server_name("imap.example.com")
        .credentials("user@example.com", "secret")
        .build()
}

#[tokio::test]
async fn test_starttls_refuses_preauth_greeting() {
    let port = fake_server(b"* PREAUTH Already logged in\r\n", &[]).await;

    let mut session: Session = Session::new(starttls_config(port));
    let err = session.connect().await.unwrap_err();

    assert!(matches!(err, ImapError::Connection(ref msg) if msg.contains("PREAUTH")));
    assert_eq!(session.state(), SessionState::Failed);
}

#[tokio::test]
async fn test_starttls_rejected_by_server() {
    let port = fake_server(GREETING, &[b"A0001 NO STARTTLS unavailable\r\n" as &[u8]]).await;

    let mut session: Session = Session::new(starttls_config(port));
    let err = session.connect().await.unwrap_err();

    assert!(matches!(err, ImapError::Connection(ref msg) if msg.contains("STARTTLS refused")));
    assert_eq!(session.state(), SessionState::Failed);
}
