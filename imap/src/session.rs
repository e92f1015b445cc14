use std::fmt::{self, Display};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::commands::CommandBuilder;
use crate::config::{ConnectionConfig, Security};
use crate::connection::{Completion, Connection};
use crate::error::{ImapError, Stage, TransportError};
use crate::format::is_quotable;
use crate::stream::MailStream;
use crate::types::{Response, Status};

/// Lifecycle of a [`Session`].
///
/// ```text
/// Disconnected -> Connecting -> Ready -> Ending -> Closed
///                            \-> Failed
/// ```
///
/// `Closed` and `Failed` are terminal: build a new session to reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Ready,
    Failed,
    Ending,
    Closed,
}

impl Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Ready => "ready",
            SessionState::Failed => "failed",
            SessionState::Ending => "ending",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Greeting {
    Ok,
    PreAuth,
}

/// The single connection a retrieval runs over.
///
/// Every operation takes `&mut self`, so one session can never carry two
/// exchanges at once.
pub struct Session<S = MailStream> {
    config: Arc<ConnectionConfig>,
    state: SessionState,
    conn: Option<Connection<S>>,
}

impl<S> Session<S> {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config: Arc::new(config),
            state: SessionState::Disconnected,
            conn: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub(crate) fn ensure_ready(&self, operation: &'static str) -> Result<(), ImapError> {
        if self.state == SessionState::Ready {
            Ok(())
        } else {
            Err(ImapError::InvalidState {
                operation,
                state: self.state,
            })
        }
    }

    fn begin_connect(&mut self) -> Result<(), ImapError> {
        if self.state != SessionState::Disconnected {
            return Err(ImapError::InvalidState {
                operation: "connect",
                state: self.state,
            });
        }
        self.state = SessionState::Connecting;
        Ok(())
    }

    fn finish_connect(&mut self, result: Result<Connection<S>, ImapError>) -> Result<(), ImapError> {
        match result {
            Ok(conn) => {
                self.conn = Some(conn);
                self.state = SessionState::Ready;
                tracing::info!("IMAP session ready");
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Failed;
                tracing::warn!(error = %e, "IMAP connection failed");
                Err(e)
            }
        }
    }
}

impl Session<MailStream> {
    /// Opens the network transport described by the configuration, then
    /// greets and authenticates.
    #[tracing::instrument(skip(self), fields(addr = %self.config.addr(), security = ?self.config.security()))]
    pub async fn connect(&mut self) -> Result<(), ImapError> {
        self.begin_connect()?;
        tracing::info!("Connecting to IMAP server");

        let config = Arc::clone(&self.config);
        let result = with_deadline(Stage::Connect, config.timeouts().connect, establish(&config)).await;
        self.finish_connect(result)
    }
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Greets and authenticates over a transport the caller already opened.
    /// Any TLS must already be in place.
    #[tracing::instrument(skip(self, stream))]
    pub async fn connect_with(&mut self, stream: S) -> Result<(), ImapError> {
        self.begin_connect()?;

        let config = Arc::clone(&self.config);
        let result = with_deadline(Stage::Connect, config.timeouts().connect, async {
            let mut conn = Connection::new(stream);
            let greeting = read_greeting(&mut conn).await?;
            login(&mut conn, &config, greeting).await?;
            Ok::<_, ImapError>(conn)
        })
        .await;
        self.finish_connect(result)
    }

    /// Logs out and releases the transport. Never fails: if the server does
    /// not confirm within the logout deadline the transport is closed anyway.
    #[tracing::instrument(skip(self), fields(state = %self.state))]
    pub async fn disconnect(&mut self) {
        let limit = self.config.timeouts().logout;

        match self.state {
            SessionState::Ending | SessionState::Closed => return,
            SessionState::Ready => {
                self.state = SessionState::Ending;
                if let Some(conn) = self.conn.as_mut() {
                    match with_deadline(Stage::Logout, limit, logout(conn)).await {
                        Ok(()) => tracing::info!("Logged out"),
                        Err(e) => tracing::warn!(error = %e, "Logout not confirmed, closing anyway"),
                    }
                }
            }
            SessionState::Disconnected | SessionState::Connecting | SessionState::Failed => {}
        }

        if let Some(mut conn) = self.conn.take() {
            let shutdown = async {
                conn.shutdown().await;
                Ok::<(), ImapError>(())
            };
            if let Err(e) = with_deadline(Stage::Logout, limit, shutdown).await {
                tracing::warn!(error = %e, "Transport did not shut down cleanly");
            }
        }
        self.state = SessionState::Closed;
    }

    /// The connection, provided the session is ready.
    pub(crate) fn connection(&mut self, operation: &'static str) -> Result<&mut Connection<S>, ImapError> {
        self.ensure_ready(operation)?;
        let state = self.state;
        self.conn.as_mut().ok_or(ImapError::InvalidState { operation, state })
    }

    /// Records the outcome of an exchange. Transport failures and expired
    /// deadlines leave the response stream in an unknown position, so the
    /// session becomes `Failed`; a plain `NO`/`BAD` leaves it usable.
    pub(crate) fn settle<T>(&mut self, result: Result<T, ImapError>) -> Result<T, ImapError> {
        if let Err(e) = &result {
            let broken = matches!(e, ImapError::Timeout { .. })
                || self.conn.as_ref().is_some_and(Connection::is_poisoned);
            if broken {
                tracing::warn!(error = %e, "Session is no longer usable");
                self.state = SessionState::Failed;
            }
        }
        result
    }
}

pub(crate) async fn with_deadline<T, F>(stage: Stage, limit: Option<Duration>, fut: F) -> Result<T, ImapError>
where
    F: Future<Output = Result<T, ImapError>>,
{
    match limit {
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| ImapError::Timeout { stage, after })?,
        None => fut.await,
    }
}

async fn establish(config: &ConnectionConfig) -> Result<Connection<MailStream>, ImapError> {
    let stream = MailStream::open(config).await?;
    let mut conn = Connection::new(stream);
    let greeting = read_greeting(&mut conn).await?;

    if config.security() == Security::StartTls {
        if greeting == Greeting::PreAuth {
            return Err(ImapError::Connection(
                "Server sent PREAUTH, STARTTLS is no longer possible".to_string(),
            ));
        }
        conn = starttls(conn, config).await?;
    }

    login(&mut conn, config, greeting).await?;
    Ok(conn)
}

async fn read_greeting<S>(conn: &mut Connection<S>) -> Result<Greeting, ImapError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let resp = conn
        .next_response()
        .await
        .map_err(|e| ImapError::Connection(format!("No greeting: {}", e)))?;

    match resp {
        Response::Untagged { status: Status::Ok, .. } => {
            tracing::info!("Received OK greeting from server");
            Ok(Greeting::Ok)
        }
        Response::Untagged {
            status: Status::PreAuth,
            ..
        } => {
            tracing::info!("Received PREAUTH greeting from server");
            Ok(Greeting::PreAuth)
        }
        Response::Untagged {
            status: Status::Bye,
            text,
        } => Err(ImapError::Connection(format!("Server refused connection: {}", text))),
        other => Err(ImapError::Connection(format!("Invalid greeting from server: {:?}", other))),
    }
}

async fn starttls(
    mut conn: Connection<MailStream>,
    config: &ConnectionConfig,
) -> Result<Connection<MailStream>, ImapError> {
    let tag = conn.next_tag();
    let command = CommandBuilder::new(&tag).starttls();
    let done = conn
        .execute(&command, |_| {})
        .await
        .map_err(|e| ImapError::Connection(format!("STARTTLS failed: {}", e)))?;
    if done.status != Status::Ok {
        return Err(ImapError::Connection(format!(
            "STARTTLS refused: {} {}",
            done.status, done.text
        )));
    }

    let (stream, tags) = conn
        .into_parts()
        .map_err(|e| ImapError::Connection(format!("STARTTLS failed: {}", e)))?;
    let stream = stream.upgrade(config).await?;
    tracing::info!(tls = stream.is_tls(), "Upgraded connection with STARTTLS");
    Ok(Connection::from_parts(stream, tags))
}

#[tracing::instrument(skip_all, fields(user = config.username().unwrap_or_default()))]
async fn login<S>(conn: &mut Connection<S>, config: &ConnectionConfig, greeting: Greeting) -> Result<(), ImapError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if greeting == Greeting::PreAuth {
        return Ok(());
    }
    let credentials = config
        .credentials()
        .ok_or_else(|| ImapError::Connection("No credentials configured".to_string()))?;

    if !is_quotable(&credentials.username) || !is_quotable(&credentials.password) {
        return Err(ImapError::Connection(
            "Credentials must not contain CR, LF or NUL".to_string(),
        ));
    }

    tracing::info!("Attempting IMAP login");
    let tag = conn.next_tag();
    let command = CommandBuilder::new(&tag)
        .login()
        .username(&credentials.username)
        .password(&credentials.password)
        .build();

    match conn.execute(&command, |_| {}).await {
        Ok(Completion { status: Status::Ok, .. }) => {
            tracing::info!("IMAP login successful");
            Ok(())
        }
        Ok(Completion { status, text }) => {
            Err(ImapError::Connection(format!("Login failed: {} {}", status, text)))
        }
        Err(e) => Err(ImapError::Connection(format!("Login failed: {}", e))),
    }
}

async fn logout<S>(conn: &mut Connection<S>) -> Result<(), ImapError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let tag = conn.next_tag();
    let command = CommandBuilder::new(&tag).logout();
    let closed = |e: TransportError| ImapError::Connection(format!("Logout failed: {}", e));

    conn.send(&command).await.map_err(closed)?;
    loop {
        match conn.next_response().await {
            Ok(resp) if resp.completes(&tag) => return Ok(()),
            // BYE precedes the tagged OK; keep reading.
            Ok(_) => continue,
            Err(TransportError::Closed) => return Ok(()),
            Err(e) => return Err(closed(e)),
        }
    }
}
