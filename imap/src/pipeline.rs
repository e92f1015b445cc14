use std::sync::Arc;

use chrono::NaiveDate;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::ConnectionConfig;
use crate::error::ImapError;
use crate::messages::{ParsedMail, RawMessage};
use crate::parse::{MailParser, MimeParser, parse_all};
use crate::session::Session;
use crate::stream::MailStream;

pub const DEFAULT_MAILBOX: &str = "INBOX";

/// Retrieves every message received since a date, parsed.
///
/// ```no_run
/// # async fn run() -> Result<(), imap_emails::ImapError> {
/// use chrono::NaiveDate;
/// use imap_emails::{Builder, ImapEmails};
///
/// let config = Builder::new("imap.example.com", 993)
///     .tls()
///     .credentials("user@example.com", "secret")
///     .build();
///
/// let mut client = ImapEmails::new(config);
/// client.connect().await?;
/// let since = NaiveDate::from_ymd_opt(2022, 9, 1).unwrap();
/// for mail in client.get_emails(since).await? {
///     println!("{} {:?}", mail.uid, mail.subject);
/// }
/// client.disconnect().await;
/// # Ok(())
/// # }
/// ```
pub struct ImapEmails<S = MailStream, P = MimeParser> {
    session: Session<S>,
    parser: Arc<P>,
    mailbox: String,
}

impl ImapEmails<MailStream, MimeParser> {
    pub fn new(config: ConnectionConfig) -> Self {
        Self::from_parts(Session::new(config), MimeParser)
    }

    pub async fn connect(&mut self) -> Result<(), ImapError> {
        self.session.connect().await
    }
}

impl<S, P> ImapEmails<S, P> {
    pub fn from_parts(session: Session<S>, parser: P) -> Self {
        Self {
            session,
            parser: Arc::new(parser),
            mailbox: DEFAULT_MAILBOX.to_string(),
        }
    }

    /// Mailbox to retrieve from instead of `INBOX`.
    pub fn with_mailbox(mut self, mailbox: &str) -> Self {
        self.mailbox = mailbox.to_string();
        self
    }

    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    pub fn session(&self) -> &Session<S> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<S> {
        &mut self.session
    }

    pub fn into_session(self) -> Session<S> {
        self.session
    }
}

impl<S, P> ImapEmails<S, P>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
    P: MailParser,
{
    pub async fn connect_with(&mut self, stream: S) -> Result<(), ImapError> {
        self.session.connect_with(stream).await
    }

    pub async fn disconnect(&mut self) {
        self.session.disconnect().await
    }

    /// Raw bytes of every message received on or after `since`.
    #[tracing::instrument(skip(self), fields(mailbox = %self.mailbox))]
    pub async fn get_email_streams(&mut self, since: NaiveDate) -> Result<Vec<RawMessage>, ImapError> {
        let uids = self.session.search_since(&self.mailbox, since).await?;
        if uids.is_empty() {
            tracing::info!("No messages since {}", since);
            return Ok(Vec::new());
        }
        self.session.fetch_raw(&uids).await
    }

    /// Every message received on or after `since`, parsed. Records come back
    /// in the order parsing finished; match them up by UID.
    ///
    /// Either all messages are returned or none: a single parse failure
    /// yields [`ImapError::Parse`] with every failure listed.
    #[tracing::instrument(skip(self), fields(mailbox = %self.mailbox))]
    pub async fn get_emails(&mut self, since: NaiveDate) -> Result<Vec<ParsedMail>, ImapError> {
        let raws = self.get_email_streams(since).await?;
        if raws.is_empty() {
            return Ok(Vec::new());
        }

        let concurrency = self.session.config().parse_concurrency();
        let parsed = parse_all(Arc::clone(&self.parser), raws, concurrency).await?;
        tracing::info!(count = parsed.len(), "Retrieved messages");
        Ok(parsed)
    }
}
