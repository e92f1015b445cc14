use chrono::NaiveDate;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::commands::CommandBuilder;
use crate::connection::{Completion, Connection};
use crate::error::{ImapError, Stage};
use crate::format::is_quotable;
use crate::messages::Uid;
use crate::parser::mailbox::MailboxInfo;
use crate::session::{Session, with_deadline};
use crate::types::{Response, SearchKey, Status};

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// UIDs of every message in `mailbox` with an internal date on or after
    /// `since`. Only the day counts; IMAP has no time-of-day search.
    ///
    /// The result is a snapshot in server order. An empty vector means
    /// nothing matched.
    pub async fn search_since(&mut self, mailbox: &str, since: NaiveDate) -> Result<Vec<Uid>, ImapError> {
        self.search(mailbox, &SearchKey::Since(since)).await
    }

    /// Opens `mailbox` read-only and runs `UID SEARCH` with `key`.
    #[tracing::instrument(skip(self, key), fields(key = %key))]
    pub async fn search(&mut self, mailbox: &str, key: &SearchKey) -> Result<Vec<Uid>, ImapError> {
        let limit = self.config().timeouts().search;
        let conn = self.connection("search")?;
        let result = with_deadline(Stage::Search, limit, async move {
            let info = examine_mailbox(conn, mailbox).await?;
            tracing::debug!(exists = ?info.exists, uid_validity = ?info.uid_validity, "Mailbox opened");
            uid_search(conn, key).await
        })
        .await;

        let uids = self.settle(result)?;
        tracing::info!(matches = uids.len(), "Search completed");
        Ok(uids)
    }

    /// Opens `mailbox` read-only (`EXAMINE`).
    pub async fn examine(&mut self, mailbox: &str) -> Result<MailboxInfo, ImapError> {
        let limit = self.config().timeouts().search;
        let conn = self.connection("examine")?;
        let result = with_deadline(Stage::Search, limit, examine_mailbox(conn, mailbox)).await;
        self.settle(result)
    }
}

async fn examine_mailbox<S>(conn: &mut Connection<S>, mailbox: &str) -> Result<MailboxInfo, ImapError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let failed = |reason: String| ImapError::Mailbox {
        mailbox: mailbox.to_string(),
        reason,
    };

    if !is_quotable(mailbox) {
        return Err(failed("Mailbox name contains CR, LF or NUL".to_string()));
    }

    let tag = conn.next_tag();
    let command = CommandBuilder::new(&tag).examine(mailbox);
    let mut info = MailboxInfo::new(mailbox);

    match conn.execute(&command, |resp| info.absorb(&resp)).await {
        Ok(Completion { status: Status::Ok, text }) => {
            info.complete(&text);
            Ok(info)
        }
        Ok(Completion { status, text }) => Err(failed(format!("{} {}", status, text))),
        Err(e) => Err(failed(e.to_string())),
    }
}

async fn uid_search<S>(conn: &mut Connection<S>, key: &SearchKey) -> Result<Vec<Uid>, ImapError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let tag = conn.next_tag();
    let command = CommandBuilder::new(&tag).uid_search(key);
    let mut uids = Vec::new();

    let collect = |resp: Response| match resp {
        Response::Search(ids) => uids.extend(ids),
        other => tracing::trace!(?other, "Ignoring untagged response during search"),
    };

    match conn.execute(&command, collect).await {
        Ok(Completion { status: Status::Ok, .. }) => Ok(uids),
        Ok(Completion { status, text }) => Err(ImapError::Search(format!("{} {}", status, text))),
        Err(e) => Err(ImapError::Search(e.to_string())),
    }
}
