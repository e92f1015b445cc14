use std::collections::HashSet;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::commands::{CommandBuilder, RAW_MESSAGE_ITEMS};
use crate::connection::{Completion, Connection};
use crate::error::{ImapError, Stage};
use crate::messages::{RawMessage, Uid};
use crate::session::{Session, with_deadline};
use crate::types::{FetchItem, Response, SequenceSet, Status};

/// Something that happened on an in-flight fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEvent {
    /// An untagged `FETCH`. `body` is `None` for responses that carry no
    /// message text, such as unsolicited flag updates.
    Delivered {
        seq: u32,
        uid: Option<Uid>,
        body: Option<Bytes>,
    },
    /// The tagged `OK`.
    Completed,
    /// Anything that ends the fetch unsuccessfully.
    Failed(String),
}

impl FetchEvent {
    /// Turns an untagged response into a delivery. Other responses are not
    /// part of the fetch and yield `None`.
    pub fn from_response(resp: Response) -> Option<Self> {
        let Response::Fetch { seq, items } = resp else {
            return None;
        };

        let mut uid = None;
        let mut body = None;
        for item in items {
            match item {
                FetchItem::Uid(u) => uid = Some(u),
                FetchItem::Body(Some(bytes)) => body = Some(bytes),
                FetchItem::Body(None) => {
                    tracing::warn!(seq, "Server returned NIL for message body");
                }
                _ => {}
            }
        }
        Some(FetchEvent::Delivered { seq, uid, body })
    }
}

/// Collects the bodies of one fetch.
///
/// Bodies accumulate until the fetch either completes or fails. The first
/// failure latches: later deliveries are discarded and [`finish`] reports
/// the failure even if a completion follows.
///
/// [`finish`]: FetchCollector::finish
#[derive(Debug)]
pub struct FetchCollector {
    requested: HashSet<Uid>,
    seen: HashSet<Uid>,
    messages: Vec<RawMessage>,
    complete: bool,
    error: Option<String>,
}

impl FetchCollector {
    pub fn new(uids: &[Uid]) -> Self {
        Self {
            requested: uids.iter().copied().collect(),
            seen: HashSet::with_capacity(uids.len()),
            messages: Vec::with_capacity(uids.len()),
            complete: false,
            error: None,
        }
    }

    pub fn handle(&mut self, event: FetchEvent) {
        if self.error.is_some() {
            return;
        }
        match event {
            FetchEvent::Delivered { seq, uid, body } => {
                if self.complete {
                    tracing::warn!(seq, "Ignoring delivery after completion");
                    return;
                }
                self.deliver(seq, uid, body);
            }
            FetchEvent::Completed => self.complete = true,
            FetchEvent::Failed(reason) => self.error = Some(reason),
        }
    }

    fn deliver(&mut self, seq: u32, uid: Option<Uid>, body: Option<Bytes>) {
        let (uid, body) = match (uid, body) {
            (Some(uid), Some(body)) => (uid, body),
            (None, Some(_)) => {
                self.error = Some(format!("Message body without UID (sequence number {})", seq));
                return;
            }
            // Flag updates and the like.
            (_, None) => return,
        };

        if !self.requested.contains(&uid) {
            tracing::warn!(uid, "Dropping body for a UID that was not requested");
            return;
        }
        if !self.seen.insert(uid) {
            tracing::warn!(uid, "Dropping duplicate body");
            return;
        }
        tracing::debug!(uid, size = body.len(), "Received message body");
        self.messages.push(RawMessage::new(uid, body));
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// Every collected body, in arrival order, or the latched failure.
    pub fn finish(self) -> Result<Vec<RawMessage>, ImapError> {
        if let Some(reason) = self.error {
            return Err(ImapError::Fetch(reason));
        }
        if !self.complete {
            return Err(ImapError::Fetch("Fetch ended without completion".to_string()));
        }
        let missing = self.requested.len() - self.seen.len();
        if missing > 0 {
            tracing::debug!(missing, "Server delivered fewer messages than requested");
        }
        Ok(self.messages)
    }
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Downloads the complete raw bytes of every message in `uids` with one
    /// `UID FETCH`. Messages are returned in the order the server delivered
    /// them; UIDs that no longer exist are simply absent.
    ///
    /// Uses `BODY.PEEK[]`, so `\Seen` flags are left alone.
    #[tracing::instrument(skip(self, uids), fields(count = uids.len()))]
    pub async fn fetch_raw(&mut self, uids: &[Uid]) -> Result<Vec<RawMessage>, ImapError> {
        self.ensure_ready("fetch")?;
        if uids.is_empty() {
            return Ok(Vec::new());
        }

        let limit = self.config().timeouts().fetch;
        let conn = self.connection("fetch")?;
        let result = with_deadline(Stage::Fetch, limit, fetch_bodies(conn, uids)).await;

        let messages = self.settle(result)?;
        tracing::info!(messages = messages.len(), "Fetch completed");
        Ok(messages)
    }
}

async fn fetch_bodies<S>(conn: &mut Connection<S>, uids: &[Uid]) -> Result<Vec<RawMessage>, ImapError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let set = SequenceSet::from_ids(uids);
    let tag = conn.next_tag();
    let command = CommandBuilder::new(&tag).uid_fetch(&set, RAW_MESSAGE_ITEMS);
    let mut collector = FetchCollector::new(uids);

    let outcome = conn
        .execute(&command, |resp| match FetchEvent::from_response(resp) {
            Some(event) => collector.handle(event),
            None => tracing::trace!("Ignoring untagged response during fetch"),
        })
        .await;

    let last = match outcome {
        Ok(Completion { status: Status::Ok, .. }) => FetchEvent::Completed,
        Ok(Completion { status, text }) => FetchEvent::Failed(format!("{} {}", status, text)),
        Err(e) => FetchEvent::Failed(e.to_string()),
    };
    collector.handle(last);
    collector.finish()
}
