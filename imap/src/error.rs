use std::fmt::{self, Display};
use std::time::Duration;

use thiserror::Error;

use crate::messages::Uid;
use crate::session::SessionState;

/// Everything a retrieval can fail with.
///
/// Each stage reports its own category: a failure while opening the mailbox is
/// a [`ImapError::Mailbox`], a failure while the fetch is in flight is a
/// [`ImapError::Fetch`], and so on, whatever the underlying cause was.
#[derive(Error, Debug)]
pub enum ImapError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Mailbox {mailbox:?} could not be opened: {reason}")]
    Mailbox { mailbox: String, reason: String },
    #[error("Search failed: {0}")]
    Search(String),
    #[error("Fetch failed: {0}")]
    Fetch(String),
    #[error("{} of {} messages failed to parse", .failures.len(), .total)]
    Parse {
        failures: Vec<MessageParseError>,
        total: usize,
    },
    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: Stage, after: Duration },
    #[error("Cannot {operation} while the session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },
}

/// A single message the parser rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Message {uid} could not be parsed: {reason}")]
pub struct MessageParseError {
    pub uid: Uid,
    pub reason: String,
}

/// Protocol phase a deadline was attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Connect,
    Search,
    Fetch,
    Logout,
}

impl Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Connect => f.write_str("Connect"),
            Stage::Search => f.write_str("Search"),
            Stage::Fetch => f.write_str("Fetch"),
            Stage::Logout => f.write_str("Logout"),
        }
    }
}

/// Failures of the connection itself, below any particular command.
///
/// These never reach the caller directly; every stage folds them into its
/// own [`ImapError`] category.
#[derive(Error, Debug)]
pub(crate) enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Server closed the connection")]
    Closed,
    #[error("Server sent BYE: {0}")]
    Bye(String),
}
