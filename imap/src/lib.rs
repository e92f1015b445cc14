//! Retrieve mail from an IMAP server: connect, search a mailbox for messages
//! received since a date, fetch them in one round trip and parse them
//! concurrently.
//!
//! [`ImapEmails`] drives the whole retrieval; [`Session`] exposes the
//! individual steps.

mod codec;
pub mod commands;
pub mod config;
mod connection;
pub mod error;
pub mod fetch;
mod format;
pub mod messages;
pub mod parse;
pub mod parser;
pub mod pipeline;
pub mod search;
pub mod session;
pub mod stream;
mod tls;
pub mod types;

pub use config::{Builder, ConnectionConfig, ParseConcurrency, Security, Timeouts};
pub use error::{ImapError, MessageParseError, Stage};
pub use fetch::{FetchCollector, FetchEvent};
pub use messages::{Attachment, MailAddress, ParsedMail, RawMessage, Uid};
pub use parse::{MailParser, MimeParser, parse_all};
pub use parser::mailbox::MailboxInfo;
pub use pipeline::ImapEmails;
pub use session::{Session, SessionState};
pub use stream::MailStream;
pub use types::{SearchKey, SequenceSet};
