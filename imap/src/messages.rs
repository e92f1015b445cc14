use std::fmt::{self, Display};

use bytes::Bytes;
use chrono::{DateTime, FixedOffset};

/// Server-assigned identifier of a message, stable within one mailbox.
pub type Uid = u32;

/// One message exactly as the server delivered it.
///
/// Owned by whoever holds it; the pipeline hands each one to the parser by
/// value.
#[derive(Debug, PartialEq, Eq)]
pub struct RawMessage {
    uid: Uid,
    bytes: Bytes,
}

impl RawMessage {
    pub fn new(uid: Uid, bytes: Bytes) -> Self {
        Self { uid, bytes }
    }

    pub fn uid(&self) -> Uid {
        self.uid
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }
}

/// A parsed message record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedMail {
    pub uid: Uid,
    pub message_id: Option<String>,
    pub subject: Option<String>,
    pub from: Vec<MailAddress>,
    pub to: Vec<MailAddress>,
    pub cc: Vec<MailAddress>,
    pub date: Option<DateTime<FixedOffset>>,
    pub text: Option<String>,
    pub html: Option<String>,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAddress {
    pub name: Option<String>,
    pub address: Option<String>,
}

impl Display for MailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, &self.address) {
            (Some(name), Some(address)) => write!(f, "{} <{}>", name, address),
            (None, Some(address)) => f.write_str(address),
            (Some(name), None) => f.write_str(name),
            (None, None) => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub content: Bytes,
}
