use bytes::Bytes;

use super::common::Flag;

// RFC 3501 § 7.1
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Ok,
    No,
    Bad,
    PreAuth,
    Bye,
}

/// One complete server response, literals included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Tagged {
        tag: String,
        status: Status,
        text: String,
    },
    /// Untagged status response (`* OK ...`, `* BYE ...`).
    Untagged {
        status: Status,
        text: String,
    },
    /// `* SEARCH 1 2 3`
    Search(Vec<u32>),
    /// `* 12 FETCH (...)`
    Fetch {
        seq: u32,
        items: Vec<FetchItem>,
    },
    /// Any other untagged data, without the leading `* ` and trailing CRLF.
    Data(Bytes),
    Continuation {
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItem {
    Uid(u32),
    /// `BODY[]` or `RFC822`; `None` when the server answered NIL.
    Body(Option<Bytes>),
    Rfc822Size(u32),
    InternalDate(String),
    Flags(Vec<Flag>),
    /// Attribute this client does not interpret; only its name is kept.
    Other(String),
}

impl Response {
    /// Whether this is the completion of the command tagged `tag`.
    pub fn completes(&self, tag: &str) -> bool {
        matches!(self, Response::Tagged { tag: t, .. } if t == tag)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Ok => f.write_str("OK"),
            Status::No => f.write_str("NO"),
            Status::Bad => f.write_str("BAD"),
            Status::PreAuth => f.write_str("PREAUTH"),
            Status::Bye => f.write_str("BYE"),
        }
    }
}
