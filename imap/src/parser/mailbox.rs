use crate::types::{Response, Status};

/// What the server told us while opening a mailbox.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxInfo {
    pub name: String,
    pub exists: Option<u32>,
    pub uid_validity: Option<u32>,
    pub read_only: bool,
}

impl MailboxInfo {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Folds one untagged response received during SELECT/EXAMINE into the summary.
    pub fn absorb(&mut self, resp: &Response) {
        match resp {
            Response::Data(data) => {
                if let Some(n) = parse_exists(&String::from_utf8_lossy(data)) {
                    self.exists = Some(n);
                }
            }
            Response::Untagged {
                status: Status::Ok,
                text,
            } => {
                if let Some(v) = response_code_value(text, "UIDVALIDITY") {
                    self.uid_validity = Some(v);
                }
            }
            _ => {}
        }
    }

    /// Reads the response code of the tagged `OK` that completed the open.
    pub fn complete(&mut self, text: &str) {
        self.read_only = text.to_ascii_uppercase().starts_with("[READ-ONLY]");
    }
}

// "17 EXISTS"
fn parse_exists(data: &str) -> Option<u32> {
    let (count, keyword) = data.trim().split_once(' ')?;
    if !keyword.eq_ignore_ascii_case("EXISTS") {
        return None;
    }
    count.parse().ok()
}

// "[UIDVALIDITY 3857529045] UIDs valid"
fn response_code_value(text: &str, code: &str) -> Option<u32> {
    let inner = text.strip_prefix('[')?;
    let (inner, _) = inner.split_once(']')?;
    let (name, value) = inner.split_once(' ')?;
    if !name.eq_ignore_ascii_case(code) {
        return None;
    }
    value.trim().parse().ok()
}
