use std::fmt;

use crate::format::quote_astring;
use crate::types::{SearchKey, SequenceSet};

/// Fetch attributes requested for every message: its UID and the whole raw
/// message, without setting `\Seen`.
pub const RAW_MESSAGE_ITEMS: &str = "(UID BODY.PEEK[])";

/// Hands out `A0001`, `A0002`, ... for the lifetime of one connection.
#[derive(Debug, Default)]
pub struct TagGenerator {
    counter: u32,
}

impl TagGenerator {
    pub fn next_tag(&mut self) -> String {
        self.counter = self.counter.wrapping_add(1);
        format!("A{:04}", self.counter)
    }
}

/// A complete command line, ready to be written after its tag.
pub struct Command {
    tag: String,
    name: &'static str,
    line: String,
}

impl Command {
    fn new(tag: &str, name: &'static str, args: Option<String>) -> Self {
        let line = match args {
            Some(args) => format!("{} {} {}", tag, name, args),
            None => format!("{} {}", tag, name),
        };
        Self {
            tag: tag.to_string(),
            name,
            line,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn as_string(&self) -> &str {
        &self.line
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.line.len() + 2);
        out.extend_from_slice(self.line.as_bytes());
        out.extend_from_slice(b"\r\n");
        out
    }
}

// Arguments may hold credentials; never print them.
impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("tag", &self.tag)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

pub struct CommandBuilder {
    tag: String,
}

impl CommandBuilder {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
        }
    }

    pub fn login(self) -> LoginCommandBuilder<NoUsername, NoPassword> {
        LoginCommandBuilder::new(&self.tag)
    }

    pub fn starttls(self) -> Command {
        Command::new(&self.tag, "STARTTLS", None)
    }

    /// Read-only SELECT.
    pub fn examine(self, mailbox: &str) -> Command {
        Command::new(&self.tag, "EXAMINE", Some(quote_astring(mailbox)))
    }

    pub fn uid_search(self, key: &SearchKey) -> Command {
        Command::new(&self.tag, "UID SEARCH", Some(key.to_string()))
    }

    pub fn uid_fetch(self, set: &SequenceSet, items: &str) -> Command {
        Command::new(&self.tag, "UID FETCH", Some(format!("{} {}", set, items)))
    }

    pub fn logout(self) -> Command {
        Command::new(&self.tag, "LOGOUT", None)
    }
}

pub struct NoUsername;
pub struct HasUsername(String);
pub struct NoPassword;
pub struct HasPassword(String);

pub struct LoginCommandBuilder<U = NoUsername, P = NoPassword> {
    tag: String,
    username: U,
    password: P,
}

impl LoginCommandBuilder<NoUsername, NoPassword> {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            username: NoUsername,
            password: NoPassword,
        }
    }
}

impl<P> LoginCommandBuilder<NoUsername, P> {
    pub fn username(self, username: &str) -> LoginCommandBuilder<HasUsername, P> {
        LoginCommandBuilder {
            tag: self.tag,
            username: HasUsername(username.to_string()),
            password: self.password,
        }
    }
}

impl<U> LoginCommandBuilder<U, NoPassword> {
    pub fn password(self, password: &str) -> LoginCommandBuilder<U, HasPassword> {
        LoginCommandBuilder {
            tag: self.tag,
            username: self.username,
            password: HasPassword(password.to_string()),
        }
    }
}

impl LoginCommandBuilder<HasUsername, HasPassword> {
    pub fn build(self) -> Command {
        let args = format!(
            "{} {}",
            quote_astring(&self.username.0),
            quote_astring(&self.password.0)
        );
        Command::new(&self.tag, "LOGIN", Some(args))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn test_login_command() {
        let command = CommandBuilder::new("A0001")
            .login()
            .username("testuser")
            .password("testpass")
            .build();

        assert_eq!(command.as_string(), r#"A0001 LOGIN "testuser" "testpass""#);
        assert_eq!(command.tag(), "A0001");
    }

    #[test]
    fn test_login_command_order_independence() {
        let command = CommandBuilder::new("A0001")
            .login()
            .password("pass")
            .username("user")
            .build();

        assert_eq!(command.as_string(), r#"A0001 LOGIN "user" "pass""#);
    }

    #[test]
    fn test_login_debug_hides_password() {
        let command = CommandBuilder::new("A0001")
            .login()
            .username("user")
            .password("hunter2")
            .build();

        let debug = format!("{:?}", command);
        assert!(debug.contains("LOGIN"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_examine_quotes_mailbox() {
        let command = CommandBuilder::new("A0002").examine("Sent Items");
        assert_eq!(command.as_string(), r#"A0002 EXAMINE "Sent Items""#);
    }

    #[test]
    fn test_uid_search_since() {
        let since = NaiveDate::from_ymd_opt(2022, 9, 1).unwrap();
        let command = CommandBuilder::new("A0003").uid_search(&SearchKey::Since(since));
        assert_eq!(command.as_string(), "A0003 UID SEARCH SINCE 1-Sep-2022");
    }

    #[test]
    fn test_uid_fetch_raw_messages() {
        let set = SequenceSet::from_ids(&[5, 3, 4, 10]);
        let command = CommandBuilder::new("A0004").uid_fetch(&set, RAW_MESSAGE_ITEMS);
        assert_eq!(command.as_string(), "A0004 UID FETCH 3:5,10 (UID BODY.PEEK[])");
        assert_eq!(command.to_bytes(), b"A0004 UID FETCH 3:5,10 (UID BODY.PEEK[])\r\n".to_vec());
    }

    #[test]
    fn test_bare_commands() {
        assert_eq!(CommandBuilder::new("A0005").logout().as_string(), "A0005 LOGOUT");
        assert_eq!(CommandBuilder::new("A0002").starttls().as_string(), "A0002 STARTTLS");
    }

    #[test]
    fn test_tags_are_sequential() {
        let mut tags = TagGenerator::default();
        assert_eq!(tags.next_tag(), "A0001");
        assert_eq!(tags.next_tag(), "A0002");
        assert_eq!(tags.next_tag(), "A0003");
    }
}
