use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;

use crate::ImapError;

/// When the secure channel is set up relative to the protocol phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Security {
    /// TLS before the greeting (port 993).
    #[default]
    Tls,
    /// Plain greeting, then `STARTTLS`, then TLS before authenticating.
    StartTls,
    /// No encryption at all.
    Plain,
}

/// Deadlines for each protocol phase. `None` waits forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Option<Duration>,
    pub search: Option<Duration>,
    pub fetch: Option<Duration>,
    pub logout: Option<Duration>,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Some(Duration::from_secs(30)),
            search: Some(Duration::from_secs(60)),
            fetch: Some(Duration::from_secs(300)),
            logout: Some(Duration::from_secs(10)),
        }
    }
}

impl Timeouts {
    pub fn none() -> Self {
        Self {
            connect: None,
            search: None,
            fetch: None,
            logout: None,
        }
    }
}

/// How many fetched messages may be parsed at the same time.
///
/// `Unlimited` parses every message of a batch at once. That is fine for a
/// mailbox of modest size; for large result sets pick a bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseConcurrency {
    #[default]
    Unlimited,
    Bounded(NonZeroUsize),
}

#[derive(Clone)]
pub struct Credentials {
    pub(crate) username: String,
    pub(crate) password: String,
}

/// Everything needed to open a session. Immutable once built.
#[derive(Clone)]
pub struct ConnectionConfig {
    host: String,
    port: u16,
    security: Security,
    tls_server_name: Option<String>,
    credentials: Option<Credentials>,
    timeouts: Timeouts,
    parse_concurrency: ParseConcurrency,
}

impl ConnectionConfig {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn security(&self) -> Security {
        self.security
    }

    /// Name presented for SNI and checked against the certificate.
    pub fn server_name(&self) -> &str {
        self.tls_server_name.as_deref().unwrap_or(&self.host)
    }

    pub fn username(&self) -> Option<&str> {
        self.credentials.as_ref().map(|c| c.username.as_str())
    }

    pub(crate) fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    pub fn parse_concurrency(&self) -> ParseConcurrency {
        self.parse_concurrency
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("security", &self.security)
            .field("tls_server_name", &self.tls_server_name)
            .field("username", &self.username())
            .field("timeouts", &self.timeouts)
            .field("parse_concurrency", &self.parse_concurrency)
            .finish_non_exhaustive()
    }
}

pub struct Builder {
    host: String,
    port: u16,
    security: Security,
    tls_server_name: Option<String>,
    credentials: Option<Credentials>,
    timeouts: Timeouts,
    parse_concurrency: ParseConcurrency,
}

impl Builder {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            security: Security::Tls,
            tls_server_name: None,
            credentials: None,
            timeouts: Timeouts::default(),
            parse_concurrency: ParseConcurrency::Unlimited,
        }
    }

    /// Accepts `host:port`.
    pub fn from_addr(addr: &str) -> Result<Self, ImapError> {
        let (host, port) = addr
            .rsplit_once(':')
            .ok_or_else(|| ImapError::Connection(format!("Invalid address format: {}", addr)))?;
        let port = port
            .parse()
            .map_err(|_| ImapError::Connection(format!("Invalid port in address: {}", addr)))?;
        Ok(Self::new(host, port))
    }

    pub fn tls(mut self) -> Self {
        self.security = Security::Tls;
        self
    }

    pub fn starttls(mut self) -> Self {
        self.security = Security::StartTls;
        self
    }

    pub fn plain(mut self) -> Self {
        self.security = Security::Plain;
        self
    }

    pub fn security(mut self, security: Security) -> Self {
        self.security = security;
        self
    }

    /// Overrides the TLS server name, which otherwise is the host.
    pub fn server_name(mut self, name: &str) -> Self {
        self.tls_server_name = Some(name.to_string());
        self
    }

    pub fn credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some(Credentials {
            username: username.to_string(),
            password: password.to_string(),
        });
        self
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn parse_concurrency(mut self, concurrency: ParseConcurrency) -> Self {
        self.parse_concurrency = concurrency;
        self
    }

    pub fn build(self) -> ConnectionConfig {
        ConnectionConfig {
            host: self.host,
            port: self.port,
            security: self.security,
            tls_server_name: self.tls_server_name,
            credentials: self.credentials,
            timeouts: self.timeouts,
            parse_concurrency: self.parse_concurrency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Builder::new("imap.example.com", 993).build();
        assert_eq!(config.security(), Security::Tls);
        assert_eq!(config.server_name(), "imap.example.com");
        assert_eq!(config.addr(), "imap.example.com:993");
        assert_eq!(config.parse_concurrency(), ParseConcurrency::Unlimited);
        assert_eq!(config.timeouts(), Timeouts::default());
        assert_eq!(config.username(), None);
    }

    #[test]
    fn test_server_name_override() {
        let config = Builder::new("10.0.0.5", 993).server_name("imap.example.com").build();
        assert_eq!(config.server_name(), "imap.example.com");
        assert_eq!(config.host(), "10.0.0.5");
    }

    #[test]
    fn test_from_addr() {
        let config = Builder::from_addr("mail.example.org:143").unwrap().starttls().build();
        assert_eq!(config.host(), "mail.example.org");
        assert_eq!(config.port(), 143);
        assert_eq!(config.security(), Security::StartTls);
    }

    #[test]
    fn test_from_addr_rejects_missing_port() {
        assert!(matches!(
            Builder::from_addr("mail.example.org"),
            Err(ImapError::Connection(_))
        ));
        assert!(matches!(
            Builder::from_addr("mail.example.org:imap"),
            Err(ImapError::Connection(_))
        ));
    }

    #[test]
    fn test_debug_hides_password() {
        let config = Builder::new("imap.example.com", 993)
            .credentials("me@example.com", "s3cret")
            .build();
        let debug = format!("{:?}", config);
        assert!(debug.contains("me@example.com"));
        assert!(!debug.contains("s3cret"));
    }
}
