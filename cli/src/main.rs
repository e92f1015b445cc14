use std::env;

use chrono::{Days, Local, NaiveDate};
use imap_emails::{Builder, ImapEmails, Security};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let email = env::var("IMAP_EMAIL")?;
    let password = env::var("IMAP_PASSWORD")?;
    let imap_server = env::var("IMAP_SERVER")?;
    let security = match env::var("IMAP_SECURITY").ok().as_deref() {
        None | Some("tls") => Security::Tls,
        Some("starttls") => Security::StartTls,
        Some("plain") => Security::Plain,
        Some(other) => return Err(format!("IMAP_SECURITY must be tls, starttls or plain, not {:?}", other).into()),
    };
    let mailbox = env::var("IMAP_MAILBOX").unwrap_or_else(|_| "INBOX".to_string());

    let since = match env::args().nth(1) {
        Some(arg) => NaiveDate::parse_from_str(&arg, "%Y-%m-%d")?,
        None => Local::now()
            .date_naive()
            .checked_sub_days(Days::new(7))
            .ok_or("date out of range")?,
    };

    let config = Builder::from_addr(&imap_server)?
        .security(security)
        .credentials(&email, &password)
        .build();

    let mut client = ImapEmails::new(config).with_mailbox(&mailbox);
    client.connect().await?;

    let result = client.get_emails(since).await;
    client.disconnect().await;

    for mail in result? {
        let from = mail.from.first().map(ToString::to_string).unwrap_or_default();
        println!(
            "{}\t{}\t{}\t{}",
            mail.uid,
            mail.date.map(|d| d.to_rfc3339()).unwrap_or_default(),
            from,
            mail.subject.unwrap_or_default()
        );
    }

    Ok(())
}
