use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use mail_parser::{Address, MessageParser, MimeHeaders};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::ParseConcurrency;
use crate::error::{ImapError, MessageParseError};
use crate::messages::{Attachment, MailAddress, ParsedMail, RawMessage, Uid};

/// Turns raw message bytes into a [`ParsedMail`].
///
/// Implementations run on the blocking thread pool, several at a time, so
/// they may be CPU-heavy but must be shareable between threads.
pub trait MailParser: Send + Sync + 'static {
    fn parse(&self, raw: RawMessage) -> Result<ParsedMail, MessageParseError>;
}

/// MIME parser backed by the `mail-parser` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct MimeParser;

impl MailParser for MimeParser {
    fn parse(&self, raw: RawMessage) -> Result<ParsedMail, MessageParseError> {
        let uid = raw.uid();
        let rejected = |reason: &str| MessageParseError {
            uid,
            reason: reason.to_string(),
        };

        if raw.is_empty() {
            return Err(rejected("empty message"));
        }
        let message = MessageParser::default()
            .parse(raw.as_bytes())
            .ok_or_else(|| rejected("not a MIME message"))?;
        if message.headers().is_empty() {
            return Err(rejected("no headers found"));
        }

        let attachments = message
            .attachments()
            .map(|part| Attachment {
                filename: part.attachment_name().map(str::to_string),
                content_type: part.content_type().map(|ct| match ct.subtype() {
                    Some(subtype) => format!("{}/{}", ct.ctype(), subtype),
                    None => ct.ctype().to_string(),
                }),
                content: bytes::Bytes::copy_from_slice(part.contents()),
            })
            .collect();

        Ok(ParsedMail {
            uid,
            message_id: message.message_id().map(str::to_string),
            subject: message.subject().map(str::to_string),
            from: addresses(message.from()),
            to: addresses(message.to()),
            cc: addresses(message.cc()),
            date: message
                .date()
                .and_then(|d| DateTime::<FixedOffset>::parse_from_rfc3339(&d.to_rfc3339()).ok()),
            text: message.body_text(0).map(|s| s.into_owned()),
            html: message.body_html(0).map(|s| s.into_owned()),
            attachments,
        })
    }
}

fn addresses(field: Option<&Address<'_>>) -> Vec<MailAddress> {
    let Some(field) = field else {
        return Vec::new();
    };
    field
        .iter()
        .map(|addr| MailAddress {
            name: addr.name.as_ref().map(|s| s.to_string()),
            address: addr.address.as_ref().map(|s| s.to_string()),
        })
        .collect()
}

/// Parses every message on the blocking pool.
///
/// All parses run to completion even when some fail; the result is either
/// every record, in completion order, or [`ImapError::Parse`] listing each
/// message that failed.
#[tracing::instrument(skip_all, fields(count = raws.len(), concurrency = ?concurrency))]
pub async fn parse_all<P>(
    parser: Arc<P>,
    raws: Vec<RawMessage>,
    concurrency: ParseConcurrency,
) -> Result<Vec<ParsedMail>, ImapError>
where
    P: MailParser,
{
    let total = raws.len();
    let limiter = match concurrency {
        ParseConcurrency::Unlimited => None,
        ParseConcurrency::Bounded(n) => Some(Arc::new(Semaphore::new(n.get()))),
    };

    let mut pending: Vec<Uid> = Vec::with_capacity(total);
    let mut tasks = JoinSet::new();
    for raw in raws {
        let uid = raw.uid();
        let parser = Arc::clone(&parser);
        let limiter = limiter.clone();
        pending.push(uid);
        tasks.spawn(async move {
            let _permit = match limiter {
                Some(limiter) => limiter.acquire_owned().await.ok(),
                None => None,
            };
            let outcome = tokio::task::spawn_blocking(move || parser.parse(raw)).await;
            (uid, outcome)
        });
    }

    let mut parsed = Vec::with_capacity(total);
    let mut failures = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let (uid, outcome) = match joined {
            Ok(done) => done,
            Err(e) => {
                tracing::warn!(error = %e, "Parse task did not finish");
                continue;
            }
        };
        if let Some(pos) = pending.iter().position(|&p| p == uid) {
            pending.swap_remove(pos);
        }
        match outcome {
            Ok(Ok(mail)) => parsed.push(mail),
            Ok(Err(e)) => {
                tracing::warn!(uid, reason = %e.reason, "Message failed to parse");
                failures.push(e);
            }
            Err(e) => failures.push(MessageParseError {
                uid,
                reason: format!("parser panicked: {}", e),
            }),
        }
    }
    failures.extend(pending.into_iter().map(|uid| MessageParseError {
        uid,
        reason: "parse task was aborted".to_string(),
    }));

    if failures.is_empty() {
        tracing::debug!(parsed = parsed.len(), "All messages parsed");
        Ok(parsed)
    } else {
        Err(ImapError::Parse { failures, total })
    }
}
