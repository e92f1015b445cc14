use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_stream::StreamExt;
use tokio_util::codec::FramedRead;

use crate::codec::ImapCodec;
use crate::commands::{Command, TagGenerator};
use crate::error::TransportError;
use crate::types::{Response, Status};

/// Tagged completion of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Completion {
    pub status: Status,
    pub text: String,
}

/// One transport, framed into responses, plus the tags issued on it.
///
/// Commands are strictly serialized: `execute` does not return before the
/// tagged completion of its command has been read.
pub(crate) struct Connection<S> {
    framed: FramedRead<S, ImapCodec>,
    tags: TagGenerator,
    poisoned: bool,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub(crate) fn new(stream: S) -> Self {
        Self::from_parts(stream, TagGenerator::default())
    }

    pub(crate) fn from_parts(stream: S, tags: TagGenerator) -> Self {
        Self {
            framed: FramedRead::new(stream, ImapCodec::default()),
            tags,
            poisoned: false,
        }
    }

    /// Gives the transport back, e.g. to wrap it in TLS. Fails if the server
    /// already sent bytes past the last response.
    pub(crate) fn into_parts(self) -> Result<(S, TagGenerator), TransportError> {
        if !self.framed.read_buffer().is_empty() {
            return Err(TransportError::Io(std::io::Error::other(
                "unexpected data buffered before transport switch",
            )));
        }
        Ok((self.framed.into_inner(), self.tags))
    }

    pub(crate) fn next_tag(&mut self) -> String {
        self.tags.next_tag()
    }

    /// Whether the transport failed or the server hung up. A poisoned
    /// connection cannot carry further commands.
    pub(crate) fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    pub(crate) async fn send(&mut self, command: &Command) -> Result<(), TransportError> {
        tracing::debug!(tag = command.tag(), command = command.name(), "Sending command");
        let bytes = command.to_bytes();
        let stream = self.framed.get_mut();
        let written = async {
            stream.write_all(&bytes).await?;
            stream.flush().await
        }
        .await;
        written.map_err(|e| self.poison(e.into()))
    }

    pub(crate) async fn next_response(&mut self) -> Result<Response, TransportError> {
        match self.framed.next().await {
            Some(Ok(resp)) => Ok(resp),
            Some(Err(e)) => Err(self.poison(e.into())),
            None => Err(self.poison(TransportError::Closed)),
        }
    }

    /// Sends `command` and reads until its tagged completion, handing every
    /// untagged response to `on_untagged` in arrival order. An untagged
    /// `BYE` ends the exchange with an error.
    pub(crate) async fn execute<F>(
        &mut self,
        command: &Command,
        mut on_untagged: F,
    ) -> Result<Completion, TransportError>
    where
        F: FnMut(Response),
    {
        self.send(command).await?;
        loop {
            match self.next_response().await? {
                Response::Tagged { tag, status, text } if tag == command.tag() => {
                    tracing::debug!(tag = %tag, %status, "Command completed");
                    return Ok(Completion { status, text });
                }
                Response::Tagged { tag, .. } => {
                    tracing::warn!(tag = %tag, expected = command.tag(), "Ignoring completion for unknown tag");
                }
                Response::Untagged {
                    status: Status::Bye,
                    text,
                } => {
                    return Err(self.poison(TransportError::Bye(text)));
                }
                other => on_untagged(other),
            }
        }
    }

    pub(crate) async fn shutdown(&mut self) {
        if let Err(e) = self.framed.get_mut().shutdown().await {
            tracing::debug!(error = %e, "Transport shutdown failed");
        }
    }

    fn poison(&mut self, err: TransportError) -> TransportError {
        self.poisoned = true;
        err
    }
}
