//! Per-connection session
//!
//! Drives one connection through its lifecycle:
//! `Connecting -> Negotiating -> Active -> Closing -> Closed`.
//!
//! The session prompts for a display name, registers the participant,
//! then reads lines one at a time and routes each before reading the next.
//! Outbound text is written by a separate writer task that drains the
//! connection's mailbox; if that writer fails the session ends as well.

use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, FramedRead, LinesCodec};
use tracing::{debug, info, warn};

use crate::command::parse_line;
use crate::config::Config;
use crate::error::AppError;
use crate::participant::{ConnectionHandle, Participant};
use crate::router::{format_join, format_leave, MessageRouter, RouterOutcome};
use crate::types::{strip_line_terminator, truncate_name, MAX_NAME_LEN};

/// Sent once, right after the connection is accepted
pub const NICKNAME_PROMPT: &str = "Enter your nickname: ";

/// How long a closing session waits for its writer to drain
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Negotiating,
    Active,
    Closing,
    Closed,
}

impl SessionState {
    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, Negotiating)
                | (Connecting, Closed)
                | (Negotiating, Active)
                | (Negotiating, Closed)
                | (Active, Closing)
                | (Closing, Closed)
        )
    }
}

/// Per-session limits
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// Longest accepted inbound line in bytes
    pub max_line_length: usize,
    /// Outbound mailbox depth
    pub outbox_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for SessionOptions {
    fn from(config: &Config) -> Self {
        Self {
            max_line_length: config.max_line_length,
            outbox_capacity: config.outbox_capacity,
        }
    }
}

/// Why the Active loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExitReason {
    /// `/quit`
    Quit,
    /// Peer closed its side
    EndOfStream,
    /// The outbound writer task finished (write failure)
    WriterEnded,
}

/// One connection's worker
pub struct ConnectionSession {
    router: MessageRouter,
    options: SessionOptions,
    peer: String,
    state: SessionState,
}

impl ConnectionSession {
    pub fn new(router: MessageRouter, options: SessionOptions, peer: impl Into<String>) -> Self {
        Self {
            router,
            options,
            peer: peer.into(),
            state: SessionState::Connecting,
        }
    }

    /// Run the session to completion over `stream`
    ///
    /// Returns `HandshakeFailed` if the peer goes away before sending a
    /// name; such a session is never registered. Once registered, the
    /// participant is always removed again before this returns.
    pub async fn run<S>(mut self, stream: S) -> Result<(), AppError>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, mut writer) = tokio::io::split(stream);
        let mut handshake = FramedRead::new(reader, NicknameCodec::default());

        // Connecting -> Negotiating
        if let Err(e) = send_prompt(&mut writer).await {
            self.enter(SessionState::Closed);
            return Err(e.into());
        }
        self.enter(SessionState::Negotiating);

        let name = match handshake.next().await {
            Some(Ok(name)) => name,
            Some(Err(e)) => {
                debug!("Handshake from {} failed: {}", self.peer, e);
                self.enter(SessionState::Closed);
                return Err(AppError::HandshakeFailed);
            }
            None => {
                debug!("{} closed before sending a name", self.peer);
                self.enter(SessionState::Closed);
                return Err(AppError::HandshakeFailed);
            }
        };

        // Bytes already buffered after the name carry over to the line codec
        let max_line_length = self.options.max_line_length;
        let mut lines =
            handshake.map_decoder(|_| LinesCodec::new_with_max_length(max_line_length));

        // Negotiating -> Active
        let (outbox, mailbox) = mpsc::channel(self.options.outbox_capacity);
        let me = Participant::new(ConnectionHandle::new(outbox), name);
        let mut write_task = tokio::spawn(write_loop(writer, mailbox));

        if let Err(e) = self.router.registry().add(me.clone()).await {
            write_task.abort();
            self.enter(SessionState::Closed);
            return Err(e.into());
        }
        self.enter(SessionState::Active);
        info!("{} joined from {}", me.name, self.peer);

        let result = self.active_loop(&me, &mut lines, &mut write_task).await;

        // Active -> Closing
        self.enter(SessionState::Closing);
        let writer_ended = matches!(result, Ok(ExitReason::WriterEnded));
        match &result {
            Ok(reason) => debug!("{} leaving: {:?}", me.id(), reason),
            Err(e) => debug!("{} leaving after error: {}", me.id(), e),
        }
        self.leave(me).await;

        // Closing -> Closed
        if !writer_ended {
            let drained = tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut write_task).await;
            if drained.is_err() {
                write_task.abort();
            }
        }
        self.enter(SessionState::Closed);

        result.map(|_| ())
    }

    /// Read, parse and route lines until the session should end
    async fn active_loop<R>(
        &self,
        me: &Participant,
        lines: &mut FramedRead<R, LinesCodec>,
        write_task: &mut JoinHandle<()>,
    ) -> Result<ExitReason, AppError>
    where
        R: AsyncRead + Unpin,
    {
        self.router.announce(me.id(), &format_join(&me.name)).await?;

        loop {
            tokio::select! {
                line = lines.next() => {
                    let line = match line {
                        Some(Ok(line)) => line,
                        Some(Err(e)) => return Err(e.into()),
                        None => return Ok(ExitReason::EndOfStream),
                    };

                    let Some(cmd) = parse_line(&line) else {
                        continue;
                    };
                    debug!("{} -> {:?}", me.id(), cmd);

                    let report = self.router.route(me, cmd).await?;
                    if report.outcome == RouterOutcome::Disconnect {
                        return Ok(ExitReason::Quit);
                    }
                }
                _ = &mut *write_task => {
                    return Ok(ExitReason::WriterEnded);
                }
            }
        }
    }

    /// Unregister and, if this session was still registered, announce it
    async fn leave(&self, me: Participant) {
        match self.router.registry().remove(me.id()).await {
            Ok(true) => {
                if let Err(e) = self.router.announce(me.id(), &format_leave(&me.name)).await {
                    warn!("Failed to announce departure of {}: {}", me.id(), e);
                }
                info!("{} disconnected", me.name);
            }
            Ok(false) => {}
            Err(e) => warn!("Failed to unregister {}: {}", me.id(), e),
        }
    }

    fn enter(&mut self, next: SessionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid session transition {:?} -> {:?}",
            self.state,
            next
        );
        debug!("Session {}: {:?} -> {:?}", self.peer, self.state, next);
        self.state = next;
    }
}

/// Frames the nickname line
///
/// Keeps only the head of the line and discards the rest up to the
/// newline, so a name of any length is truncated instead of rejected.
#[derive(Debug, Default)]
struct NicknameCodec {
    kept: Vec<u8>,
}

impl NicknameCodec {
    /// Longest name plus room for a char cut at the limit
    const KEEP: usize = MAX_NAME_LEN + 5;

    fn finish(&mut self) -> String {
        let raw = std::mem::take(&mut self.kept);
        let text = String::from_utf8_lossy(&raw);
        truncate_name(strip_line_terminator(&text))
    }
}

impl Decoder for NicknameCodec {
    type Item = String;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        let newline = buf.iter().position(|b| *b == b'\n');
        let end = newline.unwrap_or(buf.len());
        let room = Self::KEEP.saturating_sub(self.kept.len());
        self.kept.extend_from_slice(&buf[..end.min(room)]);

        match newline {
            Some(offset) => {
                buf.advance(offset + 1);
                Ok(Some(self.finish()))
            }
            None => {
                buf.clear();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, Self::Error> {
        match self.decode(buf)? {
            Some(name) => Ok(Some(name)),
            None if !self.kept.is_empty() => Ok(Some(self.finish())),
            None => Ok(None),
        }
    }
}

async fn send_prompt<W>(writer: &mut W) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(NICKNAME_PROMPT.as_bytes()).await?;
    writer.flush().await
}

/// Drain the mailbox to the connection, one text per write
///
/// Each text gets a trailing newline unless it already ends in one. Ends
/// when the mailbox closes or a write fails.
async fn write_loop<W>(mut writer: W, mut mailbox: mpsc::Receiver<String>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(mut text) = mailbox.recv().await {
        if !text.ends_with('\n') {
            text.push('\n');
        }
        if let Err(e) = writer.write_all(text.as_bytes()).await {
            debug!("Write failed, ending writer: {}", e);
            break;
        }
    }

    let _ = writer.shutdown().await;
}
