//! Framed connection driver shared by the control listener and relay client.
//!
//! A [`ConnectionHandler`] holds the per-connection protocol logic and never
//! touches the socket. [`drive`] owns the stream: it splits incoming bytes
//! into `size | type` frames, feeds them to the handler and performs the
//! returned [`Action`].

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::watch;
use tracing::debug;

use nse_core::protocol::api::{frame_length, FRAME_HEADER_LENGTH};

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection number, used in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Issue the next id.
    pub fn next() -> Self {
        Self(NEXT_SESSION.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What the driver should do after a handler callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Nothing,
    Reply(Bytes),
    ReplyAndClose(Bytes),
    Close,
}

/// Why a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The handler asked to close.
    Local,
    /// The peer closed its side.
    PeerClosed,
    Shutdown,
    Io(String),
}

/// Per-connection protocol logic.
pub trait ConnectionHandler: Send {
    /// Called once before any data is read.
    fn on_connected(&mut self, session: SessionId, peer: SocketAddr) -> Action;

    /// Called with each complete frame, or with the unframeable remainder of
    /// the buffer when a header is invalid.
    fn on_data(&mut self, frame: &[u8]) -> Action;

    /// Called with each payload queued on the outbound channel.
    fn on_outbound(&mut self, _payload: Vec<u8>) -> Action {
        Action::Nothing
    }

    fn on_closed(&mut self, reason: &CloseReason);
}

/// Run `handler` over `stream` until either side closes or shutdown is
/// signalled.
pub async fn drive<S, H>(
    session: SessionId,
    peer: SocketAddr,
    mut stream: S,
    mut handler: H,
    mut outbound: Option<UnboundedReceiver<Vec<u8>>>,
    mut shutdown: watch::Receiver<bool>,
) -> CloseReason
where
    S: AsyncRead + AsyncWrite + Unpin,
    H: ConnectionHandler,
{
    let reason = run(session, peer, &mut stream, &mut handler, &mut outbound, &mut shutdown).await;
    debug!(%session, ?reason, "Connection closed");
    handler.on_closed(&reason);
    reason
}

async fn run<S, H>(
    session: SessionId,
    peer: SocketAddr,
    stream: &mut S,
    handler: &mut H,
    outbound: &mut Option<UnboundedReceiver<Vec<u8>>>,
    shutdown: &mut watch::Receiver<bool>,
) -> CloseReason
where
    S: AsyncRead + AsyncWrite + Unpin,
    H: ConnectionHandler,
{
    if *shutdown.borrow() {
        return CloseReason::Shutdown;
    }
    if let Some(reason) = perform(stream, handler.on_connected(session, peer)).await {
        return reason;
    }

    let mut buffer = BytesMut::with_capacity(4096);
    loop {
        tokio::select! {
            read = stream.read_buf(&mut buffer) => match read {
                Ok(0) => return CloseReason::PeerClosed,
                Ok(_) => {
                    while let Some(frame) = next_frame(&mut buffer) {
                        if let Some(reason) = perform(stream, handler.on_data(&frame)).await {
                            return reason;
                        }
                    }
                }
                Err(e) => return CloseReason::Io(e.to_string()),
            },
            payload = recv_outbound(outbound) => match payload {
                Some(payload) => {
                    if let Some(reason) = perform(stream, handler.on_outbound(payload)).await {
                        return reason;
                    }
                }
                None => *outbound = None,
            },
            _ = shutdown.changed() => return CloseReason::Shutdown,
        }
    }
}

/// Split one frame off the front of `buffer`.
///
/// A header declaring less than its own length cannot be framed; the whole
/// buffer is handed over so the handler can reject it.
fn next_frame(buffer: &mut BytesMut) -> Option<Bytes> {
    if buffer.len() < FRAME_HEADER_LENGTH {
        return None;
    }
    match frame_length(&buffer[..FRAME_HEADER_LENGTH]) {
        Ok(size) if buffer.len() >= size => Some(buffer.split_to(size).freeze()),
        Ok(_) => None,
        Err(_) => Some(buffer.split().freeze()),
    }
}

async fn recv_outbound(outbound: &mut Option<UnboundedReceiver<Vec<u8>>>) -> Option<Vec<u8>> {
    match outbound {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Apply `action`; `Some` means the connection is finished.
async fn perform<S>(stream: &mut S, action: Action) -> Option<CloseReason>
where
    S: AsyncWrite + Unpin,
{
    let (reply, close) = match action {
        Action::Nothing => return None,
        Action::Reply(bytes) => (Some(bytes), false),
        Action::ReplyAndClose(bytes) => (Some(bytes), true),
        Action::Close => (None, true),
    };
    if let Some(bytes) = reply {
        if let Err(e) = stream.write_all(&bytes).await {
            return Some(CloseReason::Io(e.to_string()));
        }
    }
    if close {
        // Best effort; the peer may already be gone.
        let _ = stream.shutdown().await;
        return Some(CloseReason::Local);
    }
    None
}
