//! Per-connection actor.
//!
//! Each accepted WebSocket is split in two and driven by a pair of tasks:
//! - read loop: owns the stream half, enforces the idle deadline, decodes
//!   frames and dispatches them through the [`Manager`]
//! - write loop: owns the sink half, takes handoffs from the
//!   [`DeliveryQueue`] and sends keepalive pings
//!
//! Whichever loop ends first closes the connection and removes it from the
//! registry; the other notices the close signal and follows. A write stuck
//! on a peer that stopped reading is abandoned when the close signal fires,
//! and the transport is dropped after at most [`CLOSE_WAIT`].

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use axum::extract::ws::{close_code, CloseFrame, Message};
use bytes::Bytes;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::config::HubConfig;
use crate::delivery::{DeliveryQueue, DeliveryReceiver};
use crate::envelope::Envelope;
use crate::manager::Manager;
use crate::role::Role;

/// How long the write loop spends on the close frame before dropping the
/// transport.
pub const CLOSE_WAIT: Duration = Duration::from_secs(1);

/// Unique connection identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(String);

impl ConnectionId {
    /// Generate a fresh, time-ordered id.
    pub fn new() -> Self {
        Self(format!("conn_{}", Uuid::now_v7()))
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A connected client.
pub struct Connection {
    id: ConnectionId,
    role: Role,
    queue: DeliveryQueue,
    closed: CancellationToken,
}

impl Connection {
    /// Create a connection and the receiver its write loop drains.
    pub fn new(role: Role) -> (Self, DeliveryReceiver) {
        let (queue, rx) = DeliveryQueue::channel();
        let conn = Self {
            id: ConnectionId::new(),
            role,
            queue,
            closed: CancellationToken::new(),
        };
        (conn, rx)
    }

    /// Connection id.
    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    /// Role fixed at accept time.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Producer side of this connection's delivery queue.
    pub fn queue(&self) -> &DeliveryQueue {
        &self.queue
    }

    /// Signal both loops to stop; the write loop sends a close frame on the
    /// way out. Idempotent.
    pub fn close(&self) {
        self.closed.cancel();
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Start the read and write loops over `socket`.
    pub(crate) fn spawn<S, E>(
        self: &Arc<Self>,
        socket: S,
        rx: DeliveryReceiver,
        manager: Weak<Manager>,
        config: &HubConfig,
    ) where
        S: Stream<Item = Result<Message, E>> + Sink<Message, Error = E> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let (sink, stream) = socket.split();
        drop(tokio::spawn(write_loop(
            Arc::clone(self),
            sink,
            rx,
            manager.clone(),
            config.ping_interval(),
        )));
        drop(tokio::spawn(read_loop(
            Arc::clone(self),
            stream,
            manager,
            config.clone(),
        )));
    }

    async fn teardown(&self, manager: &Weak<Manager>) {
        self.close();
        if let Some(hub) = manager.upgrade() {
            hub.remove(self).await;
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

async fn read_loop<R, E>(conn: Arc<Connection>, mut stream: R, manager: Weak<Manager>, config: HubConfig)
where
    R: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    let pong_wait = config.pong_wait();
    let mut deadline = Instant::now() + pong_wait;

    loop {
        let next = tokio::select! {
            () = conn.closed.cancelled() => break,
            next = time::timeout_at(deadline, stream.next()) => next,
        };
        let message = match next {
            Err(_elapsed) => {
                info!(conn_id = %conn.id, ?pong_wait, "no frames or pongs within deadline, dropping client");
                break;
            }
            Ok(None) => {
                debug!(conn_id = %conn.id, "transport ended");
                break;
            }
            Ok(Some(Err(e))) => {
                warn!(conn_id = %conn.id, error = %e, "error reading message");
                break;
            }
            Ok(Some(Ok(message))) => message,
        };

        // Any frame proves the peer is alive.
        deadline = Instant::now() + pong_wait;

        let frame: &[u8] = match &message {
            Message::Text(text) => text.as_str().as_bytes(),
            Message::Binary(data) => data.as_ref(),
            Message::Pong(_) => {
                trace!(conn_id = %conn.id, "pong");
                continue;
            }
            // axum answers pings itself
            Message::Ping(_) => continue,
            Message::Close(frame) => {
                log_peer_close(&conn, frame.as_ref());
                break;
            }
        };

        if frame.len() > config.max_frame_size {
            warn!(
                conn_id = %conn.id,
                len = frame.len(),
                limit = config.max_frame_size,
                "read limit exceeded"
            );
            break;
        }

        let envelope = match Envelope::decode(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                // Malformed frames are tolerated; the peer stays connected.
                warn!(conn_id = %conn.id, error = %e, "dropping undecodable frame");
                continue;
            }
        };

        let Some(hub) = manager.upgrade() else {
            break;
        };
        if let Err(e) = hub.dispatch(&envelope, &conn).await {
            warn!(
                conn_id = %conn.id,
                event_type = envelope.event_type(),
                error = %e,
                "error handling event"
            );
        }
    }

    drop(stream);
    conn.teardown(&manager).await;
}

async fn write_loop<W, E>(
    conn: Arc<Connection>,
    mut sink: W,
    mut rx: DeliveryReceiver,
    manager: Weak<Manager>,
    ping_interval: Duration,
) where
    W: Sink<Message, Error = E> + Unpin,
    E: fmt::Display,
{
    let mut ticker = time::interval_at(Instant::now() + ping_interval, ping_interval);

    loop {
        let frame = tokio::select! {
            queued = rx.recv() => match queued {
                Some(json) => Message::Text(json.as_str().into()),
                None => break,
            },
            _ = ticker.tick() => Message::Ping(Bytes::new()),
            () = conn.closed.cancelled() => break,
        };
        let kind = if matches!(frame, Message::Ping(_)) { "ping" } else { "message" };

        tokio::select! {
            sent = sink.send(frame) => {
                if let Err(e) = sent {
                    warn!(conn_id = %conn.id, error = %e, kind, "write failed");
                    break;
                }
                trace!(conn_id = %conn.id, kind, "sent");
            }
            () = conn.closed.cancelled() => {
                debug!(conn_id = %conn.id, kind, "write abandoned on close");
                break;
            }
        }
    }

    match time::timeout(CLOSE_WAIT, send_close(&mut sink)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(conn_id = %conn.id, error = %e, "connection already closed"),
        Err(_) => debug!(conn_id = %conn.id, "peer not reading, dropping transport"),
    }
    drop(sink);
    drop(rx);
    conn.teardown(&manager).await;
}

async fn send_close<W, E>(sink: &mut W) -> Result<(), E>
where
    W: Sink<Message, Error = E> + Unpin,
{
    sink.send(Message::Close(None)).await?;
    sink.close().await
}

fn log_peer_close(conn: &Connection, frame: Option<&CloseFrame>) {
    match frame.map(|f| f.code) {
        None | Some(close_code::NORMAL | close_code::AWAY | close_code::ABNORMAL) => {
            debug!(conn_id = %conn.id, "peer closed connection");
        }
        Some(code) => {
            info!(conn_id = %conn.id, code, "peer closed connection unexpectedly");
        }
    }
}
