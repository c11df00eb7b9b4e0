//! In-memory WebSocket pair for driving connection loops in tests.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::extract::ws::Message;
use futures::channel::mpsc::{self, SendError, UnboundedReceiver, UnboundedSender};
use futures::{Sink, Stream, StreamExt};
use secrecy::SecretString;

use crate::connection::Connection;
use crate::delivery::{DeliveryQueue, DeliveryReceiver, Outbound};
use crate::manager::Manager;

/// Hub side of the pair.
pub(crate) struct MemorySocket {
    incoming: UnboundedReceiver<Message>,
    outgoing: UnboundedSender<Message>,
    stall_after_text: bool,
    stalled: bool,
}

impl MemorySocket {
    /// Hand the first text frame to the peer, then never finish flushing it
    /// or accept anything else, like a peer that stopped reading.
    pub(crate) fn stall_after_first_text(mut self) -> Self {
        self.stall_after_text = true;
        self
    }
}

/// Test side of the pair.
pub(crate) struct MemoryPeer {
    tx: UnboundedSender<Message>,
    rx: Option<UnboundedReceiver<Message>>,
}

impl MemoryPeer {
    /// Send a frame to the hub. Frames sent after the hub hung up are lost.
    pub(crate) fn send(&self, message: Message) {
        let _ = self.tx.unbounded_send(message);
    }

    /// Next frame written by the hub, `None` once the hub closed its sink.
    pub(crate) async fn recv(&mut self) -> Option<Message> {
        self.rx.as_mut()?.next().await
    }

    /// Stop reading while still able to send: every later hub write fails.
    pub(crate) fn drop_reader(&mut self) {
        self.rx = None;
    }
}

pub(crate) fn memory_pair() -> (MemorySocket, MemoryPeer) {
    let (to_hub, incoming) = mpsc::unbounded();
    let (outgoing, from_hub) = mpsc::unbounded();
    (
        MemorySocket {
            incoming,
            outgoing,
            stall_after_text: false,
            stalled: false,
        },
        MemoryPeer {
            tx: to_hub,
            rx: Some(from_hub),
        },
    )
}

impl Stream for MemorySocket {
    type Item = Result<Message, SendError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.incoming).poll_next(cx).map(|m| m.map(Ok))
    }
}

impl Sink<Message> for MemorySocket {
    type Error = SendError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if self.stalled {
            return Poll::Pending;
        }
        Pin::new(&mut self.outgoing).poll_ready(cx)
    }

    fn start_send(mut self: Pin<&mut Self>, item: Message) -> Result<(), Self::Error> {
        if self.stall_after_text && matches!(item, Message::Text(_)) {
            self.stalled = true;
        }
        Pin::new(&mut self.outgoing).start_send(item)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if self.stalled {
            return Poll::Pending;
        }
        Pin::new(&mut self.outgoing).poll_flush(cx)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if self.stalled {
            return Poll::Pending;
        }
        Pin::new(&mut self.outgoing).poll_close(cx)
    }
}

pub(crate) fn professor_key() -> SecretString {
    SecretString::from("key".to_owned())
}

/// Accept an in-memory connection on `manager`.
pub(crate) async fn accept_memory(
    manager: &Arc<Manager>,
    credential: Option<&str>,
) -> (Arc<Connection>, MemoryPeer) {
    let (socket, peer) = memory_pair();
    let conn = manager.accept(socket, credential).await;
    (conn, peer)
}

/// Accept an in-memory connection whose peer stops reading after the first
/// text frame.
pub(crate) async fn accept_stalling(manager: &Arc<Manager>) -> (Arc<Connection>, MemoryPeer) {
    let (socket, peer) = memory_pair();
    let conn = manager.accept(socket.stall_after_first_text(), None).await;
    (conn, peer)
}

/// Forward everything `rx` receives into an unbounded channel, returning
/// once the forwarder is parked waiting for the first handoff.
pub(crate) async fn drain(
    queue: &DeliveryQueue,
    mut rx: DeliveryReceiver,
) -> tokio::sync::mpsc::UnboundedReceiver<Outbound> {
    let (tx, out) = tokio::sync::mpsc::unbounded_channel();
    drop(tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if tx.send(message).is_err() {
                break;
            }
        }
    }));
    while !queue.has_waiting_receiver() {
        tokio::task::yield_now().await;
    }
    out
}

/// Next text frame from the hub, skipping pings. Gives up after 5s.
pub(crate) async fn next_text(peer: &mut MemoryPeer) -> Option<String> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match peer.recv().await? {
                Message::Text(text) => return Some(text.as_str().to_owned()),
                Message::Ping(_) => continue,
                _ => return None,
            }
        }
    })
    .await
    .ok()
    .flatten()
}

/// Whether a text frame arrives within `wait`.
pub(crate) async fn receives_text_within(peer: &mut MemoryPeer, wait: Duration) -> bool {
    tokio::time::timeout(wait, async {
        loop {
            match peer.recv().await {
                Some(Message::Text(_)) => return true,
                Some(_) => continue,
                None => return false,
            }
        }
    })
    .await
    .unwrap_or(false)
}
