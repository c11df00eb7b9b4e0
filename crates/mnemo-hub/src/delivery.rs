//! Rendezvous delivery with bounded retry.
//!
//! A connection's outbound loop hands itself one message at a time: an
//! offer succeeds only while that loop is parked in
//! [`DeliveryReceiver::recv`]. While it is writing a frame, pinging, or
//! stalled on a slow peer, every offer fails and the producer decides
//! whether to retry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::DeliveryError;

/// A serialized outbound frame, shared by every recipient of a broadcast.
pub type Outbound = Arc<String>;

/// How hard to try before dropping a message for one recipient.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(1),
        }
    }
}

/// Producer side of a connection's delivery handoff.
#[derive(Clone, Debug)]
pub struct DeliveryQueue {
    tx: mpsc::Sender<Outbound>,
    waiting: Arc<AtomicBool>,
}

/// Consumer side, owned by the outbound loop.
#[derive(Debug)]
pub struct DeliveryReceiver {
    rx: mpsc::Receiver<Outbound>,
    waiting: Arc<AtomicBool>,
}

impl DeliveryQueue {
    /// Create a queue and the receiver its outbound loop drains.
    pub fn channel() -> (Self, DeliveryReceiver) {
        let (tx, rx) = mpsc::channel(1);
        let waiting = Arc::new(AtomicBool::new(false));
        (
            Self {
                tx,
                waiting: Arc::clone(&waiting),
            },
            DeliveryReceiver { rx, waiting },
        )
    }

    /// Single non-blocking attempt. Fails unless the receiver is waiting
    /// right now; the claim is exclusive, so concurrent producers cannot
    /// both succeed.
    pub fn offer(&self, message: Outbound) -> Result<(), (DeliveryError, Outbound)> {
        if self.tx.is_closed() {
            return Err((DeliveryError::Closed, message));
        }
        if self
            .waiting
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err((DeliveryError::Exhausted { attempts: 1 }, message));
        }
        self.tx.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Full(m) => (DeliveryError::Exhausted { attempts: 1 }, m),
            mpsc::error::TrySendError::Closed(m) => (DeliveryError::Closed, m),
        })
    }

    /// Offer `message` up to `policy.max_attempts` times, sleeping
    /// `policy.delay` between attempts. A closed queue fails immediately.
    pub async fn deliver(&self, message: Outbound, policy: RetryPolicy) -> Result<(), DeliveryError> {
        let attempts = policy.max_attempts.max(1);
        let mut message = message;
        for attempt in 1..=attempts {
            match self.offer(message) {
                Ok(()) => return Ok(()),
                Err((DeliveryError::Closed, _)) => return Err(DeliveryError::Closed),
                Err((DeliveryError::Exhausted { .. }, m)) => {
                    message = m;
                    if attempt < attempts {
                        debug!(attempt, "retry sending message");
                        tokio::time::sleep(policy.delay).await;
                    }
                }
            }
        }
        Err(DeliveryError::Exhausted { attempts })
    }

    /// Whether the outbound loop has dropped its receiver.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    #[cfg(test)]
    pub(crate) fn has_waiting_receiver(&self) -> bool {
        self.waiting.load(Ordering::Acquire)
    }
}

impl DeliveryReceiver {
    /// Wait for the next handoff. Offers can only land while this future is
    /// pending; `None` once every producer is gone.
    pub async fn recv(&mut self) -> Option<Outbound> {
        let _armed = Armed::new(&self.waiting);
        self.rx.recv().await
    }
}

/// Marks the receiver as waiting for as long as it lives.
struct Armed<'a>(&'a AtomicBool);

impl<'a> Armed<'a> {
    fn new(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for Armed<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
