//! Role-based fan-out for `send_message`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::delivery::RetryPolicy;
use crate::envelope::{BroadcastMessage, ChatMessage, Envelope, EVENT_NEW_MESSAGE};
use crate::errors::HubError;
use crate::manager::Manager;
use crate::router::EventHandler;

/// Relays a chat message to the opposite role.
///
/// Professors reach every student; students reach every professor. The
/// registry stays read-locked for the whole fan-out, so a slow recipient
/// delays membership changes by at most one retry budget.
#[derive(Clone, Debug)]
pub struct SendMessageHandler {
    retry: RetryPolicy,
}

impl SendMessageHandler {
    /// Handler that retries each recipient according to `retry`.
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }
}

impl Default for SendMessageHandler {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[async_trait]
impl EventHandler for SendMessageHandler {
    async fn handle(
        &self,
        envelope: &Envelope,
        origin: &Arc<Connection>,
        manager: &Manager,
    ) -> Result<(), HubError> {
        let chat: ChatMessage = envelope.decode_payload()?;
        let outgoing = Envelope::new(EVENT_NEW_MESSAGE, &BroadcastMessage::from_chat(chat))?;
        let json = Arc::new(outgoing.encode()?);

        let audience = origin.role().audience()?;

        let clients = manager.clients().await;
        let recipients: Vec<&Arc<Connection>> =
            clients.values().filter(|c| c.role() == audience).collect();
        debug!(
            conn_id = %origin.id(),
            from = %origin.role(),
            to = %audience,
            recipients = recipients.len(),
            "broadcast message"
        );

        for conn in recipients {
            if let Err(e) = conn.queue().deliver(Arc::clone(&json), self.retry).await {
                warn!(conn_id = %conn.id(), error = %e, "dropping message for client");
            }
        }
        Ok(())
    }
}
