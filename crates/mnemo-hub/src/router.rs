//! Event type → handler dispatch table.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::broadcast::SendMessageHandler;
use crate::config::HubConfig;
use crate::connection::Connection;
use crate::envelope::{Envelope, EVENT_SEND_MESSAGE};
use crate::errors::HubError;
use crate::manager::Manager;

/// Trait implemented by every event handler.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one envelope sent by `origin`.
    async fn handle(
        &self,
        envelope: &Envelope,
        origin: &Arc<Connection>,
        manager: &Manager,
    ) -> Result<(), HubError>;
}

/// Registry mapping event types to handlers.
///
/// Built before the [`Manager`] that owns it and never modified afterwards.
pub struct EventRouter {
    handlers: HashMap<String, Arc<dyn EventHandler>>,
}

impl EventRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Router with the hub's built-in events.
    pub fn with_default_handlers(config: &HubConfig) -> Self {
        let mut router = Self::new();
        router.register(EVENT_SEND_MESSAGE, SendMessageHandler::new(config.retry_policy()));
        router
    }

    /// Register a handler for an event type, replacing any previous one.
    pub fn register(&mut self, event_type: &str, handler: impl EventHandler + 'static) {
        let _ = self.handlers.insert(event_type.to_owned(), Arc::new(handler));
    }

    /// Run the handler for `envelope`'s type on the caller's task.
    #[instrument(skip_all, fields(event_type = envelope.event_type(), conn_id = %origin.id()))]
    pub async fn dispatch(
        &self,
        envelope: &Envelope,
        origin: &Arc<Connection>,
        manager: &Manager,
    ) -> Result<(), HubError> {
        let Some(handler) = self.handlers.get(envelope.event_type()) else {
            return Err(HubError::UnknownEventType(envelope.event_type().to_owned()));
        };
        debug!("dispatching event");
        handler.handle(envelope, origin, manager).await
    }

    /// Registered event types (sorted).
    pub fn event_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether an event type has a handler.
    pub fn has_event(&self, event_type: &str) -> bool {
        self.handlers.contains_key(event_type)
    }
}

impl Default for EventRouter {
    fn default() -> Self {
        Self::new()
    }
}
