//! Connection registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use axum::extract::ws::Message;
use futures::{Sink, Stream};
use secrecy::SecretString;
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info};

use crate::config::HubConfig;
use crate::connection::{Connection, ConnectionId};
use crate::envelope::Envelope;
use crate::errors::HubError;
use crate::role::Role;
use crate::router::EventRouter;

pub(crate) type ClientMap = HashMap<ConnectionId, Arc<Connection>>;

/// Owns every live connection and the event dispatch table.
pub struct Manager {
    clients: RwLock<ClientMap>,
    router: EventRouter,
    professor_key: Option<SecretString>,
    config: HubConfig,
}

impl Manager {
    /// Create a manager with the built-in event handlers.
    pub fn new(config: HubConfig, professor_key: Option<SecretString>) -> Arc<Self> {
        let router = EventRouter::with_default_handlers(&config);
        Self::with_router(config, professor_key, router)
    }

    /// Create a manager with a caller-built dispatch table.
    pub fn with_router(
        config: HubConfig,
        professor_key: Option<SecretString>,
        router: EventRouter,
    ) -> Arc<Self> {
        Arc::new(Self {
            clients: RwLock::new(HashMap::new()),
            router,
            professor_key,
            config,
        })
    }

    /// Hub settings.
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Dispatch table.
    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    /// Take ownership of an upgraded WebSocket.
    ///
    /// Resolves the role from `credential`, registers the connection and
    /// starts its read and write loops.
    pub async fn accept<S, E>(self: &Arc<Self>, socket: S, credential: Option<&str>) -> Arc<Connection>
    where
        S: Stream<Item = Result<Message, E>> + Sink<Message, Error = E> + Send + 'static,
        E: fmt::Display + Send + 'static,
    {
        let role = Role::from_credential(credential, self.professor_key.as_ref());
        let (conn, rx) = Connection::new(role);
        let conn = Arc::new(conn);

        self.add(Arc::clone(&conn)).await;
        info!(conn_id = %conn.id(), %role, "client connected");

        conn.spawn(socket, rx, Arc::downgrade(self), &self.config);
        conn
    }

    /// Register a connection.
    pub async fn add(&self, conn: Arc<Connection>) {
        let mut clients = self.clients.write().await;
        let _ = clients.insert(conn.id().clone(), conn);
    }

    /// Close and unregister a connection. No-op if it is not registered.
    pub async fn remove(&self, conn: &Connection) {
        let mut clients = self.clients.write().await;
        if let Some(removed) = clients.remove(conn.id()) {
            removed.close();
            debug!(conn_id = %removed.id(), role = %removed.role(), remaining = clients.len(), "client removed");
        }
    }

    /// Connections matching `predicate`, in no particular order.
    pub async fn snapshot<F>(&self, predicate: F) -> Vec<Arc<Connection>>
    where
        F: Fn(&Connection) -> bool,
    {
        let clients = self.clients.read().await;
        clients
            .values()
            .filter(|c| predicate(c))
            .cloned()
            .collect()
    }

    /// Shared view of the member set. Add and remove wait until it is dropped.
    pub(crate) async fn clients(&self) -> RwLockReadGuard<'_, ClientMap> {
        self.clients.read().await
    }

    /// Route an envelope sent by `origin` to its handler.
    pub async fn dispatch(&self, envelope: &Envelope, origin: &Arc<Connection>) -> Result<(), HubError> {
        self.router.dispatch(envelope, origin, self).await
    }

    /// Close every connection and empty the registry. Returns how many were
    /// closed.
    pub async fn shutdown(&self) -> usize {
        let mut clients = self.clients.write().await;
        let count = clients.len();
        for (_, conn) in clients.drain() {
            conn.close();
        }
        info!(closed = count, "closed all client connections");
        count
    }

    /// Whether `id` is registered.
    pub async fn contains(&self, id: &ConnectionId) -> bool {
        self.clients.read().await.contains_key(id)
    }

    /// Number of registered connections.
    pub async fn len(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Whether no connections are registered.
    pub async fn is_empty(&self) -> bool {
        self.clients.read().await.is_empty()
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("config", &self.config)
            .field("event_types", &self.router.event_types())
            .finish_non_exhaustive()
    }
}
