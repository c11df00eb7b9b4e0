//! `MnemoServer`: Axum HTTP + WebSocket front for the hub.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{Json, Response};
use axum::routing::get;
use axum::Router;
use mnemo_hub::{EventRouter, Manager};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::health::{self, HealthResponse, VersionResponse};
use crate::shutdown::ShutdownCoordinator;

/// Header carrying the role credential on the join request.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Connection registry.
    pub manager: Arc<Manager>,
    /// When the server started.
    pub start_time: Instant,
    /// Reported by `/version`.
    pub version: Arc<str>,
}

/// The mnemo server.
pub struct MnemoServer {
    config: ServerConfig,
    manager: Arc<Manager>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl MnemoServer {
    /// Create a server with the built-in event handlers.
    pub fn new(config: ServerConfig) -> Self {
        let router = EventRouter::with_default_handlers(&config.hub);
        Self::with_router(config, router)
    }

    /// Create a server whose hub dispatches through `router`.
    pub fn with_router(config: ServerConfig, router: EventRouter) -> Self {
        let manager = Manager::with_router(
            config.hub.clone(),
            config.professor_api_key.clone(),
            router,
        );
        Self {
            config,
            manager,
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            manager: Arc::clone(&self.manager),
            start_time: self.start_time,
            version: Arc::from(self.config.version.as_str()),
        };

        Router::new()
            .route("/health-check", get(health_handler))
            .route("/version", get(version_handler))
            .route("/api/v1/join", get(join_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the configured address and serve until the shutdown token fires.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let address = &self.config.listen_address;
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| ServerError::Bind {
                address: address.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        info!(listen_address = %local_addr, "mnemo server started");

        let router = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %e, "server stopped with error");
            }
            debug!("listener stopped");
        });

        Ok((local_addr, handle))
    }

    /// Stop listening, close every connection and wait for `handles`.
    pub async fn graceful_shutdown(&self, handles: Vec<JoinHandle<()>>) {
        self.shutdown
            .graceful_shutdown(&self.manager, handles, Some(self.config.shutdown_timeout()))
            .await;
    }

    /// Get the connection registry.
    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health-check
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let connections = state.manager.len().await;
    Json(health::health_check(state.start_time, connections))
}

/// GET /version
async fn version_handler(State(state): State<AppState>) -> Json<VersionResponse> {
    Json(VersionResponse {
        version: state.version.to_string(),
    })
}

/// GET /api/v1/join: upgrade and hand the socket to the hub.
async fn join_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let credential = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let limit = state.manager.config().max_frame_size;

    ws.max_message_size(limit)
        .max_frame_size(limit)
        .on_upgrade(move |socket| async move {
            let _ = state.manager.accept(socket, credential.as_deref()).await;
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use secrecy::SecretString;
    use tower::ServiceExt;

    fn make_server() -> MnemoServer {
        MnemoServer::new(ServerConfig {
            listen_address: "127.0.0.1:0".into(),
            ..ServerConfig::default()
        })
    }

    async fn get_json(app: Router, uri: &str) -> serde_json::Value {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), 10_000)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let server = make_server();
        let parsed = get_json(server.router(), "/health-check").await;
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["connections"], 0);
        assert!(parsed["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn version_endpoint_reports_config() {
        let server = MnemoServer::new(ServerConfig {
            version: "9.9.9".into(),
            ..ServerConfig::default()
        });
        let parsed = get_json(server.router(), "/version").await;
        assert_eq!(parsed["version"], "9.9.9");
    }

    #[tokio::test]
    async fn join_without_upgrade_is_rejected() {
        let server = make_server();
        let req = Request::builder()
            .uri("/api/v1/join")
            .body(Body::empty())
            .unwrap();
        let resp = server.router().oneshot(req).await.unwrap();
        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let server = make_server();
        let req = Request::builder()
            .uri("/nonexistent")
            .body(Body::empty())
            .unwrap();
        let resp = server.router().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn manager_uses_hub_config() {
        let mut config = ServerConfig::default();
        config.hub.max_frame_size = 1024;
        config.professor_api_key = Some(SecretString::from("k".to_owned()));
        let server = MnemoServer::new(config);
        assert_eq!(server.manager().config().max_frame_size, 1024);
        assert!(server.manager().router().has_event("send_message"));
    }

    #[tokio::test]
    async fn custom_router_is_installed() {
        let server = MnemoServer::with_router(ServerConfig::default(), EventRouter::new());
        assert!(server.manager().router().event_types().is_empty());
    }

    #[tokio::test]
    async fn listen_binds_ephemeral_port() {
        let server = make_server();
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);

        server.graceful_shutdown(vec![handle]).await;
        assert!(server.shutdown().is_shutting_down());
    }

    #[tokio::test]
    async fn listen_reports_bind_failure() {
        let blocker = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let taken = blocker.local_addr().unwrap();
        let server = MnemoServer::new(ServerConfig {
            listen_address: taken.to_string(),
            ..ServerConfig::default()
        });
        let err = server.listen().await.unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }));
    }
}
