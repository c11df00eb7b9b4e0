//! # mnemo-server
//!
//! Axum HTTP + `WebSocket` server in front of the hub.
//!
//! - `GET /api/v1/join`: `WebSocket` upgrade, role from the `x-api-key` header
//! - `GET /health-check`, `GET /version`
//! - Graceful shutdown via `CancellationToken`

pub mod config;
pub mod errors;
pub mod health;
pub mod server;
pub mod shutdown;

pub use config::ServerConfig;
pub use errors::ServerError;
pub use server::{AppState, MnemoServer, API_KEY_HEADER};
pub use shutdown::ShutdownCoordinator;
