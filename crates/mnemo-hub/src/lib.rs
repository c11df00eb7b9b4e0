//! # mnemo-hub
//!
//! Real-time WebSocket hub for a classroom.
//!
//! - Connection registry shared by every actor (`Manager`)
//! - One read task and one write task per connection, with ping/pong keepalive
//! - Rendezvous outbound handoff with bounded retry
//! - Event routing by envelope `type`
//! - Professor → students / student → professors broadcast

pub mod broadcast;
pub mod config;
pub mod connection;
pub mod delivery;
pub mod envelope;
pub mod errors;
pub mod manager;
pub mod role;
pub mod router;

#[cfg(test)]
mod test_support;

pub use broadcast::SendMessageHandler;
pub use config::HubConfig;
pub use connection::{Connection, ConnectionId};
pub use delivery::{DeliveryQueue, DeliveryReceiver, Outbound, RetryPolicy};
pub use envelope::{BroadcastMessage, ChatMessage, Envelope, EVENT_NEW_MESSAGE, EVENT_SEND_MESSAGE};
pub use errors::{DeliveryError, HubError};
pub use manager::Manager;
pub use role::Role;
pub use router::{EventHandler, EventRouter};
