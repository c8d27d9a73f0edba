//! # agora-hub
//!
//! Realtime presence and messaging hub.
//!
//! - [`ConnectionRegistry`]: single owner of who is online; routes messages
//!   to per-session bounded queues and evicts sessions that cannot keep up
//! - Sessions: one read pump and one write pump per socket, linked by a
//!   cancellation token, with ping/pong liveness
//! - [`HubServer`]: axum server with a bearer-token upgrade gate, `/health`
//!   and `/metrics`, and graceful shutdown that closes every live socket

#![deny(unsafe_code)]

pub mod auth;
pub mod config;
pub mod errors;
pub mod health;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use auth::{AuthError, IdentityVerifier, JwtVerifier};
pub use config::HubConfig;
pub use errors::{ConfigError, ServerError, SessionError};
pub use server::{HubServer, ServerHandle};
pub use shutdown::ShutdownCoordinator;
pub use websocket::connection::SessionHandle;
pub use websocket::heartbeat::LivenessConfig;
pub use websocket::registry::{BroadcastSummary, ConnectionRegistry, RouteOutcome};
