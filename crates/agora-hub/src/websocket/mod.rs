//! WebSocket sessions: connection registry, read/write pumps, liveness and
//! inbound dispatch.

pub mod connection;
pub mod handler;
pub mod heartbeat;
pub mod reader;
pub mod registry;
pub mod session;
pub mod writer;
