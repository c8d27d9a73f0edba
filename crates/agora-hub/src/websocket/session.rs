//! WebSocket session lifecycle: one verified user from upgrade through
//! disconnect.

use std::fmt::Display;
use std::sync::Arc;

use agora_core::UserId;
use axum::extract::ws::Message as WsMessage;
use futures::{Sink, Stream, StreamExt};
use metrics::{counter, histogram};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info, info_span, warn};

use super::connection::SessionHandle;
use super::heartbeat::LivenessConfig;
use super::reader::read_pump;
use super::registry::ConnectionRegistry;
use super::writer::write_pump;
use crate::config::HubConfig;
use crate::errors::SessionError;
use crate::metrics::{HUB_SESSION_DURATION_SECONDS, HUB_SESSIONS_CLOSED_TOTAL, HUB_SESSIONS_TOTAL};

/// Per-session limits.
#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    /// Outbound queue capacity.
    pub queue_capacity: usize,
    /// Largest inbound frame accepted, in bytes.
    pub max_message_bytes: usize,
    /// Ping, pong and write timings.
    pub liveness: LivenessConfig,
}

impl From<&HubConfig> for SessionConfig {
    fn from(config: &HubConfig) -> Self {
        Self {
            queue_capacity: config.queue_capacity,
            max_message_bytes: config.max_message_bytes,
            liveness: config.liveness,
        }
    }
}

/// How both pumps of a finished session ended.
#[derive(Debug)]
pub struct SessionEnd {
    /// Why the read pump stopped.
    pub read: SessionError,
    /// Why the write pump stopped.
    pub write: SessionError,
}

/// Run a session for `user_id` over `socket` until it ends.
///
/// 1. Registers a fresh [`SessionHandle`] with the registry
/// 2. Spawns the write pump, which owns the sink half
/// 3. Runs the read pump on the current task; it unregisters on exit
/// 4. Waits for the write pump and logs the session's end once
pub async fn run_session<S, E>(
    socket: S,
    user_id: UserId,
    registry: ConnectionRegistry,
    config: SessionConfig,
) -> SessionEnd
where
    S: Stream<Item = Result<WsMessage, E>> + Sink<WsMessage> + Send + 'static,
    <S as Sink<WsMessage>>::Error: Display + Send,
    E: Display + Send,
{
    let (handle, queue) = SessionHandle::new(user_id, config.queue_capacity);
    let session = Arc::new(handle);
    let span = info_span!("session", user_id = %user_id, conn_id = %session.id);

    async move {
        let (sink, stream) = socket.split();
        registry.register(Arc::clone(&session)).await;
        counter!(HUB_SESSIONS_TOTAL).increment(1);
        info!("session opened");

        let cancel = CancellationToken::new();
        let writer = tokio::spawn(
            write_pump(sink, queue, config.liveness, cancel.clone()).in_current_span(),
        );
        let read = read_pump(
            stream,
            &session,
            &registry,
            config.liveness,
            config.max_message_bytes,
            cancel,
        )
        .await;
        let write = writer
            .await
            .unwrap_or_else(|e| SessionError::Transport(format!("write pump failed: {e}")));

        let duration = session.age();
        counter!(HUB_SESSIONS_CLOSED_TOTAL, "reason" => read.label()).increment(1);
        histogram!(HUB_SESSION_DURATION_SECONDS).record(duration.as_secs_f64());
        if read.is_graceful() && write.is_graceful() {
            info!(read = %read, write = %write, ?duration, sent = session.enqueued_count(), "session closed");
        } else {
            warn!(read = %read, write = %write, ?duration, sent = session.enqueued_count(), "session closed");
        }
        SessionEnd { read, write }
    }
    .instrument(span)
    .await
}
