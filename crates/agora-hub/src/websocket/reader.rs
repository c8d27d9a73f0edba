//! Read pump: socket frames in, routed messages out.

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::ws::Message as WsMessage;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::connection::SessionHandle;
use super::handler::handle_frame;
use super::heartbeat::LivenessConfig;
use super::registry::ConnectionRegistry;
use crate::errors::SessionError;

/// Read frames until a fatal condition, then unregister the session.
///
/// Fatal: the read deadline elapsing, a frame over `max_message_bytes`, a
/// transport error, the peer closing, or `cancel` firing. Any frame,
/// ping and pong included, pushes the deadline forward. On exit `cancel` is
/// triggered so the write pump closes the socket.
pub async fn read_pump<S, E>(
    mut stream: S,
    session: &Arc<SessionHandle>,
    registry: &ConnectionRegistry,
    liveness: LivenessConfig,
    max_message_bytes: usize,
    cancel: CancellationToken,
) -> SessionError
where
    S: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: Display + Send,
{
    let mut deadline = liveness.read_deadline();
    let reason = loop {
        let frame = tokio::select! {
            biased;
            () = cancel.cancelled() => break SessionError::Cancelled,
            () = deadline.expired() => break SessionError::Timeout(liveness.pong_wait),
            frame = stream.next() => frame,
        };
        let frame = match frame {
            None => break SessionError::PeerClosed,
            Some(Err(e)) => break SessionError::Transport(e.to_string()),
            Some(Ok(frame)) => frame,
        };
        deadline.refresh();

        let text = match &frame {
            WsMessage::Text(text) => text.as_str().as_bytes(),
            WsMessage::Binary(data) => {
                if std::str::from_utf8(data).is_err() {
                    debug!(user_id = %session.user_id, len = data.len(), "ignoring non-UTF-8 binary frame");
                    continue;
                }
                &data[..]
            }
            WsMessage::Ping(_) | WsMessage::Pong(_) => {
                trace!(user_id = %session.user_id, "heartbeat frame");
                continue;
            }
            WsMessage::Close(_) => break SessionError::PeerClosed,
        };
        if text.len() > max_message_bytes {
            break SessionError::FrameTooLarge {
                size: text.len(),
                limit: max_message_bytes,
            };
        }
        let _ = handle_frame(text, session.user_id, registry).await;
    };

    cancel.cancel();
    let _ = registry.unregister(session).await;
    reason
}
