//! Inbound frame dispatch: decode, then act on the frame's kind.

use agora_core::{Event, Inbound, Message, TypingNotice, UserId, decode_inbound};
use tracing::{debug, warn};

use super::registry::{ConnectionRegistry, RouteOutcome};
use crate::metrics::HUB_DECODE_ERRORS_TOTAL;

/// What the read pump did with one frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// A message was routed to another user.
    Routed(RouteOutcome),
    /// The frame was understood but has no server-side effect.
    Ignored,
    /// The frame did not decode; logged and skipped.
    Rejected,
}

/// Decode one inbound frame from `sender` and act on it.
///
/// Never fails: decode errors and unknown kinds are logged and the session
/// keeps reading.
pub async fn handle_frame(bytes: &[u8], sender: UserId, registry: &ConnectionRegistry) -> Dispatch {
    let inbound = match decode_inbound(bytes) {
        Ok(inbound) => inbound,
        Err(e) => {
            metrics::counter!(HUB_DECODE_ERRORS_TOTAL, "error" => e.label()).increment(1);
            warn!(user_id = %sender, error = %e, len = bytes.len(), "dropping undecodable frame");
            return Dispatch::Rejected;
        }
    };

    match inbound {
        Inbound::Typing(request) => {
            // the notice names the sender, never what the client claimed
            let message = Message::new(
                request.recipient_id,
                Event::Typing(TypingNotice {
                    conversation_id: request.conversation_id,
                    user_id: sender,
                    is_typing: request.is_typing,
                }),
            );
            let outcome = registry.route(message).await;
            debug!(
                user_id = %sender,
                recipient_id = %request.recipient_id,
                conversation_id = request.conversation_id,
                ?outcome,
                "typing routed"
            );
            Dispatch::Routed(outcome)
        }
        Inbound::Unknown { kind, .. } => {
            warn!(user_id = %sender, kind = kind.as_str(), "unrecognized message kind, ignored");
            Dispatch::Ignored
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use agora_logging::capture_logs;
    use tracing::Level;

    use crate::websocket::connection::SessionHandle;

    #[tokio::test]
    async fn typing_is_routed_with_sender_id() {
        let registry = ConnectionRegistry::spawn();
        let (handle, mut rx) = SessionHandle::new(UserId::new(7), 4);
        registry.register(Arc::new(handle)).await;

        let frame = br#"{"type":"typing","payload":{"conversation_id":3,"recipient_id":7,"is_typing":true}}"#;
        let dispatch = handle_frame(frame, UserId::new(9), &registry).await;
        assert_eq!(dispatch, Dispatch::Routed(RouteOutcome::Delivered));

        let routed = rx.recv().await.unwrap();
        assert_eq!(
            routed,
            Message::new(
                UserId::new(7),
                Event::Typing(TypingNotice {
                    conversation_id: 3,
                    user_id: UserId::new(9),
                    is_typing: true,
                }),
            )
        );
    }

    #[tokio::test]
    async fn typing_to_offline_user_is_dropped() {
        let registry = ConnectionRegistry::spawn();
        let frame = br#"{"type":"typing","payload":{"conversation_id":3,"recipient_id":5,"is_typing":false}}"#;
        let dispatch = handle_frame(frame, UserId::new(9), &registry).await;
        assert_eq!(dispatch, Dispatch::Routed(RouteOutcome::Offline));
    }

    #[tokio::test]
    async fn malformed_frame_is_logged() {
        let (logs, _guard) = capture_logs();
        let registry = ConnectionRegistry::spawn();
        let dispatch = handle_frame(b"{not json", UserId::new(9), &registry).await;
        assert_eq!(dispatch, Dispatch::Rejected);
        assert!(logs.has_event(Level::WARN, "undecodable frame"));
    }

    #[tokio::test]
    async fn bad_typing_payload_is_rejected() {
        let registry = ConnectionRegistry::spawn();
        let frame = br#"{"type":"typing","payload":{"conversation_id":"three"}}"#;
        let dispatch = handle_frame(frame, UserId::new(9), &registry).await;
        assert_eq!(dispatch, Dispatch::Rejected);
    }

    #[tokio::test]
    async fn unknown_kind_is_ignored() {
        let (logs, _guard) = capture_logs();
        let registry = ConnectionRegistry::spawn();
        let frame = br#"{"type":"presence_ping","payload":{}}"#;
        let dispatch = handle_frame(frame, UserId::new(9), &registry).await;
        assert_eq!(dispatch, Dispatch::Ignored);

        let events = logs.matching("unrecognized message kind");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].field("kind"), Some("presence_ping"));
    }
}
