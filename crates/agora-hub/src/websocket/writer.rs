//! Write pump: the only task that writes to a session's socket.

use std::fmt::Display;
use std::time::Duration;

use agora_core::{Message, encode_outbound};
use axum::body::Bytes;
use axum::extract::ws::{CloseFrame, Message as WsMessage, Utf8Bytes, close_code};
use futures::{Sink, SinkExt};
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

use super::heartbeat::LivenessConfig;
use crate::errors::SessionError;

/// Drain the outbound queue onto the socket and ping on a timer.
///
/// Stops when the queue closes (registry eviction or unregister), when a
/// write fails or exceeds `write_wait`, or when `cancel` fires. On the first
/// two graceful paths a close frame is written before the sink is closed.
/// Never touches the registry.
pub async fn write_pump<K>(
    mut sink: K,
    mut queue: mpsc::Receiver<Message>,
    liveness: LivenessConfig,
    cancel: CancellationToken,
) -> SessionError
where
    K: Sink<WsMessage> + Unpin,
    K::Error: Display,
{
    let write_wait = liveness.write_wait;
    let mut ticker = liveness.ping_ticker();

    let reason = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break SessionError::Cancelled,
            next = queue.recv() => {
                let Some(message) = next else {
                    break SessionError::QueueClosed;
                };
                let text = match encode_outbound(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, kind = message.kind(), "skipping unencodable message");
                        continue;
                    }
                };
                if let Err(e) = send_frame(&mut sink, WsMessage::Text(text.into()), write_wait).await {
                    break e;
                }
            }
            _ = ticker.tick() => {
                trace!("ping");
                if let Err(e) = send_frame(&mut sink, WsMessage::Ping(Bytes::new()), write_wait).await {
                    break e;
                }
            }
        }
    };

    if let Some(frame) = close_frame_for(&reason) {
        let _ = send_frame(&mut sink, WsMessage::Close(Some(frame)), write_wait).await;
    }
    let _ = time::timeout(write_wait, sink.close()).await;
    cancel.cancel();
    reason
}

fn close_frame_for(reason: &SessionError) -> Option<CloseFrame> {
    let (code, text) = match reason {
        SessionError::QueueClosed => (close_code::AWAY, "session closed by server"),
        SessionError::Cancelled => (close_code::NORMAL, ""),
        _ => return None,
    };
    Some(CloseFrame {
        code,
        reason: Utf8Bytes::from_static(text),
    })
}

async fn send_frame<K>(sink: &mut K, frame: WsMessage, write_wait: Duration) -> Result<(), SessionError>
where
    K: Sink<WsMessage> + Unpin,
    K::Error: Display,
{
    match time::timeout(write_wait, sink.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(SessionError::Transport(e.to_string())),
        Err(_) => Err(SessionError::WriteTimeout(write_wait)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::{Event, TypingNotice, UserId};
    use assert_matches::assert_matches;
    use futures::StreamExt;
    use futures::channel::mpsc as fmpsc;
    use tokio::time::Instant;

    fn liveness() -> LivenessConfig {
        LivenessConfig::from_millis(900, 1000, 100)
    }

    fn typing(n: i64) -> Message {
        Message::new(
            UserId::new(7),
            Event::Typing(TypingNotice {
                conversation_id: n,
                user_id: UserId::new(9),
                is_typing: true,
            }),
        )
    }

    fn text_of(frame: &WsMessage) -> serde_json::Value {
        let WsMessage::Text(text) = frame else {
            panic!("expected text frame, got {frame:?}");
        };
        serde_json::from_str(text.as_str()).unwrap()
    }

    #[tokio::test]
    async fn queued_messages_are_written_in_order_then_close() {
        let (sink, mut socket) = fmpsc::unbounded::<WsMessage>();
        let (tx, rx) = mpsc::channel(8);
        for n in 1..=3 {
            tx.send(typing(n)).await.unwrap();
        }
        drop(tx);

        let reason = write_pump(sink, rx, liveness(), CancellationToken::new()).await;
        assert_matches!(reason, SessionError::QueueClosed);

        for n in 1..=3 {
            let frame = socket.next().await.unwrap();
            let json = text_of(&frame);
            assert_eq!(json["type"], "typing");
            assert_eq!(json["recipient_id"], 7);
            assert_eq!(json["payload"]["conversation_id"], n);
        }
        assert_matches!(
            socket.next().await,
            Some(WsMessage::Close(Some(CloseFrame { code, .. }))) if code == close_code::AWAY
        );
        assert!(socket.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn pings_on_interval() {
        let (sink, mut socket) = fmpsc::unbounded::<WsMessage>();
        let (_tx, rx) = mpsc::channel::<Message>(8);
        let cancel = CancellationToken::new();
        let start = Instant::now();
        let task = tokio::spawn(write_pump(sink, rx, liveness(), cancel.clone()));

        assert_matches!(socket.next().await, Some(WsMessage::Ping(_)));
        assert!(start.elapsed() >= Duration::from_millis(900));
        assert_matches!(socket.next().await, Some(WsMessage::Ping(_)));
        assert!(start.elapsed() >= Duration::from_millis(1800));

        cancel.cancel();
        assert_matches!(task.await.unwrap(), SessionError::Cancelled);
        assert_matches!(
            socket.next().await,
            Some(WsMessage::Close(Some(CloseFrame { code, .. }))) if code == close_code::NORMAL
        );
    }

    #[tokio::test]
    async fn write_error_stops_pump() {
        let (sink, socket) = fmpsc::unbounded::<WsMessage>();
        drop(socket);
        let (tx, rx) = mpsc::channel(8);
        tx.send(typing(1)).await.unwrap();

        let cancel = CancellationToken::new();
        let reason = write_pump(sink, rx, liveness(), cancel.clone()).await;
        assert_matches!(reason, SessionError::Transport(_));
        assert!(cancel.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_socket_hits_write_deadline() {
        // zero-capacity channel: one buffered send, then it blocks
        let (sink, _socket) = fmpsc::channel::<WsMessage>(0);
        let (tx, rx) = mpsc::channel(8);
        for n in 1..=3 {
            tx.send(typing(n)).await.unwrap();
        }

        let reason = write_pump(sink, rx, liveness(), CancellationToken::new()).await;
        assert_matches!(reason, SessionError::WriteTimeout(d) if d == Duration::from_millis(100));
    }

    #[test]
    fn only_graceful_exits_send_close() {
        assert!(close_frame_for(&SessionError::QueueClosed).is_some());
        assert!(close_frame_for(&SessionError::Cancelled).is_some());
        assert!(close_frame_for(&SessionError::Transport("x".into())).is_none());
        assert!(close_frame_for(&SessionError::WriteTimeout(Duration::from_secs(1))).is_none());
    }
}
