//! Hub error types.

use std::time::Duration;

use thiserror::Error;

/// Invalid hub configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A liveness duration was zero.
    #[error("liveness durations must be non-zero")]
    ZeroDuration,
    /// The ping interval would not fire before the read deadline.
    #[error("ping interval {ping_interval:?} must be below pong wait {pong_wait:?}")]
    PingNotBelowPongWait {
        /// Configured ping interval.
        ping_interval: Duration,
        /// Configured pong wait.
        pong_wait: Duration,
    },
    /// Queue capacity was zero.
    #[error("outbound queue capacity must be at least 1")]
    ZeroQueueCapacity,
}

/// Why a session pump stopped.
///
/// Every variant ends the session; none is retried.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No frame (or pong) arrived within the read deadline.
    #[error("read deadline of {0:?} elapsed")]
    Timeout(Duration),
    /// An inbound frame exceeded the configured size limit.
    #[error("frame of {size} bytes exceeds limit of {limit}")]
    FrameTooLarge {
        /// Received size.
        size: usize,
        /// Configured limit.
        limit: usize,
    },
    /// The socket reported an error.
    #[error("transport error: {0}")]
    Transport(String),
    /// A socket write did not complete within the write deadline.
    #[error("write did not complete within {0:?}")]
    WriteTimeout(Duration),
    /// The peer closed the connection.
    #[error("peer closed the connection")]
    PeerClosed,
    /// The other pump of the same session stopped first.
    #[error("session closed by its other pump")]
    Cancelled,
    /// The registry closed the outbound queue.
    #[error("outbound queue closed")]
    QueueClosed,
}

impl SessionError {
    /// Short label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::FrameTooLarge { .. } => "frame_too_large",
            Self::Transport(_) => "transport",
            Self::WriteTimeout(_) => "write_timeout",
            Self::PeerClosed => "peer_closed",
            Self::Cancelled => "cancelled",
            Self::QueueClosed => "queue_closed",
        }
    }

    /// Whether this is an orderly end rather than a failure.
    pub fn is_graceful(&self) -> bool {
        matches!(self, Self::PeerClosed | Self::Cancelled | Self::QueueClosed)
    }
}

/// Server startup failures.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Binding or serving failed.
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The serving task panicked or was aborted.
    #[error("server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
