//! Ping/pong liveness.
//!
//! The write pump sends a ping every `ping_interval`; the read pump keeps a
//! sliding [`ReadDeadline`] of `pong_wait` that every inbound frame (pongs
//! included) pushes forward. `ping_interval < pong_wait` guarantees a ping
//! goes out before a healthy peer could be declared dead, so a silent peer is
//! closed within `ping_interval + pong_wait` of its last frame.

use std::time::Duration;

use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::errors::ConfigError;

/// Liveness timings for one session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LivenessConfig {
    /// Period between server pings.
    pub ping_interval: Duration,
    /// Silence tolerated on the read side before the session is closed.
    pub pong_wait: Duration,
    /// Upper bound for a single socket write.
    pub write_wait: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        let pong_wait = Duration::from_secs(60);
        Self {
            ping_interval: pong_wait * 9 / 10,
            pong_wait,
            write_wait: Duration::from_secs(10),
        }
    }
}

impl LivenessConfig {
    /// Build from millisecond values.
    pub fn from_millis(ping_interval_ms: u64, pong_wait_ms: u64, write_wait_ms: u64) -> Self {
        Self {
            ping_interval: Duration::from_millis(ping_interval_ms),
            pong_wait: Duration::from_millis(pong_wait_ms),
            write_wait: Duration::from_millis(write_wait_ms),
        }
    }

    /// Reject zero durations and a ping interval that is not strictly below
    /// the pong wait.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ping_interval.is_zero() || self.pong_wait.is_zero() || self.write_wait.is_zero() {
            return Err(ConfigError::ZeroDuration);
        }
        if self.ping_interval >= self.pong_wait {
            return Err(ConfigError::PingNotBelowPongWait {
                ping_interval: self.ping_interval,
                pong_wait: self.pong_wait,
            });
        }
        Ok(())
    }

    /// Worst-case time between a peer going silent and its session closing.
    pub fn detection_window(&self) -> Duration {
        self.ping_interval + self.pong_wait
    }

    /// Ticker for the write pump. The first tick fires one full period after
    /// creation; late ticks are delayed rather than bunched.
    pub fn ping_ticker(&self) -> Interval {
        let mut ticker = time::interval_at(Instant::now() + self.ping_interval, self.ping_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    /// Fresh read deadline for the read pump.
    pub fn read_deadline(&self) -> ReadDeadline {
        ReadDeadline::new(self.pong_wait)
    }
}

/// Sliding read deadline.
#[derive(Debug)]
pub struct ReadDeadline {
    window: Duration,
    at: Instant,
}

impl ReadDeadline {
    /// Deadline `window` from now.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            at: Instant::now() + window,
        }
    }

    /// Push the deadline to `window` from now.
    pub fn refresh(&mut self) {
        self.at = Instant::now() + self.window;
    }

    /// Current deadline instant.
    pub fn at(&self) -> Instant {
        self.at
    }

    /// Completes when the current deadline passes.
    ///
    /// The future captures the deadline at creation; callers re-create it on
    /// every loop iteration so a refresh takes effect.
    pub fn expired(&self) -> time::Sleep {
        time::sleep_until(self.at)
    }
}
