//! `/health` endpoint body.

use std::time::Instant;

use serde::Serialize;

/// Serving state reported by `/health`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Accepting upgrades.
    Ok,
    /// Shutdown has started; new upgrades get 503.
    Draining,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Serving state.
    pub status: HealthStatus,
    /// Whole seconds since the server was built.
    pub uptime_secs: u64,
    /// Users with a registered session.
    pub connections: usize,
}

/// Snapshot the hub's health.
pub fn health_check(started: Instant, connections: usize, draining: bool) -> HealthResponse {
    let status = if draining {
        HealthStatus::Draining
    } else {
        HealthStatus::Ok
    };
    HealthResponse {
        status,
        uptime_secs: started.elapsed().as_secs(),
        connections,
    }
}
