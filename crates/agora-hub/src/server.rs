//! `HubServer`: axum HTTP + WebSocket front of the hub.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Router;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::auth::{IdentityVerifier, bearer_token};
use crate::config::HubConfig;
use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::metrics::HUB_AUTH_FAILURES_TOTAL;
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::registry::ConnectionRegistry;
use crate::websocket::session::{SessionConfig, run_session};

/// Shared state accessible from axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Who is online, and where to route.
    pub registry: ConnectionRegistry,
    /// Upgrade gate.
    pub verifier: Arc<dyn IdentityVerifier>,
    /// Hub limits.
    pub config: Arc<HubConfig>,
    /// Shutdown coordinator.
    pub shutdown: ShutdownCoordinator,
    /// Free session slots; one permit per live session.
    pub slots: Arc<Semaphore>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle for `/metrics`, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

/// The hub server.
///
/// Owns the [`ConnectionRegistry`]; hosts reach it through
/// [`HubServer::registry`] to route events produced elsewhere (new chat
/// messages, receipts).
pub struct HubServer {
    config: Arc<HubConfig>,
    registry: ConnectionRegistry,
    verifier: Arc<dyn IdentityVerifier>,
    shutdown: ShutdownCoordinator,
    slots: Arc<Semaphore>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl HubServer {
    /// Validate `config` and start the registry. Must be called inside a
    /// tokio runtime.
    pub fn new(config: HubConfig, verifier: Arc<dyn IdentityVerifier>) -> Result<Self, ServerError> {
        config.validate()?;
        let slots = Arc::new(Semaphore::new(config.max_connections));
        Ok(Self {
            config: Arc::new(config),
            registry: ConnectionRegistry::spawn(),
            verifier,
            shutdown: ShutdownCoordinator::new(),
            slots,
            start_time: Instant::now(),
            metrics: None,
        })
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: self.registry.clone(),
            verifier: Arc::clone(&self.verifier),
            config: Arc::clone(&self.config),
            shutdown: self.shutdown.clone(),
            slots: Arc::clone(&self.slots),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// The registry handle.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    /// The hub configuration.
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Bind `host:port` and serve in the background.
    ///
    /// When the shutdown token fires, the registry is torn down first so
    /// every live socket receives a close frame, then the listener drains.
    pub async fn listen(&self) -> Result<ServerHandle, ServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "hub listening");

        let router = self.router();
        let token = self.shutdown.token();
        let registry = self.registry.clone();
        let task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    token.cancelled().await;
                    info!(sessions = registry.online_count(), "shutting down, closing sessions");
                    registry.shutdown().await;
                })
                .await
        });

        Ok(ServerHandle {
            local_addr,
            shutdown: self.shutdown.clone(),
            task,
        })
    }
}

/// How long [`ServerHandle::stop`] waits for in-flight connections before
/// aborting the listener.
const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// A running server.
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: ShutdownCoordinator,
    task: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    /// Address actually bound (resolves port `0`).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait until the server stops.
    pub async fn wait(self) -> Result<(), ServerError> {
        self.task.await??;
        Ok(())
    }

    /// Trigger shutdown and wait for the listener to drain.
    ///
    /// Connections still open after ten seconds are dropped with the
    /// listener task.
    pub async fn stop(self) -> Result<(), ServerError> {
        self.shutdown.shutdown();
        let abort = self.task.abort_handle();
        match tokio::time::timeout(STOP_TIMEOUT, self.task).await {
            Ok(joined) => {
                joined??;
                Ok(())
            }
            Err(_) => {
                warn!(timeout = ?STOP_TIMEOUT, "listener did not drain, aborting");
                abort.abort();
                Ok(())
            }
        }
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.registry.online_count(),
        state.shutdown.is_shutting_down(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => crate::metrics::render(handle).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

/// GET /ws
///
/// Verifies the bearer token before looking at the upgrade itself, so a
/// missing or bad token is a plain 401.
async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if state.shutdown.is_shutting_down() {
        return (StatusCode::SERVICE_UNAVAILABLE, "shutting down").into_response();
    }

    let identity = match bearer_token(&headers, query.token.as_deref())
        .and_then(|token| state.verifier.verify(&token))
    {
        Ok(identity) => identity,
        Err(e) => {
            metrics::counter!(HUB_AUTH_FAILURES_TOTAL).increment(1);
            warn!(error = %e, "websocket upgrade refused");
            return (StatusCode::UNAUTHORIZED, e.to_string()).into_response();
        }
    };

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let Ok(permit) = Arc::clone(&state.slots).try_acquire_owned() else {
        warn!(user_id = %identity.user_id, "connection limit reached");
        return (StatusCode::SERVICE_UNAVAILABLE, "too many connections").into_response();
    };

    info!(user_id = %identity.user_id, role = %identity.role, "websocket authenticated");
    let session_config = SessionConfig::from(state.config.as_ref());
    let registry = state.registry.clone();
    ws.max_message_size(state.config.max_message_bytes)
        .on_upgrade(move |socket| async move {
            let _permit = permit;
            let _ = run_session(socket, identity.user_id, registry, session_config).await;
        })
}
