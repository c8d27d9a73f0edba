//! Connection registry: the single authority over who is online.
//!
//! Mutations (`register`, `unregister`, `route`, `shutdown`) are commands
//! processed one at a time by an owning task; each carries a oneshot ack so
//! the caller sees the effect once the call returns. Read-only queries take
//! a `parking_lot` read lock on the shared map and never go through the task.
//! Only the owning task ever takes the write lock.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use agora_core::{Event, Message, UserId};
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::connection::{Enqueue, SessionHandle};
use crate::metrics::{
    HUB_EVICTIONS_TOTAL, HUB_MESSAGES_DROPPED_TOTAL, HUB_MESSAGES_ROUTED_TOTAL,
    HUB_SESSIONS_ACTIVE,
};

type OnlineMap = Arc<RwLock<HashMap<UserId, Arc<SessionHandle>>>>;

/// What happened to a routed message. Informational, never an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Enqueued on the recipient's session.
    Delivered,
    /// No session for the recipient; dropped.
    Offline,
    /// The recipient's queue was full or already closed; the session was
    /// evicted and the message dropped.
    Evicted,
}

/// Per-outcome counts from [`ConnectionRegistry::broadcast_to_many`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastSummary {
    /// Recipients whose queue accepted the event.
    pub delivered: usize,
    /// Recipients with no session.
    pub offline: usize,
    /// Recipients evicted while routing.
    pub evicted: usize,
}

impl BroadcastSummary {
    fn record(&mut self, outcome: RouteOutcome) {
        match outcome {
            RouteOutcome::Delivered => self.delivered += 1,
            RouteOutcome::Offline => self.offline += 1,
            RouteOutcome::Evicted => self.evicted += 1,
        }
    }
}

enum Command {
    Register {
        session: Arc<SessionHandle>,
        ack: oneshot::Sender<()>,
    },
    Unregister {
        session: Arc<SessionHandle>,
        ack: oneshot::Sender<bool>,
    },
    Route {
        message: Message,
        ack: oneshot::Sender<RouteOutcome>,
    },
    Shutdown {
        ack: oneshot::Sender<()>,
    },
}

/// Cloneable handle to the registry.
///
/// Construct one at startup with [`ConnectionRegistry::spawn`] and pass it
/// to whatever needs to route; [`ConnectionRegistry::shutdown`] closes every
/// session.
#[derive(Clone, Debug)]
pub struct ConnectionRegistry {
    commands: mpsc::UnboundedSender<Command>,
    online: OnlineMap,
}

impl ConnectionRegistry {
    /// Start the owning task on the current runtime.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let online = OnlineMap::default();
        let owner = Owner {
            online: Arc::clone(&online),
        };
        drop(tokio::spawn(owner.run(rx)));
        Self {
            commands: tx,
            online,
        }
    }

    /// Map `session.user_id` to `session`.
    ///
    /// A session already registered for the same user is evicted. After
    /// shutdown the incoming session's queue is closed instead.
    pub async fn register(&self, session: Arc<SessionHandle>) {
        let (ack, done) = oneshot::channel();
        let command = Command::Register {
            session: Arc::clone(&session),
            ack,
        };
        if self.commands.send(command).is_err() || done.await.is_err() {
            warn!(user_id = %session.user_id, conn_id = %session.id, "register after registry shutdown");
            let _ = session.close_queue();
        }
    }

    /// Remove `session` if it is still the mapped session for its user, and
    /// close its queue.
    ///
    /// Returns `true` if the mapping was removed; a superseded or evicted
    /// session leaves the current mapping untouched.
    pub async fn unregister(&self, session: &Arc<SessionHandle>) -> bool {
        let (ack, done) = oneshot::channel();
        let command = Command::Unregister {
            session: Arc::clone(session),
            ack,
        };
        if self.commands.send(command).is_err() {
            let _ = session.close_queue();
            return false;
        }
        done.await.unwrap_or(false)
    }

    /// Enqueue `message` on its recipient's session without waiting for the
    /// socket.
    pub async fn route(&self, message: Message) -> RouteOutcome {
        let (ack, done) = oneshot::channel();
        if self.commands.send(Command::Route { message, ack }).is_err() {
            debug!("route after registry shutdown");
            return RouteOutcome::Offline;
        }
        done.await.unwrap_or(RouteOutcome::Offline)
    }

    /// Route `event` to each of `recipients` in turn.
    ///
    /// Each recipient is independent; a slow one does not affect the rest.
    pub async fn broadcast_to_many<I>(&self, recipients: I, event: &Event) -> BroadcastSummary
    where
        I: IntoIterator<Item = UserId>,
    {
        let mut summary = BroadcastSummary::default();
        for recipient in recipients {
            summary.record(self.route(Message::new(recipient, event.clone())).await);
        }
        summary
    }

    /// Whether `user_id` has a registered session.
    pub fn is_online(&self, user_id: UserId) -> bool {
        self.online.read().contains_key(&user_id)
    }

    /// Snapshot of online users.
    pub fn list_online(&self) -> HashSet<UserId> {
        self.online.read().keys().copied().collect()
    }

    /// Number of online users.
    pub fn online_count(&self) -> usize {
        self.online.read().len()
    }

    /// Close every session and stop the owning task. Idempotent.
    pub async fn shutdown(&self) {
        let (ack, done) = oneshot::channel();
        if self.commands.send(Command::Shutdown { ack }).is_ok() {
            let _ = done.await;
        }
    }

    /// Whether the owning task has stopped.
    pub fn is_shut_down(&self) -> bool {
        self.commands.is_closed()
    }
}

struct Owner {
    online: OnlineMap,
}

impl Owner {
    async fn run(self, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Register { session, ack } => {
                    self.register(session);
                    let _ = ack.send(());
                }
                Command::Unregister { session, ack } => {
                    let _ = ack.send(self.unregister(&session));
                }
                Command::Route { message, ack } => {
                    let _ = ack.send(self.route(message));
                }
                Command::Shutdown { ack } => {
                    self.close_all();
                    let _ = ack.send(());
                    break;
                }
            }
        }
        // every handle dropped without an explicit shutdown
        self.close_all();
        commands.close();
    }

    fn register(&self, session: Arc<SessionHandle>) {
        let user_id = session.user_id;
        let conn_id = session.id.clone();
        let previous = {
            let mut online = self.online.write();
            let previous = online.insert(user_id, session);
            record_active(online.len());
            previous
        };
        if let Some(previous) = previous {
            let _ = previous.close_queue();
            metrics::counter!(HUB_EVICTIONS_TOTAL, "reason" => "superseded").increment(1);
            info!(%user_id, %conn_id, superseded = %previous.id, "session replaced by newer connection");
        } else {
            debug!(%user_id, %conn_id, "session registered");
        }
    }

    fn unregister(&self, session: &Arc<SessionHandle>) -> bool {
        let _ = session.close_queue();
        let mut online = self.online.write();
        let owns_mapping = online
            .get(&session.user_id)
            .is_some_and(|current| current.id == session.id);
        if owns_mapping {
            let _ = online.remove(&session.user_id);
            record_active(online.len());
            debug!(user_id = %session.user_id, conn_id = %session.id, "session unregistered");
        }
        owns_mapping
    }

    fn route(&self, message: Message) -> RouteOutcome {
        let recipient = message.recipient_id;
        let kind = message.kind();
        let Some(session) = self.online.read().get(&recipient).cloned() else {
            metrics::counter!(HUB_MESSAGES_DROPPED_TOTAL, "reason" => "offline").increment(1);
            debug!(user_id = %recipient, kind, "recipient offline, dropped");
            return RouteOutcome::Offline;
        };

        match session.try_enqueue(message) {
            Enqueue::Enqueued => {
                metrics::counter!(HUB_MESSAGES_ROUTED_TOTAL, "kind" => kind).increment(1);
                RouteOutcome::Delivered
            }
            Enqueue::Full(_) => {
                warn!(user_id = %recipient, conn_id = %session.id, kind, "outbound queue full, evicting slow session");
                self.evict(&session, "queue_full");
                RouteOutcome::Evicted
            }
            Enqueue::Closed(_) => {
                debug!(user_id = %recipient, conn_id = %session.id, kind, "outbound queue already closed, removing stale session");
                self.evict(&session, "queue_closed");
                RouteOutcome::Evicted
            }
        }
    }

    fn evict(&self, session: &Arc<SessionHandle>, reason: &'static str) {
        let _ = session.close_queue();
        let mut online = self.online.write();
        if online
            .get(&session.user_id)
            .is_some_and(|current| current.id == session.id)
        {
            let _ = online.remove(&session.user_id);
            record_active(online.len());
        }
        metrics::counter!(HUB_EVICTIONS_TOTAL, "reason" => reason).increment(1);
        metrics::counter!(HUB_MESSAGES_DROPPED_TOTAL, "reason" => "evicted").increment(1);
    }

    fn close_all(&self) {
        let mut online = self.online.write();
        if online.is_empty() {
            return;
        }
        info!(sessions = online.len(), "closing all sessions");
        for session in online.values() {
            let _ = session.close_queue();
        }
        online.clear();
        record_active(0);
    }

}

#[allow(clippy::cast_precision_loss)]
fn record_active(len: usize) {
    metrics::gauge!(HUB_SESSIONS_ACTIVE).set(len as f64);
}
