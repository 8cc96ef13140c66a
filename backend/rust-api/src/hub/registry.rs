use std::collections::{BTreeSet, HashMap, HashSet};

use axum::extract::ws::Utf8Bytes;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_DROPPED_TOTAL, WS_MESSAGES_SENT_TOTAL};
use crate::models::message::ParticipantPresence;
use crate::models::{MessageType, OutboundMessage, Principal};

pub type ConnectionId = Uuid;

/// Registry-side handle of one client connection.
///
/// The registry holds the only sender of the outbound queue, so removing the
/// connection from the registry closes the queue and ends its write loop.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub principal: Principal,
    pub session_id: Option<String>,
    sender: mpsc::Sender<Utf8Bytes>,
}

impl Connection {
    pub fn new(
        principal: Principal,
        session_id: Option<String>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<Utf8Bytes>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let connection = Self {
            id: Uuid::new_v4(),
            principal,
            session_id,
            sender,
        };
        (connection, receiver)
    }

    pub fn user_id(&self) -> &str {
        &self.principal.user_id
    }

    fn presence(&self) -> ParticipantPresence {
        ParticipantPresence {
            user_id: self.principal.user_id.clone(),
            display_name: self.principal.display_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum DropReason {
    QueueFull,
    Closed,
}

impl DropReason {
    fn as_str(&self) -> &'static str {
        match self {
            DropReason::QueueFull => "queue_full",
            DropReason::Closed => "closed",
        }
    }
}

#[derive(Default)]
struct Registry {
    connections: HashMap<ConnectionId, Connection>,
    sessions: HashMap<String, HashSet<ConnectionId>>,
}

impl Registry {
    fn index(&mut self, id: ConnectionId, session_id: &str) {
        self.sessions
            .entry(session_id.to_string())
            .or_default()
            .insert(id);
    }

    fn unindex(&mut self, id: ConnectionId, session_id: &str) {
        if let Some(members) = self.sessions.get_mut(session_id) {
            members.remove(&id);
            if members.is_empty() {
                self.sessions.remove(session_id);
            }
        }
    }

    fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        let connection = self.connections.remove(&id)?;
        if let Some(session_id) = connection.session_id.as_deref() {
            self.unindex(id, session_id);
        }
        WS_CONNECTIONS_ACTIVE.set(self.connections.len() as i64);
        Some(connection)
    }

    fn session_members(&self, session_id: &str) -> Vec<ConnectionId> {
        self.sessions
            .get(session_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Enqueues `payload` to every target without waiting. Targets whose queue
    /// is full or closed are removed from both indices.
    fn deliver(&mut self, targets: Vec<ConnectionId>, payload: &Utf8Bytes, scope: &str) -> usize {
        let mut delivered = 0;
        let mut dropped = Vec::new();

        for id in targets {
            let Some(connection) = self.connections.get(&id) else {
                continue;
            };
            match connection.sender.try_send(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => dropped.push((id, DropReason::QueueFull)),
                Err(TrySendError::Closed(_)) => dropped.push((id, DropReason::Closed)),
            }
        }

        for (id, reason) in dropped {
            if let Some(connection) = self.remove(id) {
                tracing::warn!(
                    connection_id = %id,
                    user_id = %connection.user_id(),
                    session_id = ?connection.session_id,
                    reason = reason.as_str(),
                    "Dropping slow or dead connection"
                );
                WS_CONNECTIONS_DROPPED_TOTAL
                    .with_label_values(&[reason.as_str()])
                    .inc();
            }
        }

        WS_MESSAGES_SENT_TOTAL
            .with_label_values(&[scope])
            .inc_by(delivered as u64);
        delivered
    }

    fn announce(&mut self, kind: MessageType, session_id: &str, who: ParticipantPresence, skip: ConnectionId) {
        let message = OutboundMessage::new(kind, Some(session_id), who);
        let payload = match message.encode() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Failed to encode presence message: {}", e);
                return;
            }
        };
        let targets = self
            .session_members(session_id)
            .into_iter()
            .filter(|id| *id != skip)
            .collect();
        self.deliver(targets, &payload, "presence");
    }
}

/// Owns connection membership and performs session- and user-scoped fan-out.
///
/// Every operation runs under one exclusive lock, so register, unregister and
/// broadcast never observe a half-updated index. Delivery never waits on a
/// client: a full outbound queue gets the connection dropped instead.
#[derive(Default)]
pub struct Hub {
    inner: Mutex<Registry>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the connection and announces it to the rest of its session.
    /// The same user may hold several independent connections.
    pub async fn register(&self, connection: Connection) -> ConnectionId {
        let id = connection.id;
        let session_id = connection.session_id.clone();
        let presence = connection.presence();

        let mut registry = self.inner.lock().await;
        registry.connections.insert(id, connection);
        if let Some(session_id) = session_id.as_deref() {
            registry.index(id, session_id);
            registry.announce(MessageType::ParticipantJoin, session_id, presence, id);
        }
        WS_CONNECTIONS_ACTIVE.set(registry.connections.len() as i64);

        tracing::info!(connection_id = %id, session_id = ?session_id, "Client registered");
        id
    }

    /// Removes the connection, closing its outbound queue. Returns `false` if it
    /// was already gone.
    pub async fn unregister(&self, id: ConnectionId) -> bool {
        let mut registry = self.inner.lock().await;
        let Some(connection) = registry.remove(id) else {
            return false;
        };
        if let Some(session_id) = connection.session_id.as_deref() {
            registry.announce(
                MessageType::ParticipantLeave,
                session_id,
                connection.presence(),
                id,
            );
        }
        tracing::info!(
            connection_id = %id,
            user_id = %connection.user_id(),
            session_id = ?connection.session_id,
            "Client unregistered"
        );
        // dropping `connection` drops the sender and closes the queue
        true
    }

    /// Moves a connection under `session_id`, announcing it there.
    pub async fn assign_session(&self, id: ConnectionId, session_id: &str) -> bool {
        let mut registry = self.inner.lock().await;
        let Some(connection) = registry.connections.get_mut(&id) else {
            return false;
        };
        let previous = connection.session_id.replace(session_id.to_string());
        let presence = connection.presence();

        match previous.as_deref() {
            Some(previous) if previous == session_id => return true,
            Some(previous) => {
                registry.unindex(id, previous);
                registry.announce(MessageType::ParticipantLeave, previous, presence.clone(), id);
            }
            None => {}
        }
        registry.index(id, session_id);
        registry.announce(MessageType::ParticipantJoin, session_id, presence, id);
        true
    }

    pub async fn broadcast_to_session<T: Serialize>(
        &self,
        session_id: &str,
        message: &OutboundMessage<T>,
    ) -> usize {
        let Some(payload) = encode(message) else {
            return 0;
        };
        let mut registry = self.inner.lock().await;
        let targets = registry.session_members(session_id);
        registry.deliver(targets, &payload, "session")
    }

    pub async fn broadcast_to_user<T: Serialize>(
        &self,
        user_id: &str,
        message: &OutboundMessage<T>,
    ) -> usize {
        let Some(payload) = encode(message) else {
            return 0;
        };
        let mut registry = self.inner.lock().await;
        let targets = registry
            .connections
            .values()
            .filter(|c| c.user_id() == user_id)
            .map(|c| c.id)
            .collect();
        registry.deliver(targets, &payload, "user")
    }

    pub async fn send_to_connection<T: Serialize>(
        &self,
        id: ConnectionId,
        message: &OutboundMessage<T>,
    ) -> bool {
        let Some(payload) = encode(message) else {
            return false;
        };
        let mut registry = self.inner.lock().await;
        registry.deliver(vec![id], &payload, "direct") == 1
    }

    pub async fn session_client_count(&self, session_id: &str) -> usize {
        let registry = self.inner.lock().await;
        registry.sessions.get(session_id).map_or(0, HashSet::len)
    }

    /// Distinct user ids connected to the session, sorted.
    pub async fn connected_user_ids(&self, session_id: &str) -> Vec<String> {
        let registry = self.inner.lock().await;
        let users: BTreeSet<String> = registry
            .sessions
            .get(session_id)
            .into_iter()
            .flatten()
            .filter_map(|id| registry.connections.get(id))
            .map(|c| c.user_id().to_string())
            .collect();
        users.into_iter().collect()
    }

    pub async fn is_user_connected(&self, session_id: &str, user_id: &str) -> bool {
        let registry = self.inner.lock().await;
        registry
            .sessions
            .get(session_id)
            .into_iter()
            .flatten()
            .filter_map(|id| registry.connections.get(id))
            .any(|c| c.user_id() == user_id)
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.lock().await.connections.len()
    }
}

fn encode<T: Serialize>(message: &OutboundMessage<T>) -> Option<Utf8Bytes> {
    match message.encode() {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::error!(kind = ?message.kind, "Failed to encode outbound message: {}", e);
            None
        }
    }
}
