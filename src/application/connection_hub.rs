// Connection hub - Live client set, broadcast and unicast delivery
use crate::application::broadcast::Broadcast;
use crate::domain::command::Command;
use crate::domain::messages::ServerMessage;
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

pub type ConnectionId = Uuid;

/// Frames a writer may fall behind before the client counts as stalled
pub const OUTBOX_CAPACITY: usize = 256;

/// What the hub asks a socket writer to do
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Text(String),
    Close,
}

/// Receives every well-formed command from any connection
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, command: Command);
}

/// A new member of the live set plus the queue its writer drains
pub struct Connection {
    pub id: ConnectionId,
    pub outbox: mpsc::Receiver<Outbound>,
}

pub struct ConnectionHub {
    connections: DashMap<ConnectionId, mpsc::Sender<Outbound>>,
    port: u16,
    welcome_message: String,
}

impl ConnectionHub {
    pub fn new(port: u16, welcome_message: impl Into<String>) -> Self {
        Self {
            connections: DashMap::new(),
            port,
            welcome_message: welcome_message.into(),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Register a freshly upgraded socket. The welcome is queued before the
    /// connection becomes visible to broadcasts, so it is always first.
    pub fn accept(&self) -> Connection {
        let id = Uuid::new_v4();
        let (tx, outbox) = mpsc::channel(OUTBOX_CAPACITY);

        match serde_json::to_string(&ServerMessage::welcome(self.welcome_message.clone())) {
            Ok(welcome) => {
                let _ = tx.try_send(Outbound::Text(welcome));
            }
            Err(e) => tracing::error!("Failed to serialize welcome: {}", e),
        }

        self.connections.insert(id, tx);
        tracing::info!(
            "WebSocket opened [{}]. Total connections: {}",
            short_id(&id),
            self.connections.len()
        );

        Connection { id, outbox }
    }

    /// Handle one inbound text frame
    pub async fn on_message(&self, id: ConnectionId, raw: &str, handler: &dyn CommandHandler) {
        tracing::debug!("[{}] Received message: {}", short_id(&id), raw);

        match Command::parse(raw) {
            Ok(command) => handler.handle(command).await,
            Err(e) => {
                tracing::warn!("[{}] Invalid command: {}", short_id(&id), e);
                self.send_to(id, &ServerMessage::invalid_command(&e));
            }
        }
    }

    pub fn on_close(&self, id: ConnectionId, reason: Option<&str>) {
        if self.remove(id) {
            tracing::info!(
                "WebSocket closed [{}]: {}. Remaining: {}",
                short_id(&id),
                reason.unwrap_or("no reason"),
                self.connections.len()
            );
        }
    }

    pub fn on_error(&self, id: ConnectionId, error: &dyn std::fmt::Display) {
        if self.remove(id) {
            tracing::warn!("WebSocket error [{}]: {}", short_id(&id), error);
        }
    }

    /// Returns true only for the call that actually removed the connection
    pub fn remove(&self, id: ConnectionId) -> bool {
        self.connections.remove(&id).is_some()
    }

    /// Unicast; a full or closed queue drops the connection
    pub fn send_to<T: Serialize + ?Sized>(&self, id: ConnectionId, payload: &T) -> bool {
        let text = match serde_json::to_string(payload) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to serialize message: {}", e);
                return false;
            }
        };

        let sent = self
            .connections
            .get(&id)
            .map(|tx| tx.try_send(Outbound::Text(text)).is_ok())
            .unwrap_or(false);

        if !sent && self.remove(id) {
            tracing::warn!("Failed to send to client [{}], removed", short_id(&id));
        }
        sent
    }

    /// Deliver to a snapshot of the live set. Connections whose queue is
    /// closed or full are removed after the pass; one failure never stops
    /// delivery to the rest.
    pub fn broadcast(&self, text: String) -> usize {
        let targets: Vec<(ConnectionId, mpsc::Sender<Outbound>)> = self
            .connections
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, tx) in targets {
            if tx.try_send(Outbound::Text(text.clone())).is_ok() {
                delivered += 1;
            } else {
                dead.push(id);
            }
        }

        let removed = dead.into_iter().filter(|id| self.remove(*id)).count();
        if removed > 0 {
            tracing::warn!("Removed {} dead connections", removed);
        }
        delivered
    }

    /// Ask every writer to close its socket and empty the live set
    pub fn close_all(&self) {
        let ids: Vec<ConnectionId> = self.connections.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            // A full queue still ends the writer once the sender is dropped
            if let Some((_, tx)) = self.connections.remove(&id) {
                let _ = tx.try_send(Outbound::Close);
            }
        }
        tracing::info!("Closed all client connections");
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }
}

impl Broadcast for ConnectionHub {
    fn broadcast_text(&self, text: String) {
        self.broadcast(text);
    }
}

fn short_id(id: &ConnectionId) -> String {
    id.to_string()[..8].to_string()
}
