//! WebSocket connection management.

use crate::messages::ServerMessage;
use crate::subscription::SharedSubscriptionManager;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use stormstack_core::{ConnectionId, MatchId, Result, StormError};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Type alias for outbound message sender.
pub type MessageSender = mpsc::UnboundedSender<ServerMessage>;

/// Connection state.
#[derive(Debug)]
pub struct ConnectionState {
    /// Connection identifier.
    pub id: ConnectionId,
    /// User ID if authenticated.
    pub user_id: Option<stormstack_core::UserId>,
    /// Tenant ID if authenticated.
    pub tenant_id: Option<stormstack_core::TenantId>,
    /// Outbound message channel.
    sender: MessageSender,
}

impl ConnectionState {
    /// Create new connection state.
    pub fn new(id: ConnectionId, sender: MessageSender) -> Self {
        Self {
            id,
            user_id: None,
            tenant_id: None,
            sender,
        }
    }

    /// Set authenticated user info.
    pub fn set_auth(
        &mut self,
        user_id: stormstack_core::UserId,
        tenant_id: stormstack_core::TenantId,
    ) {
        self.user_id = Some(user_id);
        self.tenant_id = Some(tenant_id);
    }

    /// Check if connection is authenticated.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Send message to this connection.
    pub fn send(&self, message: ServerMessage) -> Result<()> {
        self.sender
            .send(message)
            .map_err(|_| StormError::ConnectionClosed(self.id))
    }
}

/// Manages active WebSocket connections.
#[derive(Debug)]
pub struct ConnectionManager {
    /// Active connections by ID.
    connections: DashMap<ConnectionId, Arc<Mutex<ConnectionState>>>,
    /// Subscription manager.
    subscriptions: SharedSubscriptionManager,
}

impl ConnectionManager {
    /// Create a new connection manager.
    #[must_use]
    pub fn new(subscriptions: SharedSubscriptionManager) -> Self {
        Self {
            connections: DashMap::new(),
            subscriptions,
        }
    }

    /// Register a new connection.
    pub fn add_connection(&self, state: ConnectionState) -> ConnectionId {
        let id = state.id;
        self.connections.insert(id, Arc::new(Mutex::new(state)));
        debug!("Added connection {:?}", id);
        id
    }

    /// Remove a connection.
    pub fn remove_connection(&self, id: ConnectionId) {
        self.connections.remove(&id);
        self.subscriptions.remove_connection(id);
        debug!("Removed connection {:?}", id);
    }

    /// Get connection state.
    pub fn get_connection(&self, id: ConnectionId) -> Option<Arc<Mutex<ConnectionState>>> {
        self.connections.get(&id).map(|c| c.clone())
    }

    /// Send message to a specific connection.
    pub fn send(&self, conn_id: ConnectionId, message: ServerMessage) -> Result<()> {
        let conn = self
            .connections
            .get(&conn_id)
            .ok_or_else(|| StormError::ConnectionNotFound(conn_id))?;

        conn.lock().send(message)
    }

    /// Broadcast message to all subscribers of a match.
    pub fn broadcast_to_match(&self, match_id: MatchId, message: ServerMessage) -> Result<()> {
        let subscribers = self.subscriptions.get_match_subscribers(match_id);
        let mut send_count = 0;
        let mut error_count = 0;

        for conn_id in subscribers {
            if let Some(conn) = self.connections.get(&conn_id) {
                if conn.lock().send(message.clone()).is_ok() {
                    send_count += 1;
                } else {
                    error_count += 1;
                }
            }
        }

        trace!(
            "Broadcast to match {:?}: {} sent, {} errors",
            match_id,
            send_count,
            error_count
        );
        Ok(())
    }

    /// Subscribe connection to match, optionally scoped to one player's
    /// entities.
    pub fn subscribe(
        &self,
        conn_id: ConnectionId,
        match_id: MatchId,
        player_filter: Option<stormstack_core::PlayerId>,
    ) -> Result<()> {
        if !self.connections.contains_key(&conn_id) {
            return Err(StormError::ConnectionNotFound(conn_id));
        }
        self.subscriptions.subscribe(conn_id, match_id, player_filter);
        Ok(())
    }

    /// Unsubscribe connection from match.
    pub fn unsubscribe(&self, conn_id: ConnectionId, match_id: MatchId) {
        self.subscriptions.unsubscribe(conn_id, match_id);
    }

    /// Get count of active connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Check if connection exists.
    #[must_use]
    pub fn has_connection(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }
}

/// Thread-safe wrapper for connection manager.
pub type SharedConnectionManager = Arc<ConnectionManager>;

/// Create a new shared connection manager.
#[must_use]
pub fn shared_connection_manager(subscriptions: SharedSubscriptionManager) -> SharedConnectionManager {
    Arc::new(ConnectionManager::new(subscriptions))
}
