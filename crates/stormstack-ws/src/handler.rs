//! WebSocket connection handler.

use crate::connection::{ConnectionManager, SharedConnectionManager};
use crate::messages::{ClientMessage, Command, ServerMessage};
use crate::subscription::{shared_subscriptions, SharedSubscriptionManager};
use std::sync::Arc;
use stormstack_core::{ConnectionId, MatchId, Result};
use tracing::{debug, error, info};

/// WebSocket connection handler trait.
pub trait ConnectionHandler: Send + Sync {
    /// Handle new connection.
    fn on_connect(&self, conn_id: ConnectionId) -> Result<()>;

    /// Handle message from client.
    fn on_message(&self, conn_id: ConnectionId, message: ClientMessage) -> Result<()>;

    /// Handle connection close.
    fn on_disconnect(&self, conn_id: ConnectionId);

    /// Send message to connection.
    fn send(&self, conn_id: ConnectionId, message: ServerMessage) -> Result<()>;

    /// Broadcast to all subscribers of a match.
    fn broadcast_to_match(&self, match_id: MatchId, message: ServerMessage) -> Result<()>;
}

/// Match state provider trait.
///
/// Implementations provide match state (snapshots) when clients subscribe.
pub trait MatchStateProvider: Send + Sync {
    /// Get current snapshot for a match.
    fn get_snapshot(&self, match_id: MatchId) -> Result<stormstack_core::WorldSnapshot>;

    /// Check if match exists.
    fn match_exists(&self, match_id: MatchId) -> bool;
}

/// Submits ingress commands to a match's command queue.
///
/// The engine-side implementation (a container's command queue) validates
/// the command against its owning module's declared schema and stages it
/// for the requested tick; it never executes the command inline.
pub trait CommandDispatcher: Send + Sync {
    /// Submit `command` to `match_id`'s queue.
    fn dispatch(&self, match_id: MatchId, command: Command) -> Result<()>;
}

/// A dispatcher that accepts every command without forwarding it anywhere,
/// for handlers that are not wired to a running engine (e.g. tests).
#[derive(Debug, Default)]
pub struct NullCommandDispatcher;

impl CommandDispatcher for NullCommandDispatcher {
    fn dispatch(&self, _match_id: MatchId, _command: Command) -> Result<()> {
        Ok(())
    }
}

/// Default WebSocket handler implementation.
pub struct WsHandler<M: MatchStateProvider, D: CommandDispatcher = NullCommandDispatcher> {
    /// Connection manager.
    connections: SharedConnectionManager,
    /// Subscription manager.
    subscriptions: SharedSubscriptionManager,
    /// Match state provider.
    match_provider: Arc<M>,
    /// Command dispatcher.
    dispatcher: Arc<D>,
}

impl<M: MatchStateProvider + 'static> WsHandler<M, NullCommandDispatcher> {
    /// Create a new WebSocket handler with no command dispatch wired up.
    pub fn new(match_provider: Arc<M>) -> Self {
        Self::with_dispatcher(match_provider, Arc::new(NullCommandDispatcher))
    }
}

impl<M: MatchStateProvider + 'static, D: CommandDispatcher + 'static> WsHandler<M, D> {
    /// Create a new WebSocket handler with a command dispatcher.
    pub fn with_dispatcher(match_provider: Arc<M>, dispatcher: Arc<D>) -> Self {
        let subscriptions = shared_subscriptions();
        let connections = Arc::new(ConnectionManager::new(subscriptions.clone()));
        Self {
            connections,
            subscriptions,
            match_provider,
            dispatcher,
        }
    }

    /// Get the connection manager.
    pub fn connection_manager(&self) -> &SharedConnectionManager {
        &self.connections
    }

    /// Get the subscription manager.
    pub fn subscription_manager(&self) -> &SharedSubscriptionManager {
        &self.subscriptions
    }

    /// Handle subscribe message.
    fn handle_subscribe(
        &self,
        conn_id: ConnectionId,
        match_id: MatchId,
        player_filter: Option<stormstack_core::PlayerId>,
    ) -> Result<()> {
        // Check if match exists
        if !self.match_provider.match_exists(match_id) {
            self.send(
                conn_id,
                ServerMessage::Error {
                    code: "MATCH_NOT_FOUND".to_string(),
                    message: format!("Match {:?} not found", match_id),
                },
            )?;
            return Ok(());
        }

        // Subscribe
        self.connections.subscribe(conn_id, match_id, player_filter)?;

        // Send initial snapshot
        match self.match_provider.get_snapshot(match_id) {
            Ok(snapshot) => {
                self.send(conn_id, ServerMessage::Snapshot { match_id, snapshot })?;
                info!("Connection {:?} subscribed to match {:?}", conn_id, match_id);
            }
            Err(e) => {
                error!("Failed to get snapshot for match {:?}: {}", match_id, e);
                self.send(
                    conn_id,
                    ServerMessage::Error {
                        code: "SNAPSHOT_FAILED".to_string(),
                        message: "Failed to get match state".to_string(),
                    },
                )?;
            }
        }

        Ok(())
    }

    /// Handle unsubscribe message.
    fn handle_unsubscribe(&self, conn_id: ConnectionId, match_id: MatchId) -> Result<()> {
        self.connections.unsubscribe(conn_id, match_id);
        info!(
            "Connection {:?} unsubscribed from match {:?}",
            conn_id, match_id
        );
        Ok(())
    }

    /// Handle ping message.
    fn handle_ping(&self, conn_id: ConnectionId, timestamp: i64) -> Result<()> {
        let server_time = chrono::Utc::now().timestamp_millis();
        self.send(
            conn_id,
            ServerMessage::Pong {
                timestamp,
                server_time,
            },
        )
    }
}

impl<M: MatchStateProvider + 'static, D: CommandDispatcher + 'static> ConnectionHandler
    for WsHandler<M, D>
{
    fn on_connect(&self, conn_id: ConnectionId) -> Result<()> {
        debug!("New connection: {:?}", conn_id);
        Ok(())
    }

    fn on_message(&self, conn_id: ConnectionId, message: ClientMessage) -> Result<()> {
        match message {
            ClientMessage::Subscribe {
                match_id,
                player_filter,
            } => self.handle_subscribe(conn_id, match_id, player_filter),
            ClientMessage::Unsubscribe { match_id } => self.handle_unsubscribe(conn_id, match_id),
            ClientMessage::Ping { timestamp } => self.handle_ping(conn_id, timestamp),
            ClientMessage::Command { match_id, command } => {
                if let Err(e) = self.dispatcher.dispatch(match_id, command) {
                    error!("Command dispatch failed for match {:?}: {}", match_id, e);
                    self.send(
                        conn_id,
                        ServerMessage::Error {
                            code: "COMMAND_REJECTED".to_string(),
                            message: e.to_string(),
                        },
                    )?;
                }
                Ok(())
            }
        }
    }

    fn on_disconnect(&self, conn_id: ConnectionId) {
        self.connections.remove_connection(conn_id);
        debug!("Connection disconnected: {:?}", conn_id);
    }

    fn send(&self, conn_id: ConnectionId, message: ServerMessage) -> Result<()> {
        self.connections.send(conn_id, message)
    }

    fn broadcast_to_match(&self, match_id: MatchId, message: ServerMessage) -> Result<()> {
        self.connections.broadcast_to_match(match_id, message)
    }
}

/// Null match provider for testing.
#[cfg(test)]
pub struct NullMatchProvider;

#[cfg(test)]
impl MatchStateProvider for NullMatchProvider {
    fn get_snapshot(&self, _match_id: MatchId) -> Result<stormstack_core::WorldSnapshot> {
        Ok(stormstack_core::WorldSnapshot::new(0))
    }

    fn match_exists(&self, _match_id: MatchId) -> bool {
        true
    }
}
