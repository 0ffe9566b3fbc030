//! Subscription management for WebSocket connections.

use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use stormstack_core::{ConnectionId, MatchId, PlayerId};
use tracing::{debug, trace};

/// Manages subscriptions between connections and matches.
///
/// Thread-safe subscription tracker using DashMap for concurrent access.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    /// Map of match ID to set of subscribed connection IDs.
    match_subscribers: DashMap<MatchId, DashSet<ConnectionId>>,
    /// Map of connection ID to set of subscribed match IDs.
    connection_matches: DashMap<ConnectionId, DashSet<MatchId>>,
    /// Player filter and delivery cursor for each (connection, match) pair.
    /// Absent entries mean "no filter, no prior delivery" — a fresh
    /// subscriber gets a full snapshot rather than a delta.
    cursors: DashMap<(ConnectionId, MatchId), SubscriberCursor>,
}

/// Per-subscriber delivery state the router consults each tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscriberCursor {
    /// Restrict the stream to entities owned by this player, if set.
    pub player_filter: Option<PlayerId>,
    /// Tick of the last snapshot or delta this subscriber received.
    pub last_delivered_tick: Option<u64>,
}

impl SubscriptionManager {
    /// Create a new subscription manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a connection to a match, optionally scoped to one player's
    /// entities. Re-subscribing replaces the stored player filter and resets
    /// the delivery cursor, so the next delivery is a full snapshot.
    pub fn subscribe(&self, conn_id: ConnectionId, match_id: MatchId, player_filter: Option<PlayerId>) {
        // Add to match -> connections map
        self.match_subscribers
            .entry(match_id)
            .or_default()
            .insert(conn_id);

        // Add to connection -> matches map
        self.connection_matches
            .entry(conn_id)
            .or_default()
            .insert(match_id);

        self.cursors.insert(
            (conn_id, match_id),
            SubscriberCursor {
                player_filter,
                last_delivered_tick: None,
            },
        );

        debug!("Connection {:?} subscribed to match {:?}", conn_id, match_id);
    }

    /// Unsubscribe a connection from a match.
    pub fn unsubscribe(&self, conn_id: ConnectionId, match_id: MatchId) {
        // Remove from match -> connections map
        if let Some(subscribers) = self.match_subscribers.get(&match_id) {
            subscribers.remove(&conn_id);
        }

        // Remove from connection -> matches map
        if let Some(matches) = self.connection_matches.get(&conn_id) {
            matches.remove(&match_id);
        }

        self.cursors.remove(&(conn_id, match_id));

        debug!(
            "Connection {:?} unsubscribed from match {:?}",
            conn_id, match_id
        );
    }

    /// Remove all subscriptions for a connection.
    pub fn remove_connection(&self, conn_id: ConnectionId) {
        // Get all matches this connection was subscribed to
        if let Some((_, matches)) = self.connection_matches.remove(&conn_id) {
            for match_id in matches.iter() {
                if let Some(subscribers) = self.match_subscribers.get(&*match_id) {
                    subscribers.remove(&conn_id);
                }
                self.cursors.remove(&(conn_id, *match_id));
            }
        }

        trace!("Removed all subscriptions for connection {:?}", conn_id);
    }

    /// Current cursor for a (connection, match) pair, if subscribed.
    #[must_use]
    pub fn cursor(&self, conn_id: ConnectionId, match_id: MatchId) -> Option<SubscriberCursor> {
        self.cursors.get(&(conn_id, match_id)).map(|c| *c)
    }

    /// Record that a subscriber was just delivered state as of `tick`.
    pub fn mark_delivered(&self, conn_id: ConnectionId, match_id: MatchId, tick: u64) {
        if let Some(mut cursor) = self.cursors.get_mut(&(conn_id, match_id)) {
            cursor.last_delivered_tick = Some(tick);
        }
    }

    /// Get all connections subscribed to a match.
    pub fn get_match_subscribers(&self, match_id: MatchId) -> Vec<ConnectionId> {
        self.match_subscribers
            .get(&match_id)
            .map(|set| set.iter().map(|c| *c).collect())
            .unwrap_or_default()
    }

    /// Get all matches a connection is subscribed to.
    pub fn get_connection_subscriptions(&self, conn_id: ConnectionId) -> Vec<MatchId> {
        self.connection_matches
            .get(&conn_id)
            .map(|set| set.iter().map(|m| *m).collect())
            .unwrap_or_default()
    }

    /// Check if a connection is subscribed to a match.
    #[must_use]
    pub fn is_subscribed(&self, conn_id: ConnectionId, match_id: MatchId) -> bool {
        self.connection_matches
            .get(&conn_id)
            .is_some_and(|matches| matches.contains(&match_id))
    }

    /// Get the number of subscribers for a match.
    #[must_use]
    pub fn subscriber_count(&self, match_id: MatchId) -> usize {
        self.match_subscribers
            .get(&match_id)
            .map(|s| s.len())
            .unwrap_or(0)
    }

    /// Get the total number of active subscriptions.
    #[must_use]
    pub fn total_subscriptions(&self) -> usize {
        self.connection_matches
            .iter()
            .map(|entry| entry.value().len())
            .sum()
    }
}

/// Thread-safe wrapper for subscription manager.
pub type SharedSubscriptionManager = Arc<SubscriptionManager>;

/// Create a new shared subscription manager.
#[must_use]
pub fn shared_subscriptions() -> SharedSubscriptionManager {
    Arc::new(SubscriptionManager::new())
}
