//! WebSocket message types.

use serde::{Deserialize, Serialize};
use stormstack_core::{MatchId, PlayerId, WorldDelta, WorldSnapshot};

/// Client to server message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Subscribe to match updates, optionally scoped to one player's
    /// entities.
    Subscribe {
        /// Match to subscribe to.
        match_id: MatchId,
        /// Restrict the stream to entities owned by this player.
        #[serde(default)]
        player_filter: Option<PlayerId>,
    },
    /// Unsubscribe from match updates.
    Unsubscribe {
        /// Match to unsubscribe from.
        match_id: MatchId,
    },
    /// Send command to match.
    Command {
        /// Target match.
        match_id: MatchId,
        /// Command to execute.
        command: Command,
    },
    /// Ping for keepalive.
    Ping {
        /// Client timestamp.
        timestamp: i64,
    },
}

/// Server to client message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Full world snapshot.
    Snapshot {
        /// Source match.
        match_id: MatchId,
        /// World state.
        snapshot: WorldSnapshot,
    },
    /// Delta update.
    Delta {
        /// Source match.
        match_id: MatchId,
        /// State changes.
        delta: WorldDelta,
    },
    /// Command result.
    CommandResult {
        /// Target match.
        match_id: MatchId,
        /// Execution result.
        result: CommandResult,
    },
    /// An in-tick error attributed to a module, surfaced on the match's
    /// observable error stream (never silently dropped, never propagated
    /// to other subscribers' cursors).
    MatchError {
        /// Source match.
        match_id: MatchId,
        /// Tick the error occurred on.
        tick: u64,
        /// Module the error is attributed to.
        module: String,
        /// Human-readable error description.
        message: String,
    },
    /// Error message.
    Error {
        /// Error code.
        code: String,
        /// Error description.
        message: String,
    },
    /// Subscriber fell far enough behind retention that the router dropped
    /// the connection rather than keep coalescing deltas.
    Overloaded {
        /// Match the subscriber was dropped from.
        match_id: MatchId,
    },
    /// Pong response.
    Pong {
        /// Original client timestamp.
        timestamp: i64,
        /// Server timestamp.
        server_time: i64,
    },
}

/// Game command from client, matching the ingress command envelope:
/// `{ match_id, target_tick?, command_name, payload }` (`match_id` is
/// carried by the enclosing [`ClientMessage::Command`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    /// Command name, matched against an installed module's declared
    /// commands.
    pub command_name: String,
    /// Tick the command should take effect on. Defaults to the next tick
    /// when omitted.
    #[serde(default)]
    pub target_tick: Option<u64>,
    /// Command payload, validated against the handling module's declared
    /// schema.
    pub payload: serde_json::Value,
}

/// Command execution result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// Whether command succeeded.
    pub success: bool,
    /// Command identifier.
    pub command_id: String,
    /// Tick when executed (if successful).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_tick: Option<u64>,
    /// Error message (if failed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_message_serialize() {
        let msg = ClientMessage::Subscribe {
            match_id: MatchId::new(),
            player_filter: None,
        };
        let json = serde_json::to_string(&msg).expect("serialize");
        assert!(json.contains("\"type\":\"Subscribe\""));
    }

    #[test]
    fn client_message_subscribe_with_player_filter() {
        let player = PlayerId::new();
        let msg = ClientMessage::Subscribe {
            match_id: MatchId::new(),
            player_filter: Some(player),
        };
        let json = serde_json::to_string(&msg).expect("serialize");
        let parsed: ClientMessage = serde_json::from_str(&json).expect("deserialize");
        match parsed {
            ClientMessage::Subscribe { player_filter, .. } => {
                assert_eq!(player_filter, Some(player));
            }
            _ => panic!("expected subscribe"),
        }
    }

    #[test]
    fn subscribe_without_player_filter_field_defaults_to_none() {
        let json = serde_json::json!({
            "type": "Subscribe",
            "match_id": MatchId::new(),
        });
        let parsed: ClientMessage = serde_json::from_value(json).expect("deserialize");
        match parsed {
            ClientMessage::Subscribe { player_filter, .. } => assert!(player_filter.is_none()),
            _ => panic!("expected subscribe"),
        }
    }

    #[test]
    fn server_message_serialize() {
        let msg = ServerMessage::Error {
            code: "NOT_FOUND".to_string(),
            message: "Match not found".to_string(),
        };
        let json = serde_json::to_string(&msg).expect("serialize");
        assert!(json.contains("\"type\":\"Error\""));
    }

    #[test]
    fn match_error_serialize() {
        let msg = ServerMessage::MatchError {
            match_id: MatchId::new(),
            tick: 12,
            module: "combat".to_string(),
            message: "fuel exhausted".to_string(),
        };
        let json = serde_json::to_string(&msg).expect("serialize");
        assert!(json.contains("\"type\":\"MatchError\""));
    }

    #[test]
    fn command_result_success() {
        let result = CommandResult {
            success: true,
            command_id: "cmd-1".to_string(),
            executed_tick: Some(100),
            error: None,
        };
        let json = serde_json::to_string(&result).expect("serialize");
        assert!(!json.contains("error"));
    }

    #[test]
    fn command_envelope_roundtrip() {
        let cmd = Command {
            command_name: "spawn_entity".to_string(),
            target_tick: Some(42),
            payload: serde_json::json!({"entity_type": 1}),
        };
        let json = serde_json::to_string(&cmd).expect("serialize");
        let parsed: Command = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed.command_name, "spawn_entity");
        assert_eq!(parsed.target_tick, Some(42));
    }
}
