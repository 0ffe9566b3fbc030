//! Top-level server wiring.
//!
//! [`Server`] owns every long-lived engine-side service — the container
//! service, the tick-driving game loop, and the subscription router that
//! turns published snapshots into per-connection WebSocket messages — and
//! drives them until shutdown. Admission (accepting sockets, authenticating
//! callers) is an external collaborator: whatever owns the listener calls
//! [`Server::ws_handler`]'s [`ConnectionHandler`](stormstack_ws::ConnectionHandler)
//! methods per connection.

use std::sync::Arc;

use stormstack_core::{ContainerConfig, ServerConfig};
use stormstack_ws::{ServerMessage, WsHandler};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::commands::{container_command_dispatcher, ContainerCommandDispatcher};
use crate::container::{shared_container_service, ContainerService, SharedContainerService};
use crate::game_loop::{GameLoop, GameLoopConfig};
use crate::resources::{shared_file_storage, SharedResourceStorage};
use crate::session::{shared_session_service, SharedSessionService};

/// A running StormStack server instance.
///
/// Construct with [`Server::new`], then drive it with [`Server::run`], which
/// blocks until the process receives a shutdown signal.
pub struct Server {
    config: ServerConfig,
    containers: SharedContainerService,
    sessions: SharedSessionService,
    resources: SharedResourceStorage,
    ws_handler: Arc<WsHandler<ContainerService, ContainerCommandDispatcher>>,
}

impl Server {
    /// Assemble a server from configuration. Containers are created on
    /// demand (via [`ContainerService::create_container`]); this only wires
    /// the long-lived services together.
    ///
    /// # Errors
    ///
    /// Currently infallible; returns `Result` to leave room for resource
    /// storage or session-store initialization that can fail without
    /// breaking callers.
    pub fn new(config: ServerConfig) -> anyhow::Result<Self> {
        let containers = shared_container_service();
        let dispatcher = container_command_dispatcher(containers.clone());
        let ws_handler = Arc::new(WsHandler::with_dispatcher(containers.clone(), dispatcher));

        Ok(Self {
            config,
            containers,
            sessions: shared_session_service(),
            resources: shared_file_storage(),
            ws_handler,
        })
    }

    /// The container service backing this server.
    #[must_use]
    pub fn containers(&self) -> &SharedContainerService {
        &self.containers
    }

    /// The session service backing this server.
    #[must_use]
    pub fn sessions(&self) -> &SharedSessionService {
        &self.sessions
    }

    /// The resource storage backing this server.
    #[must_use]
    pub fn resources(&self) -> &SharedResourceStorage {
        &self.resources
    }

    /// The handler an external transport layer drives per connection.
    #[must_use]
    pub fn ws_handler(&self) -> &Arc<WsHandler<ContainerService, ContainerCommandDispatcher>> {
        &self.ws_handler
    }

    /// The default container configuration new containers should use unless
    /// a caller overrides it.
    #[must_use]
    pub fn container_defaults(&self) -> &ContainerConfig {
        &self.config.container_defaults
    }

    /// Run the game loop and subscription router until a shutdown signal is
    /// received (SIGINT, or `Ctrl+C` on platforms without signal handling).
    ///
    /// # Errors
    ///
    /// Returns an error if installing the `Ctrl+C` handler fails.
    pub async fn run(&self) -> anyhow::Result<()> {
        let shutdown = CancellationToken::new();
        let tick_rate_hz = self.config.container_defaults.tick_rate_hz;
        let game_loop_config = GameLoopConfig::default().with_tick_rate(tick_rate_hz);
        let (game_loop, snapshot_rx) = GameLoop::new(game_loop_config, self.containers.clone());

        let router_handle = spawn_router(
            self.ws_handler.clone(),
            self.containers.clone(),
            snapshot_rx,
            shutdown.clone(),
        );

        let loop_shutdown = shutdown.clone();
        let loop_handle: JoinHandle<()> = tokio::spawn(async move {
            game_loop.run(loop_shutdown).await;
        });

        info!(
            "StormStack server running (admission at {}, {} Hz tick rate)",
            self.config.bind_addr, tick_rate_hz
        );

        tokio::signal::ctrl_c().await?;
        info!("Shutdown signal received");
        shutdown.cancel();

        loop_handle.await?;
        router_handle.await?;
        Ok(())
    }
}

/// Drain published `(match, snapshot)` pairs and deliver each to its
/// match's subscribers, choosing a full snapshot or a delta depending on
/// how far behind each subscriber's cursor has fallen. A subscriber whose
/// cursor has fallen further behind than the container's retention window
/// allows is reset with a fresh full snapshot rather than dropped:
/// `Overloaded` is reserved for a subscriber connection transport delivery
/// itself is failing on, a distinct condition this router does not yet
/// detect.
///
/// A subscriber scoped to one player (`SubscriberCursor::player_filter`)
/// only sees entities with no `OWNER` component or whose owner matches,
/// per [`stormstack_core::EntitySnapshot::visible_to`].
fn spawn_router(
    handler: Arc<WsHandler<ContainerService, ContainerCommandDispatcher>>,
    containers: SharedContainerService,
    mut snapshot_rx: tokio::sync::broadcast::Receiver<(stormstack_core::MatchId, stormstack_core::WorldSnapshot)>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => break,

                recv = snapshot_rx.recv() => {
                    match recv {
                        Ok((match_id, snapshot)) => deliver(&handler, &containers, match_id, &snapshot),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("router lagged, skipped {} snapshot broadcasts", skipped);
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }
        debug!("subscription router shut down");
    })
}

/// Decide, per subscriber, whether to send a full snapshot or a delta since
/// their last delivered tick. A cursor that has fallen further behind than
/// the container's retention window resets with a full snapshot exactly
/// like a first-time subscriber, rather than being dropped.
fn deliver(
    handler: &WsHandler<ContainerService, ContainerCommandDispatcher>,
    containers: &SharedContainerService,
    match_id: stormstack_core::MatchId,
    snapshot: &stormstack_core::WorldSnapshot,
) {
    let Some(container) = containers.container_for_match(match_id) else {
        return;
    };
    let retention_ticks = container.config().snapshot_retention_ticks;

    let subscriptions = handler.subscription_manager();
    let connections = handler.connection_manager();

    for conn_id in subscriptions.get_match_subscribers(match_id) {
        let Some(cursor) = subscriptions.cursor(conn_id, match_id) else {
            continue;
        };

        let message = delivery_message(
            &container,
            match_id,
            snapshot,
            cursor.last_delivered_tick,
            cursor.player_filter,
            retention_ticks,
        );

        if connections.send(conn_id, message).is_ok() {
            subscriptions.mark_delivered(conn_id, match_id, snapshot.tick);
        }
    }
}

/// Choose the message a single subscriber's cursor warrants: a full
/// snapshot for a first delivery or a stale cursor, a delta otherwise.
/// Scopes the result to `player_filter` when the subscriber is bound to
/// one player.
fn delivery_message(
    container: &crate::container::Container,
    match_id: stormstack_core::MatchId,
    snapshot: &stormstack_core::WorldSnapshot,
    last_delivered_tick: Option<u64>,
    player_filter: Option<stormstack_core::PlayerId>,
    retention_ticks: u64,
) -> ServerMessage {
    let full_snapshot = || ServerMessage::Snapshot {
        match_id,
        snapshot: snapshot.filtered_for_player(player_filter),
    };

    match last_delivered_tick {
        None => full_snapshot(),
        Some(last) if snapshot.tick.saturating_sub(last) > retention_ticks => full_snapshot(),
        Some(last) => match container.delta_since(match_id, last) {
            Ok(delta) => ServerMessage::Delta {
                match_id,
                delta: delta
                    .filtered_for_player(player_filter, |e| container.entity_owner(match_id, e)),
            },
            Err(_) => full_snapshot(),
        },
    }
}
