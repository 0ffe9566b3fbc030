//! Game loop implementation for tick-based simulation.
//!
//! The game loop runs at a configurable tick rate, advancing all containers
//! and broadcasting world snapshots to subscribed WebSocket connections.
//!
//! # Example
//!
//! ```rust,ignore
//! use stormstack_server::{GameLoop, GameLoopConfig, shared_container_service};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let containers = shared_container_service();
//!     let config = GameLoopConfig::default(); // 60 ticks/sec
//!     let (game_loop, mut rx) = GameLoop::new(config, containers);
//!
//!     let shutdown = CancellationToken::new();
//!
//!     // Run the game loop in a background task
//!     let shutdown_clone = shutdown.clone();
//!     tokio::spawn(async move {
//!         game_loop.run(shutdown_clone).await;
//!     });
//!
//!     // Receive snapshots
//!     while let Ok((match_id, snapshot)) = rx.recv().await {
//!         println!("Match {:?} at tick {}", match_id, snapshot.tick);
//!     }
//! }
//! ```

use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use stormstack_core::{MatchId, WorldSnapshot};

use crate::SharedContainerService;

/// Configuration for the game loop.
#[derive(Debug, Clone)]
pub struct GameLoopConfig {
    /// Target tick rate in ticks per second.
    ///
    /// Default is 60 ticks/sec (~16.67ms per tick).
    pub tick_rate: u32,

    /// Size of the broadcast channel for snapshots.
    ///
    /// Default is 256. If receivers fall behind by more than this,
    /// they will start missing snapshots.
    pub channel_capacity: usize,
}

impl Default for GameLoopConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            channel_capacity: 256,
        }
    }
}

impl GameLoopConfig {
    /// Create a config with a specific tick rate.
    #[must_use]
    pub fn with_tick_rate(mut self, tick_rate: u32) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    /// Create a config with a specific channel capacity.
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Get the duration of a single tick.
    #[must_use]
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate))
    }
}

/// The main game loop that drives the simulation.
///
/// The game loop:
/// 1. Runs at a configurable tick rate (default 60 ticks/sec)
/// 2. Iterates through all containers and calls `tick(delta_time)`
/// 3. For each active match, generates a snapshot
/// 4. Broadcasts snapshots to all subscribed receivers
/// 5. Supports graceful shutdown via `CancellationToken`
pub struct GameLoop {
    config: GameLoopConfig,
    containers: SharedContainerService,
    snapshot_tx: broadcast::Sender<(MatchId, WorldSnapshot)>,
}

impl GameLoop {
    /// Create a new game loop with the given configuration.
    ///
    /// Returns the game loop and a receiver for snapshots.
    ///
    /// # Arguments
    ///
    /// * `config` - Game loop configuration
    /// * `containers` - Shared container service to tick
    #[must_use]
    pub fn new(
        config: GameLoopConfig,
        containers: SharedContainerService,
    ) -> (Self, broadcast::Receiver<(MatchId, WorldSnapshot)>) {
        let (snapshot_tx, snapshot_rx) = broadcast::channel(config.channel_capacity);

        let game_loop = Self {
            config,
            containers,
            snapshot_tx,
        };

        (game_loop, snapshot_rx)
    }

    /// Subscribe to snapshot broadcasts.
    ///
    /// Returns a new receiver that will receive all future snapshots.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<(MatchId, WorldSnapshot)> {
        self.snapshot_tx.subscribe()
    }

    /// Get the game loop configuration.
    #[must_use]
    pub fn config(&self) -> &GameLoopConfig {
        &self.config
    }

    /// Get the number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.snapshot_tx.receiver_count()
    }

    /// Run the game loop until shutdown is signaled.
    ///
    /// This method will block until the cancellation token is cancelled.
    ///
    /// # Arguments
    ///
    /// * `shutdown` - Cancellation token to signal graceful shutdown
    pub async fn run(&self, shutdown: CancellationToken) {
        let tick_duration = self.config.tick_duration();
        let mut interval = tokio::time::interval(tick_duration);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        debug!(
            "Game loop starting with tick rate {} Hz ({}ms per tick)",
            self.config.tick_rate,
            tick_duration.as_millis()
        );

        let mut last_tick = Instant::now();
        let mut tick_count: u64 = 0;

        loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => {
                    debug!("Game loop received shutdown signal after {} ticks", tick_count);
                    break;
                }

                _ = interval.tick() => {
                    let now = Instant::now();
                    let delta_time = now.duration_since(last_tick).as_secs_f64();
                    last_tick = now;

                    self.tick(delta_time).await;
                    tick_count += 1;

                    trace!("Game loop tick {} completed (dt: {:.4}s)", tick_count, delta_time);
                }
            }
        }

        debug!("Game loop shut down gracefully");
    }

    /// Execute a single tick of the game loop.
    ///
    /// This method:
    /// 1. Ticks all containers with the given delta time
    /// 2. Generates snapshots for all active matches
    /// 3. Broadcasts snapshots to subscribers
    async fn tick(&self, delta_time: f64) {
        self.containers.tick_all(delta_time);
        self.broadcast_snapshots();
    }

    /// Generate and broadcast snapshots for all active matches.
    fn broadcast_snapshots(&self) {
        // Skip if no subscribers
        if self.snapshot_tx.receiver_count() == 0 {
            return;
        }

        for container in self.containers.all_containers() {
            for match_summary in container.active_matches() {
                let snapshot = match container.snapshot(match_summary.id) {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(
                            "Failed to generate snapshot for match {:?}: {}",
                            match_summary.id, e
                        );
                        continue;
                    }
                };

                if let Err(e) = self.snapshot_tx.send((match_summary.id, snapshot)) {
                    trace!(
                        "No receivers for snapshot (match {:?}): {}",
                        match_summary.id,
                        e
                    );
                }
            }
        }
    }
}

impl std::fmt::Debug for GameLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameLoop")
            .field("config", &self.config)
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
