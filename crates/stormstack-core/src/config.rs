//! Configuration types.
//!
//! Match- and container-level config are plain `serde`-deserializable
//! structs with defaults matching the numbers named throughout the
//! component store, command queue, sandbox, and snapshot sections.
//! `ServerConfig` loads from the process environment the way the rest of
//! this codebase's binaries do.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Match configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchConfig {
    /// Maximum players.
    pub max_players: u32,
    /// Tick rate (ticks per second).
    pub tick_rate: f64,
    /// Game mode.
    pub game_mode: String,
    /// Seed for this match's RNG. Two matches created with the same seed,
    /// module set, and command sequence produce identical tick-by-tick
    /// state; callers that don't care about reproducibility should leave
    /// this at its default and get an arbitrary-but-fixed value.
    #[serde(default)]
    pub seed: u64,
    /// Custom configuration.
    pub custom_config: serde_json::Value,
}

impl MatchConfig {
    /// Wall-clock duration of one tick at this config's `tick_rate`.
    #[must_use]
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate)
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            max_players: 10,
            tick_rate: 60.0,
            game_mode: "default".to_string(),
            seed: 0,
            custom_config: serde_json::Value::Null,
        }
    }
}

/// Per-module-invocation resource ceilings enforced by the sandbox.
///
/// Kept independent of `stormstack-wasm`'s own limit type so that
/// `stormstack-core` has no dependency on the sandbox crate; the sandbox
/// constructs its `WasmResourceLimits` from this at module instantiation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceBudget {
    /// Instruction budget per invocation.
    pub max_fuel: u64,
    /// Memory ceiling per instance, in bytes.
    pub max_memory_bytes: usize,
    /// Wall-clock deadline per invocation, in milliseconds.
    pub epoch_deadline_ms: u64,
}

impl Default for ResourceBudget {
    fn default() -> Self {
        Self {
            max_fuel: 1_000_000,
            max_memory_bytes: 16 * 1024 * 1024,
            epoch_deadline_ms: 1_000,
        }
    }
}

/// Execution container configuration: tick cadence, resource budget,
/// command queue capacity, and snapshot retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Tick cadence in Hz for `start_auto`.
    pub tick_rate_hz: u32,
    /// Resource ceilings applied to every module instance in this container.
    pub resource_budget: ResourceBudget,
    /// Maximum number of commands a single match may hold pending per tick.
    pub command_queue_capacity: usize,
    /// Number of past ticks of change-log history retained for delta
    /// resumption before a reconnecting subscriber is forced back to a
    /// full snapshot.
    pub snapshot_retention_ticks: u64,
    /// Consecutive sandbox failures a single module may accrue in one
    /// match before it is disabled for that match's remaining lifetime.
    pub module_failure_budget: u32,
}

impl ContainerConfig {
    /// Wall-clock duration of one tick at this config's cadence.
    #[must_use]
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz))
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 60,
            resource_budget: ResourceBudget::default(),
            command_queue_capacity: 10_000,
            snapshot_retention_ticks: 100,
            module_failure_budget: 8,
        }
    }
}

/// Top-level server configuration, loaded from the process environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the server binds its admission surface to.
    pub bind_addr: String,
    /// Default configuration applied to newly created containers.
    pub container_defaults: ContainerConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to
    /// documented defaults for anything unset.
    ///
    /// - `STORMSTACK_BIND_ADDR` (default `127.0.0.1:7777`)
    /// - `STORMSTACK_TICK_RATE_HZ` (default `60`)
    #[must_use]
    pub fn from_env() -> Self {
        let bind_addr =
            env::var("STORMSTACK_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:7777".to_string());
        let tick_rate_hz = env::var("STORMSTACK_TICK_RATE_HZ")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);

        Self {
            bind_addr,
            container_defaults: ContainerConfig {
                tick_rate_hz,
                ..ContainerConfig::default()
            },
        }
    }
}
