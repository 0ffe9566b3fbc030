//! State available to WASM host functions.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use stormstack_core::TenantId;
use stormstack_ecs::SharedStore;
use stormstack_wasm::{SandboxState, WasmMemoryLimiter, WasmResourceLimits};

/// Per-module capability grants, resolved from the installing module's
/// manifest. A host function checks the relevant flag before touching
/// store state or rate limits; a module with a capability unset sees the
/// same result as a module that never asked — a negative result code, not
/// a trap, so well-behaved modules can react to denial.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    /// Permits `entity_spawn`.
    pub can_spawn_entities: bool,
    /// Permits `entity_despawn`.
    pub can_despawn_entities: bool,
    /// Permits `component_set`.
    pub can_write_components: bool,
    /// Permits `query_entities`.
    pub can_query_entities: bool,
}

impl CapabilitySet {
    /// No capabilities granted.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Every capability granted — used in tests and for trusted built-in
    /// modules, never as a manifest default.
    #[must_use]
    pub fn full() -> Self {
        Self {
            can_spawn_entities: true,
            can_despawn_entities: true,
            can_write_components: true,
            can_query_entities: true,
        }
    }
}

/// State available to WASM host functions during execution.
///
/// This struct is the `wasmtime` `Store` data type and is accessible from
/// within host function implementations via `Caller::data`/`data_mut`.
pub struct WasmState {
    /// Tenant context for the executing module.
    pub tenant_id: TenantId,

    /// Current game tick.
    pub current_tick: u64,

    /// Delta time for current tick (seconds).
    pub delta_time: f64,

    /// Log buffer for module output.
    pub log_buffer: Vec<LogEntry>,

    /// Rate limit counters.
    pub rate_limits: RateLimits,

    /// Deterministic random number generator.
    pub rng: SmallRng,

    /// Reference to the match's component store (absent during unit tests
    /// that exercise only the non-ECS host functions).
    pub store: Option<SharedStore>,

    /// Capabilities granted to the executing module.
    pub capabilities: CapabilitySet,

    /// Serialized `{command_name, payload}` envelope for the command
    /// dispatch currently in flight, readable via `command_payload_*` host
    /// functions. Cleared after the handler invocation returns.
    pub pending_command: Option<Vec<u8>>,

    limiter: WasmMemoryLimiter,
}

/// Log entry from WASM module.
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Log level.
    pub level: LogLevel,
    /// Log message.
    pub message: String,
    /// Tick when logged.
    pub tick: u64,
}

/// Log level for WASM module output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level.
    Debug,
    /// Info level.
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

/// Rate limit counters for host functions.
#[derive(Debug, Default)]
pub struct RateLimits {
    /// Log calls this tick.
    pub log_calls: u32,
    /// Entity spawn calls this tick.
    pub spawn_calls: u32,
    /// Component write calls this tick.
    pub component_write_calls: u32,
    /// Query calls this tick.
    pub query_calls: u32,
}

impl RateLimits {
    /// Maximum log calls per tick.
    pub const MAX_LOG_CALLS: u32 = 100;
    /// Maximum spawn calls per tick.
    pub const MAX_SPAWN_CALLS: u32 = 100;
    /// Maximum component write calls per tick.
    pub const MAX_COMPONENT_WRITE_CALLS: u32 = 1000;
    /// Maximum query calls per tick.
    pub const MAX_QUERY_CALLS: u32 = 100;

    /// Reset all counters (called at start of each tick).
    pub fn reset(&mut self) {
        self.log_calls = 0;
        self.spawn_calls = 0;
        self.component_write_calls = 0;
        self.query_calls = 0;
    }

    /// Check if log rate limit exceeded.
    #[must_use]
    pub fn can_log(&self) -> bool {
        self.log_calls < Self::MAX_LOG_CALLS
    }

    /// Check if spawn rate limit exceeded.
    #[must_use]
    pub fn can_spawn(&self) -> bool {
        self.spawn_calls < Self::MAX_SPAWN_CALLS
    }

    /// Check if component write rate limit exceeded.
    #[must_use]
    pub fn can_write_component(&self) -> bool {
        self.component_write_calls < Self::MAX_COMPONENT_WRITE_CALLS
    }

    /// Check if query rate limit exceeded.
    #[must_use]
    pub fn can_query(&self) -> bool {
        self.query_calls < Self::MAX_QUERY_CALLS
    }
}

impl WasmState {
    /// Create new state for a tenant, with no capabilities and no store
    /// attached.
    #[must_use]
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            current_tick: 0,
            delta_time: 0.0,
            log_buffer: Vec::new(),
            rate_limits: RateLimits::default(),
            rng: SmallRng::seed_from_u64(0),
            store: None,
            capabilities: CapabilitySet::none(),
            pending_command: None,
            limiter: WasmMemoryLimiter::from_limits(&WasmResourceLimits::default()),
        }
    }

    /// Create state with a component store reference attached.
    #[must_use]
    pub fn with_store(tenant_id: TenantId, store: SharedStore) -> Self {
        Self {
            store: Some(store),
            ..Self::new(tenant_id)
        }
    }

    /// Grant this instance the given capability set.
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: CapabilitySet) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Size this instance's memory limiter from a sandbox's resource limits.
    #[must_use]
    pub fn with_limits(mut self, limits: WasmResourceLimits) -> Self {
        self.limiter = WasmMemoryLimiter::from_limits(&limits);
        self
    }

    /// Set the RNG seed for deterministic replay.
    pub fn set_rng_seed(&mut self, seed: u64) {
        self.rng = SmallRng::seed_from_u64(seed);
    }

    /// Stage a command for dispatch: the next invocation of the handler
    /// export can read `{command_name, payload}` back via the
    /// `command_payload_*` host functions.
    pub fn set_pending_command(&mut self, command_name: &str, payload: &serde_json::Value) {
        self.pending_command = serde_json::to_vec(&serde_json::json!({
            "command_name": command_name,
            "payload": payload,
        }))
        .ok();
    }

    /// Clear the staged command after the handler invocation returns.
    pub fn clear_pending_command(&mut self) {
        self.pending_command = None;
    }

    /// Prepare state for a new tick.
    pub fn begin_tick(&mut self, tick: u64, delta_time: f64) {
        self.current_tick = tick;
        self.delta_time = delta_time;
        self.rate_limits.reset();
    }

    /// Drain log buffer after tick.
    pub fn drain_logs(&mut self) -> Vec<LogEntry> {
        std::mem::take(&mut self.log_buffer)
    }

    /// Generate next random u32.
    pub fn random_u32(&mut self) -> u32 {
        self.rng.random()
    }

    /// Generate next random f32 in [0, 1).
    pub fn random_f32(&mut self) -> f32 {
        self.rng.random()
    }

    /// Generate random i32 in [min, max].
    pub fn random_range(&mut self, min: i32, max: i32) -> i32 {
        if min > max {
            min
        } else {
            self.rng.random_range(min..=max)
        }
    }
}

impl SandboxState for WasmState {
    fn resource_limiter(&mut self) -> &mut WasmMemoryLimiter {
        &mut self.limiter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stormstack_ecs::ComponentStore;

    #[test]
    fn rate_limits_reset() {
        let mut limits = RateLimits {
            log_calls: 50,
            spawn_calls: 30,
            component_write_calls: 10,
            query_calls: 5,
        };
        limits.reset();
        assert_eq!(limits.log_calls, 0);
        assert_eq!(limits.spawn_calls, 0);
        assert_eq!(limits.component_write_calls, 0);
        assert_eq!(limits.query_calls, 0);
    }

    #[test]
    fn rate_limits_enforcement() {
        let mut limits = RateLimits::default();
        assert!(limits.can_log());

        limits.log_calls = RateLimits::MAX_LOG_CALLS;
        assert!(!limits.can_log());
    }

    #[test]
    fn state_begin_tick() {
        let mut state = WasmState::new(TenantId::new());
        state.rate_limits.log_calls = 50;

        state.begin_tick(100, 0.016);

        assert_eq!(state.current_tick, 100);
        assert!((state.delta_time - 0.016).abs() < f64::EPSILON);
        assert_eq!(state.rate_limits.log_calls, 0);
    }

    #[test]
    fn deterministic_rng() {
        let mut state1 = WasmState::new(TenantId::new());
        let mut state2 = WasmState::new(TenantId::new());

        state1.set_rng_seed(42);
        state2.set_rng_seed(42);

        for _ in 0..100 {
            assert_eq!(state1.random_u32(), state2.random_u32());
        }
    }

    #[test]
    fn random_range_bounds() {
        let mut state = WasmState::new(TenantId::new());

        for _ in 0..100 {
            let val = state.random_range(10, 20);
            assert!(val >= 10 && val <= 20);
        }
    }

    #[test]
    fn random_range_inverted() {
        let mut state = WasmState::new(TenantId::new());
        let val = state.random_range(20, 10);
        assert_eq!(val, 20);
    }

    #[test]
    fn rate_limits_spawn_enforcement() {
        let mut limits = RateLimits::default();
        assert!(limits.can_spawn());

        limits.spawn_calls = RateLimits::MAX_SPAWN_CALLS;
        assert!(!limits.can_spawn());
    }

    #[test]
    fn rate_limits_just_under_max_allows() {
        let mut limits = RateLimits::default();

        limits.log_calls = RateLimits::MAX_LOG_CALLS - 1;
        assert!(limits.can_log(), "one under max should still allow");

        limits.spawn_calls = RateLimits::MAX_SPAWN_CALLS - 1;
        assert!(limits.can_spawn(), "one under max should still allow");
    }

    #[test]
    fn rate_limits_constants_are_reasonable() {
        assert!(RateLimits::MAX_LOG_CALLS >= 10);
        assert!(RateLimits::MAX_LOG_CALLS <= 1000);
        assert!(RateLimits::MAX_SPAWN_CALLS >= 10);
        assert!(RateLimits::MAX_SPAWN_CALLS <= 1000);
    }

    #[test]
    fn drain_logs_returns_all_and_clears() {
        let mut state = WasmState::new(TenantId::new());

        state.log_buffer.push(LogEntry {
            level: LogLevel::Info,
            message: "first".to_string(),
            tick: 0,
        });
        state.log_buffer.push(LogEntry {
            level: LogLevel::Debug,
            message: "second".to_string(),
            tick: 1,
        });

        let drained = state.drain_logs();
        assert_eq!(drained.len(), 2);
        assert!(state.log_buffer.is_empty());
        assert!(state.drain_logs().is_empty());
    }

    #[test]
    fn new_state_has_default_values() {
        let state = WasmState::new(TenantId::new());

        assert_eq!(state.current_tick, 0);
        assert!(state.log_buffer.is_empty());
        assert!(state.store.is_none());
        assert_eq!(state.capabilities, CapabilitySet::none());
    }

    #[test]
    fn state_with_store_has_store_reference() {
        let store = stormstack_ecs::shared(ComponentStore::standalone());
        let state = WasmState::with_store(TenantId::new(), store);

        assert!(state.store.is_some());
        let store_ref = state.store.as_ref().unwrap();
        assert_eq!(store_ref.read().entity_count(), 0);
    }

    #[test]
    fn with_capabilities_overrides_default_none() {
        let state = WasmState::new(TenantId::new()).with_capabilities(CapabilitySet::full());
        assert!(state.capabilities.can_spawn_entities);
        assert!(state.capabilities.can_write_components);
    }

    #[test]
    fn log_level_equality() {
        assert_eq!(LogLevel::Debug, LogLevel::Debug);
        assert_ne!(LogLevel::Debug, LogLevel::Info);
    }
}
