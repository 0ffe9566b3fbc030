//! A single match's lifecycle and tick protocol.
//!
//! A `Match` owns one [`SharedStore`], a command queue, and the sandboxed
//! instance of every module installed into it. Everything here runs on
//! whichever thread the owning [`crate::container::Container`] calls
//! [`Match::tick_once`] from; nothing inside a match tick suspends or
//! crosses an await point.

use stormstack_core::{
    CommandQueue, ContainerConfig, ErrorKind, MatchConfig, MatchId, QueuedCommand, Result,
    StormError, TenantId, UserId, WorldSnapshot,
};
use stormstack_ecs::SharedStore;
use stormstack_modules::{ModuleManifest, ModuleRegistry};
use stormstack_wasm::WasmInstance;
use stormstack_wasm_host::WasmState;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Export a module calls once per tick, after every command targeting this
/// tick has been dispatched.
pub const ON_TICK_EXPORT: &str = "on_tick";
/// Export a module calls to handle the command currently staged via
/// `command_payload_*`; a module dispatches internally on the command name
/// it reads back, so every module that handles any command exports this
/// single entry point.
pub const HANDLE_COMMAND_EXPORT: &str = "handle_command";

/// Capacity of each match's error-event broadcast channel. Slow or absent
/// subscribers simply miss the oldest events; this stream is diagnostic,
/// not authoritative state.
const ERROR_CHANNEL_CAPACITY: usize = 256;

/// Lifecycle state of a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchState {
    /// Created but never ticked.
    Pending,
    /// Ticking normally.
    Active,
    /// Frozen by an operator; still accepts and queues commands.
    Paused,
    /// Terminal. No further ticks are accepted.
    Completed {
        /// Why the match ended.
        reason: String,
    },
}

impl MatchState {
    /// Whether this match can still be ticked or receive module installs.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchState::Completed { .. })
    }
}

/// A per-match, per-module failure/error event, emitted to the match's
/// error stream and never propagated to other handlers or other matches.
#[derive(Debug, Clone)]
pub struct MatchErrorEvent {
    /// The match this event belongs to.
    pub match_id: MatchId,
    /// Tick at which the failure occurred.
    pub tick: u64,
    /// Name of the module that failed, or `"<unrouted>"` for a command with
    /// no installed handler.
    pub module: String,
    /// Envelope-level classification of the underlying [`StormError`].
    pub kind: ErrorKind,
    /// Human-readable description of the failure.
    pub message: String,
}

struct ModuleEntry {
    manifest: ModuleManifest,
    instance: WasmInstance<WasmState>,
    consecutive_failures: u32,
    disabled: bool,
}

/// One tenant-scoped game session: component state, pending commands, and
/// the sandboxed modules installed into it.
pub struct Match {
    id: MatchId,
    tenant_id: TenantId,
    config: MatchConfig,
    state: MatchState,
    tick: u64,
    store: SharedStore,
    queue: CommandQueue,
    modules: Vec<ModuleEntry>,
    registry: ModuleRegistry,
    load_order: Vec<String>,
    error_tx: broadcast::Sender<MatchErrorEvent>,
}

impl Match {
    /// Create a new, `Pending` match with no modules installed.
    #[must_use]
    pub fn new(
        id: MatchId,
        tenant_id: TenantId,
        config: MatchConfig,
        store: SharedStore,
        container_config: &ContainerConfig,
    ) -> Self {
        let (error_tx, _rx) = broadcast::channel(ERROR_CHANNEL_CAPACITY);
        Self {
            id,
            tenant_id,
            config,
            state: MatchState::Pending,
            tick: 0,
            store,
            queue: CommandQueue::new(container_config.command_queue_capacity),
            modules: Vec::new(),
            registry: ModuleRegistry::new(),
            load_order: Vec::new(),
            error_tx,
        }
    }

    /// This match's id.
    #[must_use]
    pub fn id(&self) -> MatchId {
        self.id
    }

    /// The tenant that owns this match.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// The match's configuration, including its RNG seed.
    #[must_use]
    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> &MatchState {
        &self.state
    }

    /// Current tick counter.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// This match's shared component store.
    #[must_use]
    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    /// A full snapshot of this match's state at its current version.
    #[must_use]
    pub fn snapshot(&self) -> WorldSnapshot {
        self.store.read().snapshot_full()
    }

    /// Subscribe to this match's error-event stream.
    #[must_use]
    pub fn subscribe_errors(&self) -> broadcast::Receiver<MatchErrorEvent> {
        self.error_tx.subscribe()
    }

    /// Move a `Pending` match into `Active`. A no-op if already `Active`.
    ///
    /// # Errors
    ///
    /// Returns [`StormError::InvalidState`] if the match is `Paused` or
    /// `Completed`.
    pub fn start(&mut self) -> Result<()> {
        match &self.state {
            MatchState::Pending | MatchState::Active => {
                self.state = MatchState::Active;
                Ok(())
            }
            MatchState::Paused => Err(StormError::InvalidState(
                "match is paused; call resume() instead of start()".to_string(),
            )),
            MatchState::Completed { reason } => Err(StormError::InvalidState(format!(
                "match already completed: {reason}"
            ))),
        }
    }

    /// Freeze ticking. Queued commands are still accepted while paused.
    ///
    /// # Errors
    ///
    /// Returns [`StormError::InvalidState`] unless the match is `Active`.
    pub fn pause(&mut self) -> Result<()> {
        if self.state != MatchState::Active {
            return Err(StormError::InvalidState(
                "only an active match can be paused".to_string(),
            ));
        }
        self.state = MatchState::Paused;
        Ok(())
    }

    /// Resume ticking after a pause.
    ///
    /// # Errors
    ///
    /// Returns [`StormError::InvalidState`] unless the match is `Paused`.
    pub fn resume(&mut self) -> Result<()> {
        if self.state != MatchState::Paused {
            return Err(StormError::InvalidState(
                "only a paused match can be resumed".to_string(),
            ));
        }
        self.state = MatchState::Active;
        Ok(())
    }

    /// Terminate the match for an operator- or engine-originated reason.
    /// Idempotent: completing an already-completed match keeps the first
    /// reason.
    pub fn complete(&mut self, reason: impl Into<String>) {
        if !self.state.is_terminal() {
            self.state = MatchState::Completed {
                reason: reason.into(),
            };
        }
    }

    /// Admit a command into this match's queue.
    ///
    /// # Errors
    ///
    /// Returns [`StormError::InvalidState`] if the match has already
    /// completed, or propagates [`CommandQueue::enqueue`]'s capacity/
    /// past-tick rejections.
    pub fn enqueue_command(
        &mut self,
        command_name: String,
        payload: serde_json::Value,
        user_id: UserId,
        target_tick: Option<u64>,
    ) -> Result<()> {
        if self.state.is_terminal() {
            return Err(StormError::InvalidState(
                "match has completed; no further commands accepted".to_string(),
            ));
        }
        let target = target_tick.unwrap_or(self.tick + 1);
        self.queue
            .enqueue(command_name, payload, user_id, target, self.tick)
    }

    /// Install a compiled, validated module instance. Modules dispatch in
    /// install order but tick in declared dependency order (see
    /// [`Match::tick_once`]), resolved from every installed module's
    /// manifest.
    ///
    /// # Errors
    ///
    /// Returns [`StormError::InvalidState`] if installing this module would
    /// introduce a circular dependency among the modules installed so far.
    pub fn install_module(
        &mut self,
        manifest: ModuleManifest,
        instance: WasmInstance<WasmState>,
    ) -> Result<()> {
        debug!(module = %manifest.name, match_id = %self.id, "installing module");
        self.registry.register(
            &manifest.name,
            &manifest.version,
            &manifest.description,
            &manifest.dependencies,
        );

        let mut names: Vec<&str> = self.modules.iter().map(|m| m.manifest.name.as_str()).collect();
        names.push(manifest.name.as_str());

        match self.registry.resolve_load_order(&names) {
            Ok(order) => {
                self.load_order = order;
                self.modules.push(ModuleEntry {
                    manifest,
                    instance,
                    consecutive_failures: 0,
                    disabled: false,
                });
                Ok(())
            }
            Err(err) => {
                self.registry.unregister(&manifest.name);
                Err(StormError::InvalidState(format!(
                    "cannot install module '{}': {err}",
                    manifest.name
                )))
            }
        }
    }

    /// Whether a module of the given name is installed and still enabled.
    #[must_use]
    pub fn has_enabled_module(&self, name: &str) -> bool {
        self.modules
            .iter()
            .any(|m| m.manifest.name == name && !m.disabled)
    }

    /// Run one tick of the six-step protocol:
    ///
    /// 1. `Pending` becomes `Active` on first tick.
    /// 2. Drain commands whose `target_tick <= tick + 1`.
    /// 3. Dispatch each drained command to its owning module's handler.
    /// 4. Invoke `on_tick` on every enabled module, in declared dependency
    ///    order (dependencies before dependents).
    /// 5. Advance the store's version.
    /// 6. Advance the tick counter.
    ///
    /// A module's own failure never aborts the tick for other modules, nor
    /// for other matches; failures are attributed and counted against that
    /// module's failure budget.
    ///
    /// # Errors
    ///
    /// Currently infallible; reserved for a future fatal-store-corruption
    /// path that would need to abort the tick rather than disable a module.
    pub fn tick_once(&mut self, container_config: &ContainerConfig, delta_time: f64) -> Result<()> {
        if self.state == MatchState::Pending {
            self.state = MatchState::Active;
        }
        if self.state != MatchState::Active {
            return Ok(());
        }

        let next_tick = self.tick + 1;
        let ready: Vec<QueuedCommand> = self.queue.drain_ready(next_tick);

        for command in ready {
            self.dispatch_command(&command, container_config);
        }

        let order = self.load_order.clone();
        for name in &order {
            let Some(idx) = self.modules.iter().position(|m| &m.manifest.name == name) else {
                continue;
            };
            if self.modules[idx].disabled {
                continue;
            }
            self.modules[idx]
                .instance
                .state_mut()
                .begin_tick(next_tick, delta_time);
            let outcome = self.modules[idx].instance.call(
                ON_TICK_EXPORT,
                container_config.resource_budget.max_fuel,
                epoch_ticks(container_config),
            );
            self.record_outcome(idx, outcome, container_config);
        }

        self.store.write().advance_version();
        self.tick = next_tick;
        Ok(())
    }

    fn dispatch_command(&mut self, command: &QueuedCommand, container_config: &ContainerConfig) {
        let Some(idx) = self
            .modules
            .iter()
            .position(|m| !m.disabled && m.manifest.handles_command(&command.command_name))
        else {
            let err = StormError::UnknownCommand(command.command_name.clone());
            self.emit_error("<unrouted>".to_string(), err.kind(), err.to_string());
            return;
        };

        self.modules[idx]
            .instance
            .state_mut()
            .set_pending_command(&command.command_name, &command.payload);

        let outcome = self.modules[idx].instance.call(
            HANDLE_COMMAND_EXPORT,
            container_config.resource_budget.max_fuel,
            epoch_ticks(container_config),
        );
        self.modules[idx].instance.state_mut().clear_pending_command();
        self.record_outcome(idx, outcome, container_config);
    }

    fn record_outcome(
        &mut self,
        idx: usize,
        outcome: std::result::Result<(), stormstack_core::WasmError>,
        container_config: &ContainerConfig,
    ) {
        let name = self.modules[idx].manifest.name.clone();
        match outcome {
            Ok(()) => {
                self.modules[idx].consecutive_failures = 0;
            }
            Err(err) => {
                self.modules[idx].consecutive_failures += 1;
                let err = StormError::Wasm(err);
                self.emit_error(name.clone(), err.kind(), err.to_string());
                if self.modules[idx].consecutive_failures >= container_config.module_failure_budget {
                    warn!(
                        module = %name,
                        match_id = %self.id,
                        "module exceeded its failure budget; disabling for the remainder of this match"
                    );
                    self.modules[idx].disabled = true;
                }
            }
        }
    }

    fn emit_error(&self, module: String, kind: ErrorKind, message: String) {
        let _ = self.error_tx.send(MatchErrorEvent {
            match_id: self.id,
            tick: self.tick,
            module,
            kind,
            message,
        });
    }
}

fn epoch_ticks(container_config: &ContainerConfig) -> u64 {
    // One engine epoch is advanced once per container tick by the owning
    // container; a deadline in epochs is the configured millisecond budget
    // divided by the container's own tick period, floored at 1.
    let tick_ms = 1000.0 / f64::from(container_config.tick_rate_hz.max(1));
    let deadline = (container_config.resource_budget.epoch_deadline_ms as f64 / tick_ms).ceil();
    (deadline as u64).max(1)
}
