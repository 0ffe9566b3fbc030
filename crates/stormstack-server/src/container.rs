//! Execution container management.
//!
//! A [`Container`] owns one tenant's `wasmtime` [`Engine`](wasmtime::Engine)
//! (via a shared [`WasmSandbox`]), one container-scoped
//! [`EntityIdAllocator`], a cache of compiled module artifacts, and every
//! [`Match`] currently running for that tenant. Compilation and linking
//! happen once per container; instantiation happens once per
//! `(match, module)` pair, off the tick path.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::error;
use wasmtime::Linker;

use stormstack_core::{ContainerConfig, ContainerId, MatchConfig, MatchId, Result, StormError, TenantId};
use stormstack_ecs::{shared, ComponentStore, EntityIdAllocator};
use stormstack_modules::ModuleManifest;
use stormstack_wasm::{WasmModule, WasmSandbox};
use stormstack_wasm_host::{CapabilitySet, CoreHostFunctions, HostFunctionProvider, WasmState};
use tokio::sync::broadcast;

use crate::match_engine::{Match, MatchErrorEvent, MatchState};

/// Identifying summary of a match, returned by listing queries that don't
/// need the full match state.
#[derive(Debug, Clone, Copy)]
pub struct MatchSummary {
    /// The match's id.
    pub id: MatchId,
}

/// A compiled artifact cached by `(name, version)` so repeated installs
/// across matches in the same container never recompile.
struct CompiledModule {
    module: WasmModule,
    manifest: ModuleManifest,
}

/// Isolated execution environment for one tenant's matches.
pub struct Container {
    id: ContainerId,
    tenant_id: TenantId,
    config: ContainerConfig,
    entity_alloc: EntityIdAllocator,
    sandbox: Arc<WasmSandbox>,
    linker: Arc<Linker<WasmState>>,
    compiled: RwLock<HashMap<(String, String), CompiledModule>>,
    matches: RwLock<HashMap<MatchId, Match>>,
}

impl Container {
    /// Create a new, empty container for `tenant_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the `wasmtime` engine fails to initialize or the
    /// core host functions fail to register.
    pub fn new(tenant_id: TenantId, config: ContainerConfig) -> Result<Self> {
        let limits = stormstack_wasm::WasmResourceLimits::from_budget(&config.resource_budget);
        let sandbox = Arc::new(WasmSandbox::new(limits)?);
        let mut linker = Linker::new(sandbox.engine());
        CoreHostFunctions.register(&mut linker)?;

        Ok(Self {
            id: ContainerId::new(),
            tenant_id,
            config,
            entity_alloc: EntityIdAllocator::new(),
            sandbox,
            linker: Arc::new(linker),
            compiled: RwLock::new(HashMap::new()),
            matches: RwLock::new(HashMap::new()),
        })
    }

    /// Container id.
    #[must_use]
    pub fn id(&self) -> ContainerId {
        self.id
    }

    /// Tenant this container belongs to.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// This container's configuration.
    #[must_use]
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Compile WASM bytecode once, cached by the manifest's `(name,
    /// version)` for reuse across every match in this container.
    ///
    /// # Errors
    ///
    /// Returns [`StormError::Wasm`] if compilation fails, or
    /// [`StormError::Module`] if the compiled artifact does not satisfy the
    /// manifest's declared exports.
    pub fn compile_module(&self, manifest: &ModuleManifest, wasm_bytes: &[u8]) -> Result<()> {
        let key = (manifest.name.clone(), manifest.version.clone());
        if self.compiled.read().contains_key(&key) {
            return Ok(());
        }
        let module = self.sandbox.compile(wasm_bytes)?;
        manifest.validate_against(&module)?;
        self.compiled.write().insert(
            key,
            CompiledModule {
                module,
                manifest: manifest.clone(),
            },
        );
        Ok(())
    }

    /// Create a new `Pending` match in this container.
    #[must_use]
    pub fn create_match(&self, config: MatchConfig) -> MatchId {
        let id = MatchId::new();
        let store = shared(ComponentStore::new(self.entity_alloc.clone()));
        let m = Match::new(id, self.tenant_id, config, store, &self.config);
        self.matches.write().insert(id, m);
        id
    }

    /// Install a module, previously compiled via [`Container::compile_module`],
    /// into `match_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StormError::ModuleNotFound`] if no compiled artifact is
    /// cached under `module_name`/`module_version`,
    /// [`StormError::MatchNotFound`] if the match does not exist, or
    /// [`StormError::InvalidState`] if installing this module would
    /// introduce a circular dependency among the match's installed modules.
    pub fn install_module(
        &self,
        match_id: MatchId,
        module_name: &str,
        module_version: &str,
    ) -> Result<()> {
        let key = (module_name.to_string(), module_version.to_string());
        let compiled = self.compiled.read();
        let entry = compiled
            .get(&key)
            .ok_or_else(|| StormError::ModuleNotFound(stormstack_core::ModuleId::new()))?;

        let mut matches = self.matches.write();
        let m = matches
            .get_mut(&match_id)
            .ok_or(StormError::MatchNotFound(match_id))?;

        let capabilities: CapabilitySet = entry.manifest.requested_capabilities;
        let mut state = WasmState::with_store(self.tenant_id, Arc::clone(m.store()))
            .with_capabilities(capabilities)
            .with_limits(self.sandbox.limits());
        state.set_rng_seed(m.config().seed);

        let instance = self.sandbox.instantiate(&entry.module, &self.linker, state)?;
        m.install_module(entry.manifest.clone(), instance)
    }

    /// Admit a command into a match's queue.
    ///
    /// # Errors
    ///
    /// Returns [`StormError::MatchNotFound`] if the match does not exist,
    /// or propagates the match's own admission error.
    pub fn enqueue_command(
        &self,
        match_id: MatchId,
        command_name: String,
        payload: serde_json::Value,
        user_id: stormstack_core::UserId,
        target_tick: Option<u64>,
    ) -> Result<()> {
        let mut matches = self.matches.write();
        let m = matches
            .get_mut(&match_id)
            .ok_or(StormError::MatchNotFound(match_id))?;
        m.enqueue_command(command_name, payload, user_id, target_tick)
    }

    /// Start, pause, resume, or complete a match's lifecycle.
    ///
    /// # Errors
    ///
    /// Returns [`StormError::MatchNotFound`] if the match does not exist.
    pub fn start_match(&self, match_id: MatchId) -> Result<()> {
        self.with_match_mut(match_id, Match::start)
    }

    /// See [`Container::start_match`].
    ///
    /// # Errors
    ///
    /// Returns [`StormError::MatchNotFound`] if the match does not exist.
    pub fn pause_match(&self, match_id: MatchId) -> Result<()> {
        self.with_match_mut(match_id, Match::pause)
    }

    /// See [`Container::start_match`].
    ///
    /// # Errors
    ///
    /// Returns [`StormError::MatchNotFound`] if the match does not exist.
    pub fn resume_match(&self, match_id: MatchId) -> Result<()> {
        self.with_match_mut(match_id, Match::resume)
    }

    /// Terminate a match for an operator- or engine-originated reason.
    ///
    /// # Errors
    ///
    /// Returns [`StormError::MatchNotFound`] if the match does not exist.
    pub fn complete_match(&self, match_id: MatchId, reason: impl Into<String>) -> Result<()> {
        let mut matches = self.matches.write();
        let m = matches
            .get_mut(&match_id)
            .ok_or(StormError::MatchNotFound(match_id))?;
        m.complete(reason);
        Ok(())
    }

    fn with_match_mut(&self, match_id: MatchId, f: impl FnOnce(&mut Match) -> Result<()>) -> Result<()> {
        let mut matches = self.matches.write();
        let m = matches
            .get_mut(&match_id)
            .ok_or(StormError::MatchNotFound(match_id))?;
        f(m)
    }

    /// A full snapshot of a match's current state.
    ///
    /// # Errors
    ///
    /// Returns [`StormError::MatchNotFound`] if the match does not exist.
    pub fn snapshot(&self, match_id: MatchId) -> Result<stormstack_core::WorldSnapshot> {
        let matches = self.matches.read();
        let m = matches.get(&match_id).ok_or(StormError::MatchNotFound(match_id))?;
        Ok(m.snapshot())
    }

    /// Change-log delta since `from_version` for a match's component store.
    ///
    /// # Errors
    ///
    /// Returns [`StormError::MatchNotFound`] if the match does not exist.
    pub fn delta_since(&self, match_id: MatchId, from_version: u64) -> Result<stormstack_core::WorldDelta> {
        let matches = self.matches.read();
        let m = matches.get(&match_id).ok_or(StormError::MatchNotFound(match_id))?;
        Ok(m.store().read().delta_since(from_version))
    }

    /// Current owner handle of `entity` in `match_id`, if it has an
    /// `OWNER` component bound. `None` if the match, entity, or component
    /// binding doesn't currently exist.
    #[must_use]
    pub fn entity_owner(&self, match_id: MatchId, entity: stormstack_core::EntityId) -> Option<i64> {
        let matches = self.matches.read();
        let m = matches.get(&match_id)?;
        match m.store().read().get(entity, stormstack_core::ComponentTypeId::OWNER) {
            Some(stormstack_core::ComponentValue::Handle(v)) => Some(v),
            _ => None,
        }
    }

    /// Subscribe to a match's error-event stream.
    #[must_use]
    pub fn subscribe_match_errors(&self, match_id: MatchId) -> Option<broadcast::Receiver<MatchErrorEvent>> {
        self.matches.read().get(&match_id).map(Match::subscribe_errors)
    }

    /// Every currently `Active` match in this container.
    #[must_use]
    pub fn active_matches(&self) -> Vec<MatchSummary> {
        self.matches
            .read()
            .values()
            .filter(|m| *m.state() == MatchState::Active || *m.state() == MatchState::Pending)
            .map(|m| MatchSummary { id: m.id() })
            .collect()
    }

    /// Tick every non-terminal match in this container by `delta_time`
    /// seconds. One match failing never prevents the others from ticking;
    /// a failure instead terminates that match with a `container-fault`
    /// reason. After a successful tick, the match's change-log history is
    /// pruned to the container's configured retention window so it never
    /// grows unbounded for the life of a long-running match.
    pub fn tick_all(&self, delta_time: f64) {
        self.sandbox.tick_epoch();
        let match_ids: Vec<MatchId> = self.matches.read().keys().copied().collect();
        for match_id in match_ids {
            let mut matches = self.matches.write();
            let Some(m) = matches.get_mut(&match_id) else {
                continue;
            };
            if m.state().is_terminal() {
                continue;
            }
            match m.tick_once(&self.config, delta_time) {
                Ok(()) => {
                    let keep_from = m.tick().saturating_sub(self.config.snapshot_retention_ticks);
                    m.store().write().prune_history(keep_from);
                }
                Err(err) => {
                    error!(match_id = %match_id, "match tick failed: {err}");
                    m.complete(format!("container-fault: {err}"));
                }
            }
        }
    }
}

/// Manages every container across every tenant on this server.
#[derive(Default)]
pub struct ContainerService {
    containers: DashMap<ContainerId, Arc<Container>>,
    match_index: DashMap<MatchId, ContainerId>,
}

/// Shared handle to a [`ContainerService`], cloned into every component
/// that needs to reach running matches (the game loop, command dispatch,
/// the WebSocket handler).
pub type SharedContainerService = Arc<ContainerService>;

/// Construct a fresh, empty, shared container service.
#[must_use]
pub fn shared_container_service() -> SharedContainerService {
    Arc::new(ContainerService::new())
}

impl ContainerService {
    /// Create an empty container service.
    #[must_use]
    pub fn new() -> Self {
        Self {
            containers: DashMap::new(),
            match_index: DashMap::new(),
        }
    }

    /// Create a new container for `tenant_id` and register it.
    ///
    /// # Errors
    ///
    /// Returns an error if the container's sandbox fails to initialize.
    pub fn create_container(&self, tenant_id: TenantId, config: ContainerConfig) -> Result<ContainerId> {
        let container = Container::new(tenant_id, config)?;
        let id = container.id();
        self.containers.insert(id, Arc::new(container));
        Ok(id)
    }

    /// Look up a container by id.
    #[must_use]
    pub fn get(&self, container_id: ContainerId) -> Option<Arc<Container>> {
        self.containers.get(&container_id).map(|entry| Arc::clone(&entry))
    }

    /// Every registered container.
    #[must_use]
    pub fn all_containers(&self) -> Vec<Arc<Container>> {
        self.containers.iter().map(|entry| Arc::clone(&entry)).collect()
    }

    /// Create a match in `container_id` and index it for lookup by
    /// [`ContainerService::container_for_match`].
    ///
    /// # Errors
    ///
    /// Returns [`StormError::ContainerNotFound`] if the container does not
    /// exist.
    pub fn create_match(&self, container_id: ContainerId, config: MatchConfig) -> Result<MatchId> {
        let container = self
            .containers
            .get(&container_id)
            .ok_or(StormError::ContainerNotFound(container_id))?;
        let match_id = container.create_match(config);
        self.match_index.insert(match_id, container_id);
        Ok(match_id)
    }

    /// Find which container owns a match.
    #[must_use]
    pub fn container_for_match(&self, match_id: MatchId) -> Option<Arc<Container>> {
        let container_id = *self.match_index.get(&match_id)?;
        self.get(container_id)
    }

    /// Tick every container's matches by `delta_time` seconds. A container
    /// whose sandbox has somehow become unusable is logged and skipped
    /// rather than aborting the rest of the server.
    pub fn tick_all(&self, delta_time: f64) {
        for container in self.all_containers() {
            container.tick_all(delta_time);
        }
    }

    /// Submit a command to whichever container owns `match_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StormError::MatchNotFound`] if no container has this match
    /// indexed.
    pub fn dispatch_command(
        &self,
        match_id: MatchId,
        command_name: String,
        payload: serde_json::Value,
        user_id: stormstack_core::UserId,
        target_tick: Option<u64>,
    ) -> Result<()> {
        let container = self
            .container_for_match(match_id)
            .ok_or(StormError::MatchNotFound(match_id))?;
        container.enqueue_command(match_id, command_name, payload, user_id, target_tick)
    }
}

impl stormstack_ws::MatchStateProvider for ContainerService {
    fn get_snapshot(&self, match_id: MatchId) -> Result<stormstack_core::WorldSnapshot> {
        let container = self
            .container_for_match(match_id)
            .ok_or(StormError::MatchNotFound(match_id))?;
        container.snapshot(match_id)
    }

    fn match_exists(&self, match_id: MatchId) -> bool {
        self.match_index.contains_key(&match_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_module_wat() -> &'static str {
        r#"(module
            (func (export "on_tick"))
            (func (export "handle_command"))
        )"#
    }

    fn test_manifest(name: &str) -> ModuleManifest {
        ModuleManifest {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            description: "test".to_string(),
            dependencies: Vec::new(),
            declared_components: Vec::new(),
            declared_commands: vec![stormstack_modules::DeclaredCommand::new("noop")],
            requested_capabilities: CapabilitySet::none(),
            required_exports: vec!["on_tick".to_string(), "handle_command".to_string()],
        }
    }

    #[test]
    fn container_creates_pending_match() {
        let container = Container::new(TenantId::new(), ContainerConfig::default()).expect("container");
        let match_id = container.create_match(MatchConfig::default());
        assert!(container.active_matches().iter().any(|s| s.id == match_id));
    }

    #[test]
    fn install_and_tick_module() {
        let container = Container::new(TenantId::new(), ContainerConfig::default()).expect("container");
        let match_id = container.create_match(MatchConfig::default());

        let manifest = test_manifest("combat");
        let bytes = wat::parse_str(noop_module_wat()).expect("wat");
        container.compile_module(&manifest, &bytes).expect("compile");
        container
            .install_module(match_id, "combat", "1.0.0")
            .expect("install");

        container.tick_all(1.0 / 60.0);
        let snapshot = container.snapshot(match_id).expect("snapshot");
        assert_eq!(snapshot.tick, 1);
    }

    #[test]
    fn service_routes_commands_to_owning_container() {
        let service = shared_container_service();
        let container_id = service
            .create_container(TenantId::new(), ContainerConfig::default())
            .expect("container");
        let match_id = service
            .create_match(container_id, MatchConfig::default())
            .expect("match");

        service
            .dispatch_command(
                match_id,
                "noop".to_string(),
                serde_json::json!({}),
                stormstack_core::UserId::new(),
                None,
            )
            .expect("dispatch");
    }

    #[test]
    fn dispatch_to_unknown_match_fails() {
        let service = shared_container_service();
        let err = service
            .dispatch_command(
                MatchId::new(),
                "noop".to_string(),
                serde_json::json!({}),
                stormstack_core::UserId::new(),
                None,
            )
            .unwrap_err();
        assert!(matches!(err, StormError::MatchNotFound(_)));
    }
}
