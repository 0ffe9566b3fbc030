//! WASM sandbox implementation.
//!
//! SECURITY CRITICAL: this module executes untrusted code. Every instance
//! is created with fuel metering, an epoch deadline, and a memory/table/
//! instance `ResourceLimiter` already installed — there is no code path
//! that produces an unlimited `Store`.

use crate::limits::WasmResourceLimits;
use stormstack_core::WasmError;
use wasmtime::{Config, Engine, Linker, Module, ResourceLimiter, Store, TypedFunc};

/// Compiled WASM module ready for instantiation. Compilation happens once
/// per container; instantiation happens once per `(match, module)` pair.
#[derive(Debug)]
pub struct WasmModule {
    module: Module,
}

impl WasmModule {
    /// The underlying compiled `wasmtime` module.
    #[must_use]
    pub fn inner(&self) -> &Module {
        &self.module
    }

    /// Names of every function this module exports.
    #[must_use]
    pub fn exported_functions(&self) -> Vec<String> {
        self.module
            .exports()
            .filter(|e| e.ty().func().is_some())
            .map(|e| e.name().to_string())
            .collect()
    }
}

/// Per-instance memory/table/instance ceiling enforcement.
///
/// Installed on every `Store` via [`Store::limiter`]; `wasmtime` consults it
/// before growing any linear memory or table.
#[derive(Debug, Clone, Copy)]
pub struct WasmMemoryLimiter {
    max_memory_bytes: usize,
    max_table_elements: usize,
    max_instances: usize,
    max_memories: usize,
}

impl WasmMemoryLimiter {
    /// Build a limiter from the sandbox's configured resource limits.
    #[must_use]
    pub fn from_limits(limits: &WasmResourceLimits) -> Self {
        Self {
            max_memory_bytes: limits.max_memory_bytes,
            max_table_elements: limits.max_table_elements as usize,
            max_instances: limits.max_instances as usize,
            max_memories: limits.max_memories as usize,
        }
    }
}

impl ResourceLimiter for WasmMemoryLimiter {
    fn memory_growing(
        &mut self,
        _current: usize,
        desired: usize,
        _maximum: Option<usize>,
    ) -> wasmtime::Result<bool> {
        Ok(desired <= self.max_memory_bytes)
    }

    fn table_growing(
        &mut self,
        _current: usize,
        desired: usize,
        _maximum: Option<usize>,
    ) -> wasmtime::Result<bool> {
        Ok(desired <= self.max_table_elements)
    }

    fn instances(&self) -> usize {
        self.max_instances
    }

    fn tables(&self) -> usize {
        1
    }

    fn memories(&self) -> usize {
        self.max_memories
    }
}

/// Store data a sandboxed instance's state type must expose, so the
/// sandbox can install the memory limiter without knowing anything else
/// about the caller's host function state.
pub trait SandboxState: Send + 'static {
    /// Mutable access to this instance's memory/table ceiling enforcement.
    fn resource_limiter(&mut self) -> &mut WasmMemoryLimiter;
}

/// An instantiated module with its own isolated `Store`.
pub struct WasmInstance<S: SandboxState> {
    store: Store<S>,
    instance: wasmtime::Instance,
}

impl<S: SandboxState> WasmInstance<S> {
    /// Remaining fuel before this instance traps with `FuelExhausted`.
    #[must_use]
    pub fn fuel_remaining(&self) -> u64 {
        self.store.get_fuel().unwrap_or(0)
    }

    /// Current memory usage of the instance's primary linear memory, in bytes.
    #[must_use]
    pub fn memory_usage(&mut self) -> usize {
        self.instance
            .get_memory(&mut self.store, "memory")
            .map_or(0, |mem| mem.data_size(&mut self.store))
    }

    /// Mutable access to this instance's store data.
    pub fn state_mut(&mut self) -> &mut S {
        self.store.data_mut()
    }

    /// Call an exported nullary function, re-arming fuel/epoch for this
    /// single invocation before running it.
    ///
    /// # Errors
    ///
    /// Classifies traps and resource exhaustion into the matching
    /// [`WasmError`] variant. A function with a different signature than
    /// `() -> ()` fails with [`WasmError::TypeMismatch`].
    pub fn call(
        &mut self,
        func_name: &str,
        fuel_budget: u64,
        epoch_deadline_ticks: u64,
    ) -> Result<(), WasmError> {
        self.store
            .set_fuel(fuel_budget)
            .map_err(|e| WasmError::InstantiationError(e.to_string()))?;
        self.store.set_epoch_deadline(epoch_deadline_ticks);

        let func: TypedFunc<(), ()> = self
            .instance
            .get_typed_func(&mut self.store, func_name)
            .map_err(|_| {
                WasmError::TypeMismatch {
                    expected: "() -> ()".to_string(),
                    actual: format!("signature of '{func_name}'"),
                }
            })?;

        func.call(&mut self.store, ()).map_err(|err| classify_trap(&err))
    }
}

fn classify_trap(err: &wasmtime::Error) -> WasmError {
    if let Some(trap) = err.downcast_ref::<wasmtime::Trap>() {
        return match trap {
            wasmtime::Trap::OutOfFuel => WasmError::FuelExhausted { consumed: 0 },
            wasmtime::Trap::Interrupt => WasmError::EpochDeadlineExceeded,
            wasmtime::Trap::StackOverflow => WasmError::StackOverflow,
            other => WasmError::Trap(other.to_string()),
        };
    }
    WasmError::Trap(err.to_string())
}

/// WASM sandbox for secure execution of untrusted modules.
///
/// One sandbox owns one `Engine` (compiled code is shared across every
/// match in a container); each `(match, module)` pair gets its own
/// [`WasmInstance`] with private linear memory and fuel.
pub struct WasmSandbox {
    engine: Engine,
    limits: WasmResourceLimits,
}

impl WasmSandbox {
    /// Create a new sandbox enforcing `limits` on every instance it creates.
    ///
    /// # Errors
    ///
    /// Returns [`WasmError::InstantiationError`] if the `wasmtime` engine
    /// fails to initialize.
    pub fn new(limits: WasmResourceLimits) -> Result<Self, WasmError> {
        let mut config = Config::new();
        config.consume_fuel(true);
        config.epoch_interruption(true);
        config.max_wasm_stack(limits.max_stack_bytes);
        config.wasm_reference_types(false);
        config.wasm_simd(false);
        config.wasm_relaxed_simd(false);

        let engine = Engine::new(&config)
            .map_err(|e| WasmError::InstantiationError(e.to_string()))?;

        Ok(Self { engine, limits })
    }

    /// Create a sandbox with [`WasmResourceLimits::default`].
    ///
    /// # Errors
    ///
    /// See [`WasmSandbox::new`].
    pub fn with_defaults() -> Result<Self, WasmError> {
        Self::new(WasmResourceLimits::default())
    }

    /// The resource limits this sandbox enforces.
    #[must_use]
    pub fn limits(&self) -> WasmResourceLimits {
        self.limits
    }

    /// The shared `wasmtime` engine compiled modules and instances live in.
    #[must_use]
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Compile a module from its WASM bytecode.
    ///
    /// # Errors
    ///
    /// Returns [`WasmError::CompilationError`] if the bytes are not valid
    /// WASM, or reference a feature this sandbox's `Config` disables.
    pub fn compile(&self, wasm_bytes: &[u8]) -> Result<WasmModule, WasmError> {
        let module = Module::new(&self.engine, wasm_bytes)
            .map_err(|e| WasmError::CompilationError(e.to_string()))?;
        Ok(WasmModule { module })
    }

    /// Instantiate a compiled module with fresh, isolated state.
    ///
    /// `state` must expose a [`WasmMemoryLimiter`] (via [`SandboxState`])
    /// sized from this sandbox's limits; the caller is responsible for
    /// building it with [`WasmMemoryLimiter::from_limits`].
    ///
    /// # Errors
    ///
    /// Returns [`WasmError::InstantiationError`] if linking or
    /// instantiation fails (e.g. a missing host import).
    pub fn instantiate<S: SandboxState>(
        &self,
        module: &WasmModule,
        linker: &Linker<S>,
        state: S,
    ) -> Result<WasmInstance<S>, WasmError> {
        let mut store = Store::new(&self.engine, state);
        store.limiter(|data| data.resource_limiter() as &mut dyn ResourceLimiter);

        let instance = linker
            .instantiate(&mut store, &module.module)
            .map_err(|e| WasmError::InstantiationError(e.to_string()))?;

        Ok(WasmInstance { store, instance })
    }

    /// Advance the engine's epoch counter by one tick.
    ///
    /// The container's tick driver calls this once per tick; any instance
    /// whose deadline has been reached traps with `EpochDeadlineExceeded`
    /// the next time it yields control back to `wasmtime`.
    pub fn tick_epoch(&self) {
        self.engine.increment_epoch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestState {
        limiter: WasmMemoryLimiter,
    }

    impl SandboxState for TestState {
        fn resource_limiter(&mut self) -> &mut WasmMemoryLimiter {
            &mut self.limiter
        }
    }

    fn test_state(sandbox: &WasmSandbox) -> TestState {
        TestState {
            limiter: WasmMemoryLimiter::from_limits(&sandbox.limits()),
        }
    }

    fn noop_module_wat() -> &'static str {
        r#"(module
            (func (export "main"))
        )"#
    }

    fn infinite_loop_wat() -> &'static str {
        r#"(module
            (func (export "main")
                (loop $loop
                    br $loop))
        )"#
    }

    #[test]
    fn sandbox_creation_succeeds() {
        assert!(WasmSandbox::with_defaults().is_ok());
    }

    #[test]
    fn compile_rejects_invalid_bytes() {
        let sandbox = WasmSandbox::with_defaults().expect("sandbox");
        let err = sandbox.compile(&[0x00, 0x01, 0x02]).unwrap_err();
        assert!(matches!(err, WasmError::CompilationError(_)));
    }

    #[test]
    fn valid_module_executes() {
        let sandbox = WasmSandbox::with_defaults().expect("sandbox");
        let bytes = wat::parse_str(noop_module_wat()).expect("wat");
        let module = sandbox.compile(&bytes).expect("compile");
        let linker = Linker::new(sandbox.engine());

        let mut instance = sandbox
            .instantiate(&module, &linker, test_state(&sandbox))
            .expect("instantiate");

        instance
            .call("main", sandbox.limits().max_fuel, 1_000)
            .expect("call");
    }

    #[test]
    fn infinite_loop_exhausts_fuel() {
        let sandbox = WasmSandbox::new(WasmResourceLimits::minimal()).expect("sandbox");
        let bytes = wat::parse_str(infinite_loop_wat()).expect("wat");
        let module = sandbox.compile(&bytes).expect("compile");
        let linker = Linker::new(sandbox.engine());

        let mut instance = sandbox
            .instantiate(&module, &linker, test_state(&sandbox))
            .expect("instantiate");

        let err = instance
            .call("main", sandbox.limits().max_fuel, 100_000)
            .unwrap_err();
        assert!(matches!(err, WasmError::FuelExhausted { .. }));
    }

    #[test]
    fn function_not_found_is_type_mismatch() {
        let sandbox = WasmSandbox::with_defaults().expect("sandbox");
        let bytes = wat::parse_str(noop_module_wat()).expect("wat");
        let module = sandbox.compile(&bytes).expect("compile");
        let linker = Linker::new(sandbox.engine());

        let mut instance = sandbox
            .instantiate(&module, &linker, test_state(&sandbox))
            .expect("instantiate");

        let err = instance
            .call("does_not_exist", sandbox.limits().max_fuel, 1_000)
            .unwrap_err();
        assert!(matches!(err, WasmError::TypeMismatch { .. }));
    }

    #[test]
    fn memory_bomb_is_rejected_by_limiter() {
        let sandbox = WasmSandbox::new(WasmResourceLimits::minimal()).expect("sandbox");
        let grow_module = r#"(module
            (memory (export "memory") 0 65536)
            (func (export "main")
                (drop (memory.grow (i32.const 60000)))))"#;
        let bytes = wat::parse_str(grow_module).expect("wat");
        let module = sandbox.compile(&bytes).expect("compile");
        let linker = Linker::new(sandbox.engine());

        let mut instance = sandbox
            .instantiate(&module, &linker, test_state(&sandbox))
            .expect("instantiate");

        // memory.grow returning -1 on rejection is not itself a trap, so a
        // well-behaved module just sees growth fail; the limiter having
        // refused growth is what we assert indirectly via usage staying 0.
        instance
            .call("main", sandbox.limits().max_fuel, 1_000)
            .expect("call");
        assert_eq!(instance.memory_usage(), 0);
    }

    #[test]
    fn module_exports_are_listed() {
        let sandbox = WasmSandbox::with_defaults().expect("sandbox");
        let bytes = wat::parse_str(noop_module_wat()).expect("wat");
        let module = sandbox.compile(&bytes).expect("compile");
        assert_eq!(module.exported_functions(), vec!["main".to_string()]);
    }

    #[test]
    fn tick_epoch_does_not_panic() {
        let sandbox = WasmSandbox::with_defaults().expect("sandbox");
        sandbox.tick_epoch();
        sandbox.tick_epoch();
    }
}
