//! Error types for StormStack.
//!
//! Provides a unified error hierarchy:
//! - `StormError`: top-level error type, tagged with an [`ErrorKind`] so
//!   transport boundaries can map failures to wire codes without string
//!   matching.
//! - `ModuleError`: module registry/manifest/dependency errors.
//! - `WasmError`: WASM sandbox execution errors.

use crate::id::{ComponentTypeId, ConnectionId, ContainerId, EntityId, MatchId, ModuleId};
use thiserror::Error;

/// The eight distinguishable error kinds surfaced at every ingress/egress
/// envelope boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Container/match/entity/module absent.
    NotFound,
    /// Operation not permitted in current lifecycle state.
    InvalidState,
    /// Malformed payload or schema mismatch.
    InvalidInput,
    /// Capability or claims absent.
    Unauthorized,
    /// Queue overflow, or fuel/memory/epoch exhaustion for a module invocation.
    ResourceExhausted,
    /// Capability violation, trap, or other untrusted-code fault.
    Sandbox,
    /// Store invariant breach; fatal to the owning match.
    StoreCorruption,
    /// Downstream delivery failure, surfaced only at the router boundary.
    Transport,
}

/// Top-level error type for StormStack operations.
#[derive(Debug, Error)]
pub enum StormError {
    /// Entity was not found in the ECS world.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Container was not found.
    #[error("Container not found: {0}")]
    ContainerNotFound(ContainerId),

    /// Match was not found.
    #[error("Match not found: {0}")]
    MatchNotFound(MatchId),

    /// Module was not found.
    #[error("Module not found: {0}")]
    ModuleNotFound(ModuleId),

    /// Component type referenced is not declared by any installed module.
    #[error("Unknown component type: {0}")]
    UnknownComponent(ComponentTypeId),

    /// Command name referenced is not declared by any installed module.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// WebSocket connection was not found.
    #[error("Connection not found: {0}")]
    ConnectionNotFound(ConnectionId),

    /// WebSocket connection was closed.
    #[error("Connection closed: {0}")]
    ConnectionClosed(ConnectionId),

    /// Module registry / manifest / dependency error.
    #[error("Module error: {0}")]
    Module(#[from] ModuleError),

    /// WASM execution error (a distinguished [`ErrorKind::Sandbox`] fault).
    #[error("WASM execution failed: {0}")]
    Wasm(#[from] WasmError),

    /// Invalid state transition or operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Malformed payload or schema mismatch.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Capability or claims absent.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource limit exceeded (queue capacity, id space, fuel, memory).
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Store invariant breach; fatal to the owning match only.
    #[error("Store corruption: {0}")]
    StoreCorruption(String),

    /// Downstream delivery failure at the subscription router boundary.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error (catch-all).
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl StormError {
    /// Classify this error into one of the eight envelope-level kinds.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            StormError::EntityNotFound(_)
            | StormError::ContainerNotFound(_)
            | StormError::MatchNotFound(_)
            | StormError::ModuleNotFound(_)
            | StormError::UnknownComponent(_)
            | StormError::UnknownCommand(_)
            | StormError::ConnectionNotFound(_) => ErrorKind::NotFound,

            StormError::Module(ModuleError::CircularDependency(_)
            | ModuleError::DependencyNotSatisfied { .. }
            | ModuleError::VersionConflict { .. }) => ErrorKind::InvalidState,
            StormError::Module(ModuleError::NotFound(_)) => ErrorKind::NotFound,
            StormError::Module(ModuleError::ManifestMismatch(_)) => ErrorKind::InvalidInput,

            StormError::Wasm(e) if e.is_resource_exhaustion() => ErrorKind::ResourceExhausted,
            StormError::Wasm(_) => ErrorKind::Sandbox,

            StormError::InvalidState(_) | StormError::ConnectionClosed(_) => {
                ErrorKind::InvalidState
            }
            StormError::InvalidInput(_) | StormError::Serialization(_) => ErrorKind::InvalidInput,
            StormError::Unauthorized(_) => ErrorKind::Unauthorized,
            StormError::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            StormError::StoreCorruption(_) => ErrorKind::StoreCorruption,
            StormError::Transport(_) => ErrorKind::Transport,
            StormError::Configuration(_) | StormError::Internal(_) => ErrorKind::InvalidState,
        }
    }
}

/// Module registry, manifest, and dependency resolution errors.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// Referenced module is not registered.
    #[error("Module not found: {0}")]
    NotFound(String),

    /// Dependency graph contains a cycle.
    #[error("Circular dependency detected involving module: {0}")]
    CircularDependency(String),

    /// A declared dependency is not installed.
    #[error("Module '{module}' depends on unsatisfied module '{dependency}'")]
    DependencyNotSatisfied {
        /// Dependent module name.
        module: String,
        /// Missing dependency name.
        dependency: String,
    },

    /// A declared dependency version constraint is not met.
    #[error("Version conflict for '{name}': required {required}, found {found}")]
    VersionConflict {
        /// Dependency name.
        name: String,
        /// Required version constraint, rendered for display.
        required: String,
        /// Version actually registered.
        found: String,
    },

    /// The compiled artifact does not match its declared manifest.
    #[error("Manifest mismatch: {0}")]
    ManifestMismatch(String),
}

/// WASM sandbox execution errors.
///
/// These errors indicate issues with WASM module execution,
/// including security-related resource exhaustion.
#[derive(Debug, Error)]
pub enum WasmError {
    /// WASM module failed to compile.
    #[error("Failed to compile module: {0}")]
    CompilationError(String),

    /// WASM module failed to instantiate.
    #[error("Failed to instantiate module: {0}")]
    InstantiationError(String),

    /// Fuel (instruction count) limit exceeded.
    #[error("Fuel exhausted after {consumed} fuel units")]
    FuelExhausted {
        /// Amount of fuel consumed before exhaustion.
        consumed: u64,
    },

    /// Epoch deadline (wall-clock time) exceeded.
    #[error("Epoch deadline exceeded")]
    EpochDeadlineExceeded,

    /// Memory allocation limit exceeded.
    #[error("Memory limit exceeded: requested {requested} bytes, limit {limit} bytes")]
    MemoryLimitExceeded {
        /// Requested allocation size.
        requested: usize,
        /// Maximum allowed size.
        limit: usize,
    },

    /// Requested function not found in module.
    #[error("Function not found: {0}")]
    FunctionNotFound(String),

    /// Type mismatch in function call.
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected type description.
        expected: String,
        /// Actual type description.
        actual: String,
    },

    /// WASM trap (runtime error).
    #[error("Trap: {0}")]
    Trap(String),

    /// Invalid input received from WASM module.
    #[error("Invalid input from WASM: {0}")]
    InvalidInput(String),

    /// Stack overflow in WASM execution.
    #[error("Stack overflow")]
    StackOverflow,

    /// Module code called a host function outside its declared capabilities.
    #[error("Capability violation: operation '{operation}' requires capability '{capability}'")]
    CapabilityViolation {
        /// Attempted operation name.
        operation: String,
        /// Capability that would have permitted it.
        capability: String,
    },
}

impl WasmError {
    /// Check if this error is a resource exhaustion error.
    ///
    /// Resource exhaustion errors indicate the WASM module hit
    /// a security limit rather than having a bug.
    #[must_use]
    pub fn is_resource_exhaustion(&self) -> bool {
        matches!(
            self,
            WasmError::FuelExhausted { .. }
                | WasmError::EpochDeadlineExceeded
                | WasmError::MemoryLimitExceeded { .. }
                | WasmError::StackOverflow
        )
    }

    /// Check if this error represents an untrusted-code capability fault,
    /// as distinguished from a resource-exhaustion fault (both map to the
    /// envelope-level `Sandbox`/`ResourceExhausted` kinds, but callers that
    /// track per-module failure budgets want to know which).
    #[must_use]
    pub fn is_capability_violation(&self) -> bool {
        matches!(self, WasmError::CapabilityViolation { .. })
    }
}
