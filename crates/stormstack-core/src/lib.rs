//! # StormStack Core
//!
//! Core types, traits, and error definitions shared across all StormStack crates.
//!
//! This crate provides:
//! - Strongly-typed identifiers (`EntityId`, `ContainerId`, `MatchId`, etc.)
//! - Common error types (`StormError`, `ErrorKind`, `ModuleError`, `WasmError`)
//! - The command queue and admission context shared between the server and
//!   transport crates
//! - Snapshot/delta DTOs used to stream ECS world state

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod admission;
pub mod command;
pub mod config;
pub mod error;
pub mod id;
pub mod snapshot;

pub use admission::AdmissionContext;
pub use command::{CommandQueue, CommandResult, QueuedCommand};
pub use config::{ContainerConfig, MatchConfig, ResourceBudget, ServerConfig};
pub use error::{ErrorKind, ModuleError, StormError, WasmError};
pub use id::{
    ComponentTypeId, ConnectionId, ContainerId, EntityId, MatchId, ModuleId, PlayerId, ResourceId,
    SessionId, SubscriberId, TenantId, UserId,
};
pub use snapshot::{ComponentUpdate, ComponentValue, EntitySnapshot, WorldDelta, WorldSnapshot};

/// Re-export common result type
pub type Result<T> = std::result::Result<T, StormError>;
