//! # StormStack Server
//!
//! Integration crate wiring the engine core together:
//! - [`container`]: execution containers, the `wasmtime` sandbox, and per-tenant match sets
//! - [`match_engine`]: per-match tick/command-dispatch state machine
//! - [`game_loop`]: the fixed-rate driver that ticks every container and publishes snapshots
//! - [`commands`]: bridges inbound WebSocket commands into a match's command queue
//! - [`resources`]: tenant-isolated storage for WASM modules and other game assets
//! - [`session`]: player session tracking independent of any one WebSocket connection
//! - [`server`]: top-level wiring and the subscription router
//!
//! HTTP/WebSocket transport and authentication are external collaborators:
//! this crate exposes [`server::Server::ws_handler`] for a transport layer
//! to drive per connection, but does not itself listen on a socket.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod commands;
pub mod container;
pub mod game_loop;
pub mod match_engine;
pub mod resources;
pub mod server;
pub mod session;

pub use container::{shared_container_service, Container, ContainerService, SharedContainerService};
pub use game_loop::{GameLoop, GameLoopConfig};
pub use match_engine::{Match, MatchErrorEvent, MatchState};
pub use server::Server;
pub use stormstack_core::ServerConfig;
