//! Bridges inbound WebSocket commands to a running container's command queue.
//!
//! `stormstack-ws` defines the wire-level [`CommandDispatcher`] trait but has
//! no notion of containers or matches; this module is the one place those
//! two layers meet.

use std::sync::Arc;

use stormstack_core::{MatchId, Result, UserId};
use stormstack_ws::{Command, CommandDispatcher};
use tracing::trace;

use crate::container::SharedContainerService;

/// Forwards WebSocket commands into the owning match's [`CommandQueue`](stormstack_core::command::CommandQueue)
/// via [`ContainerService::dispatch_command`](crate::container::ContainerService::dispatch_command).
///
/// The wire protocol does not currently carry a caller identity through to
/// this boundary (admission-time auth is an external collaborator), so
/// commands are attributed to a freshly minted [`UserId`] per call.
pub struct ContainerCommandDispatcher {
    containers: SharedContainerService,
}

impl ContainerCommandDispatcher {
    /// Wrap a container service so it can be handed to [`stormstack_ws::WsHandler`].
    #[must_use]
    pub fn new(containers: SharedContainerService) -> Self {
        Self { containers }
    }
}

impl CommandDispatcher for ContainerCommandDispatcher {
    fn dispatch(&self, match_id: MatchId, command: Command) -> Result<()> {
        trace!(
            "dispatching command '{}' to match {:?}",
            command.command_name, match_id
        );
        self.containers.dispatch_command(
            match_id,
            command.command_name,
            command.payload,
            UserId::new(),
            command.target_tick,
        )
    }
}

/// Shared, `Arc`-wrapped dispatcher, the form [`WsHandler::with_dispatcher`](stormstack_ws::WsHandler::with_dispatcher) expects.
#[must_use]
pub fn container_command_dispatcher(containers: SharedContainerService) -> Arc<ContainerCommandDispatcher> {
    Arc::new(ContainerCommandDispatcher::new(containers))
}
