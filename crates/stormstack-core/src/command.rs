//! Command queue types.
//!
//! A command is data, not code: `{ command_name, payload, target_tick }`.
//! Dispatching a command — looking up which installed module handles
//! `command_name` and invoking it inside the sandbox — is the job of the
//! match/container layer, which owns the module registry and the sandbox.
//! This crate only owns the queue discipline: admission order, per-tick
//! draining, and the overflow policy.
//!
//! # Architecture
//!
//! - [`QueuedCommand`]: an admitted, not-yet-dispatched command
//! - [`CommandQueue`]: per-match FIFO with a bounded capacity
//! - [`CommandResult`]: outcome envelope returned to the caller after dispatch
//!
//! # Example
//!
//! ```
//! use stormstack_core::command::CommandQueue;
//! use stormstack_core::id::UserId;
//!
//! let mut queue = CommandQueue::new(16);
//! queue
//!     .enqueue("move".to_string(), serde_json::json!({"dx": 1.0}), UserId::new(), 5, 3)
//!     .expect("enqueue");
//!
//! // Nothing is ready yet at tick 3: target_tick is 5.
//! assert!(queue.drain_ready(3).is_empty());
//! assert_eq!(queue.drain_ready(5).len(), 1);
//! ```

use crate::id::UserId;
use crate::{Result, StormError};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Result of dispatching a command.
///
/// Contains success/failure status along with optional message and data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    /// Whether the command executed successfully.
    pub success: bool,

    /// Optional human-readable message about the result.
    pub message: Option<String>,

    /// Optional structured data returned by the command.
    pub data: Option<serde_json::Value>,
}

impl CommandResult {
    /// Create a successful result with no additional data.
    #[must_use]
    pub fn success() -> Self {
        Self {
            success: true,
            message: None,
            data: None,
        }
    }

    /// Create a successful result with a message.
    #[must_use]
    pub fn success_with_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }

    /// Create a successful result with data.
    #[must_use]
    pub fn success_with_data(data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    /// Create a failure result with a message.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: None,
        }
    }

    /// Create a failure result with message and data.
    #[must_use]
    pub fn failure_with_data(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            data: Some(data),
        }
    }

    /// Check if the command succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Check if the command failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        !self.success
    }
}

impl Default for CommandResult {
    fn default() -> Self {
        Self::success()
    }
}

/// A command admitted to a match's queue, awaiting dispatch.
///
/// `command_name` and `payload` are opaque to this crate: they are matched
/// against a module's declared command table by the caller. `enqueued_order`
/// is a monotonically increasing admission counter, used to keep dispatch
/// order stable across ties on `target_tick`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedCommand {
    /// Name of the command, matched against a module's command table.
    pub command_name: String,

    /// Opaque command payload, interpreted by the handling module.
    pub payload: serde_json::Value,

    /// User who issued this command.
    pub user_id: UserId,

    /// Tick at which this command becomes eligible for dispatch.
    pub target_tick: u64,

    /// Admission order, assigned by the queue at `enqueue` time.
    pub enqueued_order: u64,
}

/// Queue of pending commands awaiting dispatch for a single match.
///
/// Commands are admitted via [`CommandQueue::enqueue`] and drained in
/// `(target_tick, enqueued_order)` order via [`CommandQueue::drain_ready`].
/// The queue has a fixed capacity: once full, further enqueues are rejected
/// rather than silently deferred, so the caller gets synchronous backpressure.
pub struct CommandQueue {
    queue: VecDeque<QueuedCommand>,
    capacity: usize,
    next_order: u64,
}

impl CommandQueue {
    /// Create a new empty command queue with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            next_order: 0,
        }
    }

    /// Admit a command for dispatch at `target_tick` or later.
    ///
    /// # Errors
    ///
    /// Returns [`StormError::InvalidState`] if `target_tick` is already in
    /// the past relative to `current_tick`, or [`StormError::ResourceExhausted`]
    /// if the queue is at capacity.
    pub fn enqueue(
        &mut self,
        command_name: String,
        payload: serde_json::Value,
        user_id: UserId,
        target_tick: u64,
        current_tick: u64,
    ) -> Result<()> {
        if target_tick < current_tick {
            return Err(StormError::InvalidState(format!(
                "target_tick {target_tick} is before current tick {current_tick}"
            )));
        }
        if self.queue.len() >= self.capacity {
            return Err(StormError::ResourceExhausted(format!(
                "command queue at capacity ({})",
                self.capacity
            )));
        }

        let enqueued_order = self.next_order;
        self.next_order += 1;

        trace!(
            "Admitting command '{}' from user {} for tick {} (order {})",
            command_name, user_id, target_tick, enqueued_order
        );

        self.queue.push_back(QueuedCommand {
            command_name,
            payload,
            user_id,
            target_tick,
            enqueued_order,
        });
        Ok(())
    }

    /// Remove and return every command whose `target_tick` is `<= current_tick`,
    /// in `(target_tick, enqueued_order)` order. Commands scheduled for a
    /// later tick remain in the queue.
    pub fn drain_ready(&mut self, current_tick: u64) -> Vec<QueuedCommand> {
        let mut ready = Vec::new();
        let mut pending = VecDeque::with_capacity(self.queue.len());

        while let Some(cmd) = self.queue.pop_front() {
            if cmd.target_tick <= current_tick {
                ready.push(cmd);
            } else {
                pending.push_back(cmd);
            }
        }
        self.queue = pending;

        ready.sort_by_key(|c| (c.target_tick, c.enqueued_order));

        if !ready.is_empty() {
            debug!(
                "Draining {} ready commands at tick {}",
                ready.len(),
                current_tick
            );
        }
        ready
    }

    /// Get the number of commands currently queued (ready or future-scheduled).
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Check if the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Maximum number of commands this queue will admit at once.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clear all commands from the queue without dispatching them.
    pub fn clear(&mut self) {
        let count = self.queue.len();
        if count > 0 {
            debug!("Clearing {} commands from queue", count);
        }
        self.queue.clear();
    }

    /// Iterate over queued commands (ready or future-scheduled) without removing them.
    pub fn iter(&self) -> impl Iterator<Item = &QueuedCommand> {
        self.queue.iter()
    }
}

impl std::fmt::Debug for CommandQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandQueue")
            .field("len", &self.queue.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // CommandResult tests
    // =========================================================================

    #[test]
    fn command_result_success() {
        let result = CommandResult::success();
        assert!(result.is_success());
        assert!(!result.is_failure());
        assert!(result.message.is_none());
        assert!(result.data.is_none());
    }

    #[test]
    fn command_result_success_with_message() {
        let result = CommandResult::success_with_message("Done!");
        assert!(result.is_success());
        assert_eq!(result.message, Some("Done!".to_string()));
    }

    #[test]
    fn command_result_failure_with_data() {
        let result = CommandResult::failure_with_data("Error", serde_json::json!({"code": 42}));
        assert!(result.is_failure());
        assert_eq!(result.data, Some(serde_json::json!({"code": 42})));
    }

    #[test]
    fn command_result_serialization() {
        let result = CommandResult::success_with_data(serde_json::json!({"x": 1}));
        let json = serde_json::to_string(&result).expect("serialize");
        let parsed: CommandResult = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(result.success, parsed.success);
        assert_eq!(result.data, parsed.data);
    }

    // =========================================================================
    // CommandQueue tests
    // =========================================================================

    #[test]
    fn enqueue_and_drain_ready_at_current_tick() {
        let mut queue = CommandQueue::new(10);
        let user_id = UserId::new();

        queue
            .enqueue("move".to_string(), serde_json::json!({}), user_id, 5, 5)
            .expect("enqueue");
        assert_eq!(queue.len(), 1);

        let ready = queue.drain_ready(5);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].command_name, "move");
        assert!(queue.is_empty());
    }

    #[test]
    fn future_scheduled_commands_stay_queued() {
        let mut queue = CommandQueue::new(10);
        let user_id = UserId::new();

        queue
            .enqueue("spell".to_string(), serde_json::json!({}), user_id, 10, 3)
            .expect("enqueue");

        assert!(queue.drain_ready(3).is_empty());
        assert!(queue.drain_ready(9).is_empty());
        assert_eq!(queue.drain_ready(10).len(), 1);
    }

    #[test]
    fn enqueue_rejects_target_tick_in_the_past() {
        let mut queue = CommandQueue::new(10);
        let user_id = UserId::new();

        let err = queue
            .enqueue("move".to_string(), serde_json::json!({}), user_id, 2, 5)
            .unwrap_err();
        assert!(matches!(err, StormError::InvalidState(_)));
    }

    #[test]
    fn enqueue_rejects_when_at_capacity() {
        let mut queue = CommandQueue::new(2);
        let user_id = UserId::new();

        queue
            .enqueue("a".to_string(), serde_json::json!({}), user_id, 0, 0)
            .expect("first");
        queue
            .enqueue("b".to_string(), serde_json::json!({}), user_id, 0, 0)
            .expect("second");

        let err = queue
            .enqueue("c".to_string(), serde_json::json!({}), user_id, 0, 0)
            .unwrap_err();
        assert!(matches!(err, StormError::ResourceExhausted(_)));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn drain_ready_preserves_admission_order_within_same_tick() {
        let mut queue = CommandQueue::new(10);
        let user_id = UserId::new();

        for i in 0..3 {
            queue
                .enqueue(format!("cmd{i}"), serde_json::json!({}), user_id, 0, 0)
                .expect("enqueue");
        }

        let ready = queue.drain_ready(0);
        let names: Vec<_> = ready.iter().map(|c| c.command_name.clone()).collect();
        assert_eq!(names, vec!["cmd0", "cmd1", "cmd2"]);
    }

    #[test]
    fn drain_ready_orders_earlier_target_ticks_first() {
        let mut queue = CommandQueue::new(10);
        let user_id = UserId::new();

        queue
            .enqueue("late".to_string(), serde_json::json!({}), user_id, 5, 0)
            .expect("enqueue");
        queue
            .enqueue("early".to_string(), serde_json::json!({}), user_id, 2, 0)
            .expect("enqueue");

        let ready = queue.drain_ready(5);
        let names: Vec<_> = ready.iter().map(|c| c.command_name.clone()).collect();
        assert_eq!(names, vec!["early", "late"]);
    }

    #[test]
    fn freed_capacity_after_drain_allows_further_enqueue() {
        let mut queue = CommandQueue::new(1);
        let user_id = UserId::new();

        queue
            .enqueue("a".to_string(), serde_json::json!({}), user_id, 0, 0)
            .expect("first");
        assert!(queue
            .enqueue("b".to_string(), serde_json::json!({}), user_id, 0, 0)
            .is_err());

        queue.drain_ready(0);
        queue
            .enqueue("c".to_string(), serde_json::json!({}), user_id, 1, 1)
            .expect("after drain");
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn clear_empties_queue() {
        let mut queue = CommandQueue::new(10);
        let user_id = UserId::new();

        queue
            .enqueue("a".to_string(), serde_json::json!({}), user_id, 0, 0)
            .expect("enqueue");
        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn capacity_reports_configured_value() {
        let queue = CommandQueue::new(42);
        assert_eq!(queue.capacity(), 42);
    }

    #[test]
    fn iter_does_not_remove_commands() {
        let mut queue = CommandQueue::new(10);
        let user_id = UserId::new();
        queue
            .enqueue("a".to_string(), serde_json::json!({}), user_id, 0, 0)
            .expect("enqueue");

        assert_eq!(queue.iter().count(), 1);
        assert_eq!(queue.len(), 1);
    }
}
