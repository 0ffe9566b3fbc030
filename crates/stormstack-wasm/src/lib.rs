//! # StormStack WASM Sandbox
//!
//! Secure WASM sandbox for executing untrusted game modules.
//!
//! ## Security Features
//!
//! - **Fuel metering**: Limits instruction count to prevent infinite loops
//! - **Epoch interruption**: Wall-clock timeout backup
//! - **Memory limits**: Prevents memory exhaustion attacks
//! - **Capability-based security**: Zero capabilities by default
//!
//! ## CRITICAL SECURITY NOTES
//!
//! This crate executes UNTRUSTED code from users. All security tests
//! MUST pass before any integration:
//!
//! - Memory escape attempts must be blocked
//! - Infinite loops must be terminated
//! - Memory bombs must be prevented
//! - Stack overflows must be handled
//! - Host function inputs must be validated
//!
//! See `docs/migration/WASM_HOST_FUNCTIONS.md` for the security model.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod limits;
pub mod sandbox;

pub use limits::WasmResourceLimits;
pub use sandbox::{SandboxState, WasmInstance, WasmMemoryLimiter, WasmModule, WasmSandbox};
