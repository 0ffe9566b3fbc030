//! Host function implementations.
//!
//! Each function follows the security model:
//! - Validates all inputs from WASM
//! - Is tenant-scoped
//! - Checks the calling module's granted capability before touching store
//!   state
//! - Has rate limits where applicable

use crate::state::{LogEntry, LogLevel, WasmState};
use stormstack_core::{ComponentTypeId, ComponentValue, EntityId, WasmError};
use tracing::{debug, trace, warn};
use wasmtime::{Caller, Linker};

/// Maximum log message size in bytes.
const MAX_LOG_SIZE: usize = 1024;
/// Maximum number of entities a single `query_entities` call may request.
const MAX_QUERY_TYPES: usize = 32;

/// Result code for success.
const RESULT_OK: i32 = 0;
/// Result code for rate limit exceeded.
const RESULT_RATE_LIMITED: i32 = -1;
/// Result code for invalid memory access.
const RESULT_INVALID_MEMORY: i32 = -2;
/// Result code for entity not found.
const RESULT_NOT_FOUND: i32 = -3;
/// Result code for no store attached.
const RESULT_NO_STORE: i32 = -4;
/// Result code for invalid UTF-8.
const RESULT_INVALID_UTF8: i32 = -5;
/// Result code for a capability the calling module was not granted.
const RESULT_CAPABILITY_DENIED: i32 = -6;
/// Result code for an unknown component type.
const RESULT_UNKNOWN_COMPONENT: i32 = -7;

/// Register all core host functions with the linker.
///
/// # Errors
///
/// Returns an error if registration fails.
pub fn register_host_functions(linker: &mut Linker<WasmState>) -> Result<(), WasmError> {
    macro_rules! register {
        ($name:literal, $func:expr) => {
            linker
                .func_wrap("env", $name, $func)
                .map_err(|e| WasmError::InstantiationError(format!("Failed to register {}: {e}", $name)))?;
        };
    }

    register!("log_debug", host_log_debug);
    register!("log_info", host_log_info);
    register!("log_warn", host_log_warn);
    register!("log_error", host_log_error);

    register!("get_tick", host_get_tick);
    register!("get_delta_time", host_get_delta_time);

    register!("entity_spawn", host_entity_spawn);
    register!("entity_despawn", host_entity_despawn);
    register!("entity_exists", host_entity_exists);

    register!("component_get_f32", host_component_get_f32);
    register!("component_get_handle", host_component_get_handle);
    register!("component_set_f32", host_component_set_f32);
    register!("component_set_handle", host_component_set_handle);
    register!("component_has", host_component_has);

    register!("query_entities", host_query_entities);

    register!("random_u32", host_random_u32);
    register!("random_f32", host_random_f32);
    register!("random_range", host_random_range);

    register!("command_payload_len", host_command_payload_len);
    register!("command_payload_read", host_command_payload_read);

    debug!("Registered all core host functions");
    Ok(())
}

/// Read a string from WASM memory with bounds checking.
fn read_wasm_string(caller: &mut Caller<'_, WasmState>, ptr: i32, len: i32) -> Result<String, i32> {
    let bytes = read_wasm_bytes(caller, ptr, len, MAX_LOG_SIZE)?;
    String::from_utf8(bytes).map_err(|_| RESULT_INVALID_UTF8)
}

/// Read raw bytes from WASM memory with bounds checking, truncated to `max_len`.
fn read_wasm_bytes(
    caller: &mut Caller<'_, WasmState>,
    ptr: i32,
    len: i32,
    max_len: usize,
) -> Result<Vec<u8>, i32> {
    if ptr < 0 || len < 0 {
        return Err(RESULT_INVALID_MEMORY);
    }

    let memory = caller
        .get_export("memory")
        .and_then(|e| e.into_memory())
        .ok_or(RESULT_INVALID_MEMORY)?;

    let data = memory.data(caller);
    let start = ptr as usize;
    let length = (len as usize).min(max_len);

    if start.saturating_add(length) > data.len() {
        return Err(RESULT_INVALID_MEMORY);
    }

    Ok(data[start..start + length].to_vec())
}

/// Write raw bytes into WASM memory with bounds checking.
fn write_wasm_bytes(caller: &mut Caller<'_, WasmState>, ptr: i32, bytes: &[u8]) -> Result<(), i32> {
    if ptr < 0 {
        return Err(RESULT_INVALID_MEMORY);
    }

    let memory = caller
        .get_export("memory")
        .and_then(|e| e.into_memory())
        .ok_or(RESULT_INVALID_MEMORY)?;

    let start = ptr as usize;
    let data_len = memory.data(&mut *caller).len();
    if start.saturating_add(bytes.len()) > data_len {
        return Err(RESULT_INVALID_MEMORY);
    }

    memory.data_mut(caller)[start..start + bytes.len()].copy_from_slice(bytes);
    Ok(())
}

// ============================================================================
// Logging Functions
// ============================================================================

fn log_with_level(mut caller: Caller<'_, WasmState>, ptr: i32, len: i32, level: LogLevel) -> i32 {
    let state = caller.data_mut();
    if !state.rate_limits.can_log() {
        return RESULT_RATE_LIMITED;
    }
    state.rate_limits.log_calls += 1;
    let tick = state.current_tick;

    let message = match read_wasm_string(&mut caller, ptr, len) {
        Ok(msg) => msg,
        Err(code) => return code,
    };

    caller.data_mut().log_buffer.push(LogEntry {
        level,
        message: message.clone(),
        tick,
    });

    trace!("[WASM {:?}] {}", level, message);
    RESULT_OK
}

fn host_log_debug(caller: Caller<'_, WasmState>, ptr: i32, len: i32) -> i32 {
    log_with_level(caller, ptr, len, LogLevel::Debug)
}

fn host_log_info(caller: Caller<'_, WasmState>, ptr: i32, len: i32) -> i32 {
    log_with_level(caller, ptr, len, LogLevel::Info)
}

fn host_log_warn(caller: Caller<'_, WasmState>, ptr: i32, len: i32) -> i32 {
    log_with_level(caller, ptr, len, LogLevel::Warn)
}

fn host_log_error(caller: Caller<'_, WasmState>, ptr: i32, len: i32) -> i32 {
    log_with_level(caller, ptr, len, LogLevel::Error)
}

// ============================================================================
// Time Functions
// ============================================================================

fn host_get_tick(caller: Caller<'_, WasmState>) -> i64 {
    caller.data().current_tick as i64
}

fn host_get_delta_time(caller: Caller<'_, WasmState>) -> f64 {
    caller.data().delta_time
}

// ============================================================================
// Entity Functions
// ============================================================================

fn host_entity_spawn(mut caller: Caller<'_, WasmState>) -> i64 {
    let state = caller.data_mut();
    if !state.capabilities.can_spawn_entities {
        warn!("Module denied entity_spawn capability");
        return -1;
    }
    if !state.rate_limits.can_spawn() {
        warn!("Entity spawn rate limit exceeded");
        return -1;
    }
    state.rate_limits.spawn_calls += 1;

    let store_ref = match &state.store {
        Some(s) => s.clone(),
        None => return -1,
    };

    match store_ref.write().spawn() {
        Ok(entity) => {
            trace!("WASM spawned entity {:?}", entity);
            entity.0 as i64
        }
        Err(_) => -1,
    }
}

fn host_entity_despawn(caller: Caller<'_, WasmState>, id: i64) -> i32 {
    if id < 0 {
        return RESULT_INVALID_MEMORY;
    }
    let state = caller.data();
    if !state.capabilities.can_despawn_entities {
        return RESULT_CAPABILITY_DENIED;
    }
    let store_ref = match &state.store {
        Some(s) => s.clone(),
        None => return RESULT_NO_STORE,
    };

    match store_ref.write().despawn(EntityId(id as u64)) {
        Ok(()) => RESULT_OK,
        Err(_) => RESULT_NOT_FOUND,
    }
}

fn host_entity_exists(caller: Caller<'_, WasmState>, id: i64) -> i32 {
    if id < 0 {
        return 0;
    }
    let store_ref = match &caller.data().store {
        Some(s) => s.clone(),
        None => return 0,
    };
    i32::from(store_ref.read().exists(EntityId(id as u64)))
}

// ============================================================================
// Component Functions
// ============================================================================

fn host_component_get_f32(caller: Caller<'_, WasmState>, entity: i64, component_type: i32) -> f32 {
    component_get(&caller, entity, component_type).and_then(|v| v.as_float()).unwrap_or(0.0)
}

fn host_component_get_handle(caller: Caller<'_, WasmState>, entity: i64, component_type: i32) -> i64 {
    component_get(&caller, entity, component_type).and_then(|v| v.as_handle()).unwrap_or(0)
}

fn component_get(caller: &Caller<'_, WasmState>, entity: i64, component_type: i32) -> Option<ComponentValue> {
    if entity < 0 || component_type < 0 {
        return None;
    }
    let store_ref = caller.data().store.as_ref()?.clone();
    let store = store_ref.read();
    store.get(EntityId(entity as u64), ComponentTypeId(component_type as u64))
}

fn host_component_has(caller: Caller<'_, WasmState>, entity: i64, component_type: i32) -> i32 {
    if entity < 0 || component_type < 0 {
        return 0;
    }
    let store_ref = match &caller.data().store {
        Some(s) => s.clone(),
        None => return 0,
    };
    i32::from(store_ref.read().has(EntityId(entity as u64), ComponentTypeId(component_type as u64)))
}

fn component_set(
    caller: &mut Caller<'_, WasmState>,
    entity: i64,
    component_type: i32,
    value: ComponentValue,
) -> i32 {
    if entity < 0 || component_type < 0 {
        return RESULT_INVALID_MEMORY;
    }
    let state = caller.data_mut();
    if !state.capabilities.can_write_components {
        return RESULT_CAPABILITY_DENIED;
    }
    if !state.rate_limits.can_write_component() {
        return RESULT_RATE_LIMITED;
    }
    state.rate_limits.component_write_calls += 1;

    let store_ref = match &state.store {
        Some(s) => s.clone(),
        None => return RESULT_NO_STORE,
    };

    let entity_id = EntityId(entity as u64);
    let type_id = ComponentTypeId(component_type as u64);
    match store_ref.write().attach(entity_id, type_id, value) {
        Ok(()) => RESULT_OK,
        Err(stormstack_core::StormError::EntityNotFound(_)) => RESULT_NOT_FOUND,
        Err(stormstack_core::StormError::UnknownComponent(_)) => RESULT_UNKNOWN_COMPONENT,
        Err(_) => RESULT_INVALID_MEMORY,
    }
}

fn host_component_set_f32(
    mut caller: Caller<'_, WasmState>,
    entity: i64,
    component_type: i32,
    value: f32,
) -> i32 {
    component_set(&mut caller, entity, component_type, ComponentValue::Float(value))
}

fn host_component_set_handle(
    mut caller: Caller<'_, WasmState>,
    entity: i64,
    component_type: i32,
    value: i64,
) -> i32 {
    component_set(&mut caller, entity, component_type, ComponentValue::Handle(value))
}

// ============================================================================
// Query Functions
// ============================================================================

/// Reads `count` little-endian `u64` component type ids from
/// `types_ptr`, queries the store for entities bound to all of them, and
/// writes the matching `EntityId`s (as little-endian `u64`) into
/// `out_ptr`, up to `out_capacity` entries.
///
/// Returns the number of entities written, or a negative result code.
fn host_query_entities(
    mut caller: Caller<'_, WasmState>,
    types_ptr: i32,
    types_count: i32,
    out_ptr: i32,
    out_capacity: i32,
) -> i32 {
    if types_count < 0 || out_capacity < 0 || types_count as usize > MAX_QUERY_TYPES {
        return RESULT_INVALID_MEMORY;
    }

    {
        let state = caller.data_mut();
        if !state.capabilities.can_query_entities {
            return RESULT_CAPABILITY_DENIED;
        }
        if !state.rate_limits.can_query() {
            return RESULT_RATE_LIMITED;
        }
        state.rate_limits.query_calls += 1;
    }

    let type_bytes = match read_wasm_bytes(&mut caller, types_ptr, types_count * 8, MAX_QUERY_TYPES * 8) {
        Ok(b) => b,
        Err(code) => return code,
    };
    let types: Vec<ComponentTypeId> = type_bytes
        .chunks_exact(8)
        .map(|c| ComponentTypeId(u64::from_le_bytes(c.try_into().unwrap())))
        .collect();

    let store_ref = match &caller.data().store {
        Some(s) => s.clone(),
        None => return RESULT_NO_STORE,
    };
    let matches = store_ref.read().query(&types);

    let written = matches.len().min(out_capacity as usize);
    let mut out_bytes = Vec::with_capacity(written * 8);
    for entity in &matches[..written] {
        out_bytes.extend_from_slice(&entity.0.to_le_bytes());
    }

    if let Err(code) = write_wasm_bytes(&mut caller, out_ptr, &out_bytes) {
        return code;
    }

    written as i32
}

// ============================================================================
// Random Functions
// ============================================================================

fn host_random_u32(mut caller: Caller<'_, WasmState>) -> i32 {
    caller.data_mut().random_u32() as i32
}

fn host_random_f32(mut caller: Caller<'_, WasmState>) -> f32 {
    caller.data_mut().random_f32()
}

fn host_random_range(mut caller: Caller<'_, WasmState>, min: i32, max: i32) -> i32 {
    caller.data_mut().random_range(min, max)
}
