//! Test fixtures and builders.

use stormstack_core::{AdmissionContext, TenantId, UserId};

/// Create an admission context for an ordinary player.
#[must_use]
pub fn player_context() -> AdmissionContext {
    AdmissionContext::new(TenantId::new(), UserId::new(), vec!["player".to_string()])
}

/// Create an admission context with operator privileges (pause/resume,
/// module install/uninstall).
#[must_use]
pub fn operator_context() -> AdmissionContext {
    AdmissionContext::new(TenantId::new(), UserId::new(), vec!["operator".to_string()])
}

/// Create an admission context scoped to a specific tenant.
#[must_use]
pub fn tenant_context(tenant_id: TenantId) -> AdmissionContext {
    AdmissionContext::new(tenant_id, UserId::new(), vec!["player".to_string()])
}
