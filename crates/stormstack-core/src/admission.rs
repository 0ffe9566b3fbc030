//! Admission context: the claims an external auth provider hands in at the
//! ingress boundary.
//!
//! StormStack does not authenticate anyone itself — that is explicitly out
//! of scope. Every entry point that needs to know who is asking (command
//! submission, subscription, container administration) takes an
//! [`AdmissionContext`] that the transport layer is responsible for having
//! already validated.

use crate::id::{TenantId, UserId};
use serde::{Deserialize, Serialize};

/// Pre-validated claims about the caller of an operation.
///
/// Constructed by the transport layer from whatever external auth mechanism
/// it uses (a JWT, a session cookie, a service token); StormStack only
/// consumes the resulting fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionContext {
    /// Tenant the caller is scoped to.
    pub tenant_id: TenantId,
    /// Authenticated user identifier.
    pub user_id: UserId,
    /// Role names granted to this caller, checked against capability gates.
    pub roles: Vec<String>,
}

impl AdmissionContext {
    /// Create a new admission context.
    #[must_use]
    pub fn new(tenant_id: TenantId, user_id: UserId, roles: Vec<String>) -> Self {
        Self {
            tenant_id,
            user_id,
            roles,
        }
    }

    /// Check whether the caller holds the named role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}
