//! Test harness for isolated testing.

use stormstack_core::TenantId;
use stormstack_ecs::{ComponentStore, EntityIdAllocator};

/// Test harness providing an isolated test environment: a tenant identity
/// and a freshly allocated component store, the way a single-match test
/// would see them inside a container.
pub struct TestHarness {
    /// Tenant ID for this test.
    pub tenant_id: TenantId,
    /// Component store for this test.
    pub store: ComponentStore,
}

impl TestHarness {
    /// Create a new test harness with its own entity allocator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tenant_id: TenantId::new(),
            store: ComponentStore::new(EntityIdAllocator::new()),
        }
    }

    /// Create a test harness with a specific tenant.
    #[must_use]
    pub fn with_tenant(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            store: ComponentStore::new(EntityIdAllocator::new()),
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
