use tenantry_core::TenantId;

use crate::OverrideChanged;

/// Messages that belong to exactly one tenant.
///
/// The bus is shared by all tenants; subscribers use this to drop messages
/// for workspaces they are not rendering.
pub trait TenantScoped {
    fn tenant_id(&self) -> &TenantId;

    fn is_for(&self, tenant_id: &TenantId) -> bool {
        self.tenant_id() == tenant_id
    }
}

impl TenantScoped for OverrideChanged {
    fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }
}
