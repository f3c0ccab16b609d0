//! Override change notification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tenantry_core::TenantId;
use tenantry_policy::OverrideMap;

/// Broadcast after a tenant's override blob was persisted.
///
/// Carries the **full** new override map, not a delta, so applying the same
/// notification twice is a no-op.
///
/// Wire shape: `{ "tenantId": "...", "overrides": { "flag": bool }, "updatedAt": "..." }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverrideChanged {
    pub tenant_id: TenantId,
    pub overrides: OverrideMap,
    /// Server-assigned timestamp of the write.
    pub updated_at: DateTime<Utc>,
}

impl OverrideChanged {
    pub fn new(tenant_id: TenantId, overrides: OverrideMap, updated_at: DateTime<Utc>) -> Self {
        Self {
            tenant_id,
            overrides,
            updated_at,
        }
    }
}
