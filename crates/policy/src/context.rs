//! Explicit policy context.
//!
//! Holds the two immutable layers (platform policy and every tenant's static
//! config) so callers pass configuration in instead of reaching for globals.

use std::collections::HashMap;
use std::sync::Arc;

use tenantry_core::TenantId;

use crate::{
    EffectiveFlagSet, FlagKey, FlagResolution, OverrideMap, PlatformPolicy, PolicyViolation,
    TenantStaticConfig, check_override, explain, resolve,
};

#[derive(Debug, Clone, Default)]
pub struct PolicyContext {
    platform: Arc<PlatformPolicy>,
    tenants: Arc<HashMap<TenantId, TenantStaticConfig>>,
}

impl PolicyContext {
    pub fn new(platform: PlatformPolicy, tenants: HashMap<TenantId, TenantStaticConfig>) -> Self {
        Self {
            platform: Arc::new(platform),
            tenants: Arc::new(tenants),
        }
    }

    pub fn platform(&self) -> &PlatformPolicy {
        &self.platform
    }

    pub fn static_config(&self, tenant_id: &TenantId) -> Option<&TenantStaticConfig> {
        self.tenants.get(tenant_id)
    }

    pub fn resolve_for(&self, tenant_id: &TenantId, overrides: Option<&OverrideMap>) -> EffectiveFlagSet {
        resolve(&self.platform, self.static_config(tenant_id), overrides)
    }

    pub fn explain_for(
        &self,
        tenant_id: &TenantId,
        overrides: Option<&OverrideMap>,
        key: &FlagKey,
    ) -> FlagResolution {
        explain(&self.platform, self.static_config(tenant_id), overrides, key)
    }

    pub fn check_override(&self, key: &FlagKey, value: bool) -> Result<(), PolicyViolation> {
        check_override(&self.platform, key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResolutionSource;

    fn tenant(raw: &str) -> TenantId {
        TenantId::parse(raw).unwrap()
    }

    #[test]
    fn static_config_is_scoped_per_tenant() {
        let platform = PlatformPolicy::default().with(FlagKey::Beta, true, false);
        let mut tenants = HashMap::new();
        tenants.insert(tenant("acme"), TenantStaticConfig::default().with(FlagKey::Beta, false));
        let ctx = PolicyContext::new(platform, tenants);

        assert!(!ctx.resolve_for(&tenant("acme"), None).is_enabled(&FlagKey::Beta));
        assert!(ctx.resolve_for(&tenant("beta-co"), None).is_enabled(&FlagKey::Beta));
        assert_eq!(
            ctx.explain_for(&tenant("acme"), None, &FlagKey::Beta).source,
            ResolutionSource::Static
        );
    }
}
