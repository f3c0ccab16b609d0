//! Boundary loading of the immutable layers from JSON documents.
//!
//! Platform policy:
//!
//! ```json
//! { "beta": { "value": true, "locked": false }, "sms_campaigns": { "value": false } }
//! ```
//!
//! Tenant static config:
//!
//! ```json
//! { "acme": { "beta": false }, "beta-co": {} }
//! ```
//!
//! Keys are validated here; unknown but well-formed keys are kept in the
//! `FlagKey::Other` bucket and logged.

use std::collections::{BTreeMap, HashMap};

use thiserror::Error;

use tenantry_core::{TenantId, TenantIdError};

use crate::{FlagKey, FlagKeyError, FlagRule, PlatformPolicy, TenantStaticConfig};

#[derive(Debug, Error)]
pub enum PolicyLoadError {
    #[error("malformed policy document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid flag key '{key}': {source}")]
    FlagKey { key: String, source: FlagKeyError },

    #[error("invalid tenant id '{tenant}': {source}")]
    TenantId { tenant: String, source: TenantIdError },
}

pub fn parse_platform_policy(json: &str) -> Result<PlatformPolicy, PolicyLoadError> {
    let raw: BTreeMap<String, FlagRule> = serde_json::from_str(json)?;

    let mut rules = BTreeMap::new();
    for (key, rule) in raw {
        rules.insert(validate_key(&key, "platform")?, rule);
    }

    tracing::debug!(rules = rules.len(), "loaded platform policy");
    Ok(PlatformPolicy::new(rules))
}

pub fn parse_tenant_configs(
    json: &str,
) -> Result<HashMap<TenantId, TenantStaticConfig>, PolicyLoadError> {
    let raw: BTreeMap<String, BTreeMap<String, bool>> = serde_json::from_str(json)?;

    let mut tenants = HashMap::with_capacity(raw.len());
    for (tenant, values) in raw {
        let tenant_id = TenantId::parse(tenant.clone())
            .map_err(|source| PolicyLoadError::TenantId { tenant, source })?;

        let mut config = BTreeMap::new();
        for (key, value) in values {
            config.insert(validate_key(&key, tenant_id.as_str())?, value);
        }
        tenants.insert(tenant_id, TenantStaticConfig::new(config));
    }

    tracing::debug!(tenants = tenants.len(), "loaded tenant static config");
    Ok(tenants)
}

fn validate_key(raw: &str, layer: &str) -> Result<FlagKey, PolicyLoadError> {
    let key = FlagKey::parse(raw).map_err(|source| PolicyLoadError::FlagKey {
        key: raw.to_string(),
        source,
    })?;
    if !key.is_known() {
        tracing::warn!(flag = %key, layer, "unknown flag key passed through");
    }
    Ok(key)
}
