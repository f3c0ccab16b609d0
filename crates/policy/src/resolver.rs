//! Layer merge: platform ceiling → tenant static config → runtime override.
//!
//! Per key, independently:
//!
//! 1. `platform.value == false` → `false` (hard limit)
//! 2. `platform.locked` → `platform.value` (lock)
//! 3. otherwise `override ?? static ?? platform.value`
//!
//! The resulting keyset is the union of keys seen in all three layers.
//! Keys the platform does not mention use [`FlagRule::UNGOVERNED`].

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::{FlagKey, FlagRule, OverrideMap, PlatformPolicy, TenantStaticConfig};

/// Resolved capability map for one tenant. Derived, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EffectiveFlagSet(BTreeMap<FlagKey, bool>);

impl EffectiveFlagSet {
    /// Whether `key` is enabled. Keys no layer mentions are ungoverned, hence enabled.
    pub fn is_enabled(&self, key: &FlagKey) -> bool {
        self.0.get(key).copied().unwrap_or(FlagRule::UNGOVERNED.value)
    }

    pub fn get(&self, key: &FlagKey) -> Option<bool> {
        self.0.get(key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FlagKey, bool)> {
        self.0.iter().map(|(k, v)| (k, *v))
    }

    pub fn enabled_keys(&self) -> impl Iterator<Item = &FlagKey> {
        self.0.iter().filter(|(_, v)| **v).map(|(k, _)| k)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Which rule decided a key's resolved value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    HardLimit,
    Locked,
    Override,
    Static,
    PlatformDefault,
}

/// Explanation of a single key's resolution (admin views, audit logs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagResolution {
    pub key: FlagKey,
    pub enabled: bool,
    pub source: ResolutionSource,
}

/// Resolve the effective flag set for one tenant.
///
/// Pure and deterministic. Absent layers are treated as empty.
pub fn resolve(
    platform: &PlatformPolicy,
    static_config: Option<&TenantStaticConfig>,
    overrides: Option<&OverrideMap>,
) -> EffectiveFlagSet {
    let mut keys: BTreeSet<&FlagKey> = platform.keys().collect();
    if let Some(cfg) = static_config {
        keys.extend(cfg.keys());
    }
    if let Some(ov) = overrides {
        keys.extend(ov.keys());
    }

    let resolved = keys
        .into_iter()
        .map(|key| {
            let (enabled, _) = decide(platform.rule(key), static_config, overrides, key);
            (key.clone(), enabled)
        })
        .collect();

    EffectiveFlagSet(resolved)
}

/// Resolve one key and report which rule decided it.
pub fn explain(
    platform: &PlatformPolicy,
    static_config: Option<&TenantStaticConfig>,
    overrides: Option<&OverrideMap>,
    key: &FlagKey,
) -> FlagResolution {
    let (enabled, source) = decide(platform.rule(key), static_config, overrides, key);
    FlagResolution {
        key: key.clone(),
        enabled,
        source,
    }
}

fn decide(
    rule: FlagRule,
    static_config: Option<&TenantStaticConfig>,
    overrides: Option<&OverrideMap>,
    key: &FlagKey,
) -> (bool, ResolutionSource) {
    if rule.is_hard_limited() {
        return (false, ResolutionSource::HardLimit);
    }
    if rule.locked {
        return (rule.value, ResolutionSource::Locked);
    }
    if let Some(v) = overrides.and_then(|ov| ov.get(key).copied()) {
        return (v, ResolutionSource::Override);
    }
    if let Some(v) = static_config.and_then(|cfg| cfg.get(key)) {
        return (v, ResolutionSource::Static);
    }
    (rule.value, ResolutionSource::PlatformDefault)
}
