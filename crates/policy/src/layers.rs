//! The three configuration layers feeding the resolver.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::FlagKey;

/// Runtime override layer: `flagKey → bool`, persisted as one blob per tenant.
pub type OverrideMap = BTreeMap<FlagKey, bool>;

/// Platform-level rule for a single capability.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagRule {
    /// Default value, and the ceiling: `false` is a hard limit.
    pub value: bool,

    /// When set, `value` is forced regardless of tenant configuration.
    #[serde(default)]
    pub locked: bool,
}

impl FlagRule {
    /// Rule applied to keys the platform does not govern.
    pub const UNGOVERNED: FlagRule = FlagRule {
        value: true,
        locked: false,
    };

    pub const fn new(value: bool, locked: bool) -> Self {
        Self { value, locked }
    }

    pub const fn is_hard_limited(&self) -> bool {
        !self.value
    }

    /// Lower layers cannot change the resolved value of this key.
    pub const fn is_fixed(&self) -> bool {
        self.is_hard_limited() || self.locked
    }
}

/// Build-time platform policy. Never mutated at runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformPolicy(BTreeMap<FlagKey, FlagRule>);

impl PlatformPolicy {
    pub fn new(rules: BTreeMap<FlagKey, FlagRule>) -> Self {
        Self(rules)
    }

    pub fn with(mut self, key: FlagKey, value: bool, locked: bool) -> Self {
        self.0.insert(key, FlagRule::new(value, locked));
        self
    }

    /// Rule for `key`; keys absent from the policy are ungoverned.
    pub fn rule(&self, key: &FlagKey) -> FlagRule {
        self.0.get(key).copied().unwrap_or(FlagRule::UNGOVERNED)
    }

    pub fn keys(&self) -> impl Iterator<Item = &FlagKey> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Deploy-time baseline for one tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantStaticConfig(BTreeMap<FlagKey, bool>);

impl TenantStaticConfig {
    pub fn new(values: BTreeMap<FlagKey, bool>) -> Self {
        Self(values)
    }

    pub fn with(mut self, key: FlagKey, value: bool) -> Self {
        self.0.insert(key, value);
        self
    }

    pub fn get(&self, key: &FlagKey) -> Option<bool> {
        self.0.get(key).copied()
    }

    pub fn keys(&self) -> impl Iterator<Item = &FlagKey> {
        self.0.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
