//! Write precondition for the runtime override layer.

use serde::Serialize;
use thiserror::Error;

use crate::{FlagKey, PlatformPolicy};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// Platform sets `value: false`; no tenant may enable the key.
    HardLimited,
    /// Platform forces its value; tenant layers are ignored.
    Locked,
}

/// A caller tried to override a key the platform fixes.
///
/// Not retryable for the same key.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("flag '{key}' cannot be overridden ({kind:?})")]
pub struct PolicyViolation {
    pub key: FlagKey,
    pub kind: ViolationKind,
}

/// Reject overrides for hard-limited or locked keys before anything is persisted.
///
/// Any write to such a key is refused, including one that repeats the forced
/// value: the persisted blob never carries entries for fixed keys.
pub fn check_override(
    platform: &PlatformPolicy,
    key: &FlagKey,
    _value: bool,
) -> Result<(), PolicyViolation> {
    let rule = platform.rule(key);
    if rule.is_hard_limited() {
        return Err(PolicyViolation {
            key: key.clone(),
            kind: ViolationKind::HardLimited,
        });
    }
    if rule.locked {
        return Err(PolicyViolation {
            key: key.clone(),
            kind: ViolationKind::Locked,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hard_limited_key_is_rejected() {
        let platform = PlatformPolicy::default().with(FlagKey::Beta, false, false);
        let err = check_override(&platform, &FlagKey::Beta, true).unwrap_err();
        assert_eq!(err.kind, ViolationKind::HardLimited);
        assert_eq!(err.key, FlagKey::Beta);
    }

    #[test]
    fn locked_key_is_rejected_even_for_its_forced_value() {
        let platform = PlatformPolicy::default().with(FlagKey::Invoicing, true, true);
        assert_eq!(
            check_override(&platform, &FlagKey::Invoicing, true).unwrap_err().kind,
            ViolationKind::Locked
        );
    }

    #[test]
    fn free_and_ungoverned_keys_are_accepted() {
        let platform = PlatformPolicy::default().with(FlagKey::Beta, true, false);
        assert!(check_override(&platform, &FlagKey::Beta, false).is_ok());
        assert!(check_override(&platform, &FlagKey::Other("x".into()), true).is_ok());
    }
}
