//! `tenantry-policy` — feature-policy resolution (pure, no IO).
//!
//! Three configuration layers decide whether a capability is enabled for a
//! tenant:
//!
//! ```text
//! PlatformPolicy (build time, ceiling)
//!   ↓  hard limit (value = false) / lock (locked = true) stop here
//! TenantStaticConfig (deploy time, per tenant)
//!   ↓
//! OverrideMap (runtime, per tenant, persisted)
//!   ↓
//! EffectiveFlagSet (derived, never persisted)
//! ```

pub mod context;
pub mod flag;
pub mod guard;
pub mod layers;
pub mod loader;
pub mod resolver;

pub use context::PolicyContext;
pub use flag::{FlagKey, FlagKeyError};
pub use guard::{PolicyViolation, ViolationKind, check_override};
pub use layers::{FlagRule, OverrideMap, PlatformPolicy, TenantStaticConfig};
pub use loader::{PolicyLoadError, parse_platform_policy, parse_tenant_configs};
pub use resolver::{EffectiveFlagSet, FlagResolution, ResolutionSource, explain, resolve};
