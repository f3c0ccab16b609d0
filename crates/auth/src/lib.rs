//! `tenantry-auth` — tenant access decisions (zero-trust).
//!
//! Decides whether a caller may operate on the tenant named in the current
//! navigation path. Decoupled from HTTP and from the hosted auth backend: the
//! backend is reached only through the [`ElevationCheck`] and
//! [`SessionRefresher`] traits.

pub mod access;
pub mod claims;
pub mod principal;
pub mod redirect;
pub mod roles;
pub mod session;

pub use access::{
    AccessRequest, AllowReason, DenyReason, RedirectReason, TenantAccessDecision,
    TenantIdentityResolver,
};
pub use claims::{ClaimsError, SessionClaims, validate_claims};
pub use principal::PrincipalId;
pub use redirect::{login_redirect, sanitize_next};
pub use roles::Role;
pub use session::{ElevationCheck, ElevationError, SessionContext, SessionError, SessionRefresher, SessionState};
