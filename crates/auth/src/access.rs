//! Tenant access decision.
//!
//! Re-evaluated on every navigation or session event:
//!
//! ```text
//! no tenant in path ─────────────────────────────→ Redirect(/select-tenant)
//! no session / expired claims ───────────────────→ Redirect(/{tenant}/login?next=…)
//! elevated (authoritative check, Err = false) ───→ Allow
//! claims undecodable ────────────────────────────→ Deny(MalformedClaims)
//! tenant claim missing ──────────────────────────→ Deny(NotProvisioned)
//! claim == requested ────────────────────────────→ Allow
//! claim != requested → refresh once → re-read:
//!     matches ───────────────────────────────────→ Allow
//!     still differs ─────────────────────────────→ Redirect(/{claimed}/dashboard, Mismatch)
//! ```
//!
//! Every failure resolves to a typed decision; nothing here returns an error.

use chrono::{DateTime, Utc};
use serde::Serialize;

use tenantry_core::TenantId;

use crate::redirect::{SELECT_TENANT_PATH, dashboard_path, login_redirect};
use crate::session::{ElevationCheck, SessionContext, SessionRefresher, SessionState};
use crate::{ClaimsError, validate_claims};

/// First path segments that are application routes, never tenants.
const RESERVED_SEGMENTS: [&str; 4] = ["select-tenant", "login", "auth", "api"];

/// One navigation to be checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRequest {
    requested_tenant: Option<TenantId>,
    path: String,
    now: DateTime<Utc>,
}

impl AccessRequest {
    pub fn new(requested_tenant: Option<TenantId>, path: impl Into<String>) -> Self {
        Self {
            requested_tenant,
            path: path.into(),
            now: Utc::now(),
        }
    }

    /// Derive the requested tenant from the first path segment.
    ///
    /// A segment that is not a valid tenant slug counts as "no tenant".
    pub fn from_path(path: impl Into<String>) -> Self {
        let path = path.into();
        let first = path
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim_start_matches('/')
            .split('/')
            .next()
            .unwrap_or_default();

        let requested_tenant = if RESERVED_SEGMENTS.contains(&first) {
            None
        } else {
            TenantId::parse(first).ok()
        };

        Self::new(requested_tenant, path)
    }

    /// Pin the evaluation time (claims expiry is checked against it).
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn requested_tenant(&self) -> Option<&TenantId> {
        self.requested_tenant.as_ref()
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowReason {
    /// Authoritative superuser bypass.
    Elevated,
    ClaimMatch,
    /// Claims matched after the one-shot session refresh.
    RefreshedClaimMatch,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectReason {
    NoTenant,
    Unauthenticated,
    /// Claimed tenant still differs after one refresh.
    Mismatch,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenyReason {
    NotProvisioned,
    MalformedClaims,
}

/// Outcome of one access check. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum TenantAccessDecision {
    Allow { reason: AllowReason },
    /// Session still loading; re-evaluate once it settles.
    Pending,
    Redirect { target: String, reason: RedirectReason },
    Deny { reason: DenyReason },
}

impl TenantAccessDecision {
    pub fn is_allow(&self) -> bool {
        matches!(self, TenantAccessDecision::Allow { .. })
    }

    /// Message to show the user alongside the decision, if any.
    pub fn user_message(&self) -> Option<&'static str> {
        match self {
            TenantAccessDecision::Redirect {
                reason: RedirectReason::Mismatch,
                ..
            } => Some("Your account belongs to a different workspace. You have been redirected to it."),
            TenantAccessDecision::Deny {
                reason: DenyReason::NotProvisioned,
            } => Some("Your account has not been added to a workspace yet."),
            TenantAccessDecision::Deny {
                reason: DenyReason::MalformedClaims,
            } => Some("We couldn't verify your session. Please sign in again."),
            _ => None,
        }
    }

    fn redirect(target: String, reason: RedirectReason) -> Self {
        TenantAccessDecision::Redirect { target, reason }
    }
}

/// Decides whether the current session may operate on the requested tenant.
pub struct TenantIdentityResolver<E, R> {
    elevation: E,
    refresher: R,
}

impl<E, R> TenantIdentityResolver<E, R>
where
    E: ElevationCheck,
    R: SessionRefresher,
{
    pub fn new(elevation: E, refresher: R) -> Self {
        Self { elevation, refresher }
    }

    /// Resolve access for one navigation.
    ///
    /// May replace the active session in `session` with a refreshed one; the
    /// refresh is attempted at most once per call.
    pub async fn resolve_access(
        &self,
        request: &AccessRequest,
        session: &mut SessionState,
    ) -> TenantAccessDecision {
        let Some(requested) = request.requested_tenant() else {
            return TenantAccessDecision::redirect(
                SELECT_TENANT_PATH.to_string(),
                RedirectReason::NoTenant,
            );
        };

        let ctx = match session {
            SessionState::Absent => return unauthenticated(requested, request.path()),
            SessionState::Loading => return TenantAccessDecision::Pending,
            SessionState::Active(ctx) => ctx,
        };

        // Expired tokens mean there is no active session. Undecodable claims
        // fall through so an elevated caller is still let in.
        if let Ok(claims) = ctx.claims() {
            if let Err(e) = validate_claims(&claims, request.now) {
                tracing::debug!(tenant_id = %requested, error = %e, "session claims outside validity window");
                return unauthenticated(requested, request.path());
            }
        }

        if self.is_elevated(ctx).await {
            tracing::info!(tenant_id = %requested, "elevated access granted");
            return TenantAccessDecision::Allow {
                reason: AllowReason::Elevated,
            };
        }

        let claimed = match claimed_tenant(ctx) {
            Ok(claimed) => claimed,
            Err(reason) => return TenantAccessDecision::Deny { reason },
        };
        if &claimed == requested {
            return TenantAccessDecision::Allow {
                reason: AllowReason::ClaimMatch,
            };
        }

        // Claims may be stale after a backend-side tenant reassignment.
        match self.refresher.refresh(ctx).await {
            Ok(refreshed) => {
                *ctx = refreshed;
                if let Ok(claims) = ctx.claims() {
                    if let Err(e) = validate_claims(&claims, request.now) {
                        tracing::warn!(tenant_id = %requested, error = %e, "refreshed session outside validity window");
                        return unauthenticated(requested, request.path());
                    }
                }
            }
            Err(e) => {
                tracing::warn!(tenant_id = %requested, error = %e, "session refresh failed");
            }
        }

        let claimed = match claimed_tenant(ctx) {
            Ok(claimed) => claimed,
            Err(reason) => return TenantAccessDecision::Deny { reason },
        };
        if &claimed == requested {
            return TenantAccessDecision::Allow {
                reason: AllowReason::RefreshedClaimMatch,
            };
        }

        tracing::warn!(
            requested_tenant = %requested,
            claimed_tenant = %claimed,
            "tenant mismatch persists after refresh"
        );
        TenantAccessDecision::redirect(dashboard_path(&claimed), RedirectReason::Mismatch)
    }

    /// Fail closed: transport errors count as "not elevated".
    async fn is_elevated(&self, ctx: &SessionContext) -> bool {
        match self.elevation.is_elevated(ctx).await {
            Ok(elevated) => elevated,
            Err(e) => {
                tracing::warn!(error = %e, "elevation check failed; treating caller as not elevated");
                false
            }
        }
    }
}

fn unauthenticated(tenant: &TenantId, path: &str) -> TenantAccessDecision {
    TenantAccessDecision::redirect(login_redirect(tenant, path), RedirectReason::Unauthenticated)
}

fn claimed_tenant(ctx: &SessionContext) -> Result<TenantId, DenyReason> {
    let claims = ctx.claims().map_err(|e| {
        tracing::warn!(error = %e, "rejecting session with malformed claims");
        DenyReason::MalformedClaims
    })?;

    match claims.tenant() {
        Ok(tenant) => Ok(tenant.clone()),
        Err(ClaimsError::MissingClaim(_)) => {
            tracing::info!(principal = %claims.sub, "session carries no tenant claim");
            Err(DenyReason::NotProvisioned)
        }
        Err(_) => Err(DenyReason::MalformedClaims),
    }
}
