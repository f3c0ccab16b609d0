//! Redirect target construction.
//!
//! A `next` path is only honoured when it stays inside the requested
//! tenant's workspace; anything else falls back to the tenant dashboard.

use tenantry_core::TenantId;

pub const SELECT_TENANT_PATH: &str = "/select-tenant";

pub fn dashboard_path(tenant: &TenantId) -> String {
    format!("/{tenant}/dashboard")
}

/// Accept `next` only if it is a same-origin path under `/{tenant}/`.
///
/// Checks run on the percent-decoded path as well, since browsers treat
/// `%2e%2e` like `..` when resolving.
pub fn sanitize_next(tenant: &TenantId, next: &str) -> String {
    if is_inside_tenant(tenant, next) {
        next.to_string()
    } else {
        dashboard_path(tenant)
    }
}

fn is_inside_tenant(tenant: &TenantId, next: &str) -> bool {
    let prefix = format!("/{tenant}/");
    if !next.starts_with(&prefix) || next.contains('\\') || next.chars().any(|c| c.is_control()) {
        return false;
    }

    let path = next.split(['?', '#']).next().unwrap_or_default();
    let lowered = path.to_ascii_lowercase();
    if lowered.contains("%2f") || lowered.contains("%5c") {
        return false;
    }

    let Ok(decoded) = urlencoding::decode(path) else {
        return false;
    };
    if !decoded.starts_with(&prefix)
        || decoded.contains("//")
        || decoded.contains('\\')
        || decoded.chars().any(|c| c.is_control())
    {
        return false;
    }

    !decoded.split('/').any(|segment| segment == "." || segment == "..")
}

/// `/{tenant}/login?next={percent-encoded sanitized path}`.
pub fn login_redirect(tenant: &TenantId, next: &str) -> String {
    let next = sanitize_next(tenant, next);
    format!("/{tenant}/login?next={}", urlencoding::encode(&next))
}
