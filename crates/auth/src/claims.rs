use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tenantry_core::TenantId;

use crate::{PrincipalId, Role};

/// Session token claims (transport-agnostic).
///
/// The minimal set the access check needs once the hosted backend has
/// decoded/verified the token. Timestamps use JWT seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject / principal identifier.
    pub sub: PrincipalId,

    /// Tenant the principal is provisioned into. Absent until provisioning completes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    #[serde(rename = "iat", with = "chrono::serde::ts_seconds")]
    pub issued_at: DateTime<Utc>,

    #[serde(rename = "exp", with = "chrono::serde::ts_seconds")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("malformed session claims: {0}")]
    Decode(String),

    #[error("session claims missing '{0}'")]
    MissingClaim(&'static str),

    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

impl SessionClaims {
    pub fn decode(raw: &serde_json::Value) -> Result<Self, ClaimsError> {
        Self::deserialize(raw).map_err(|e| ClaimsError::Decode(e.to_string()))
    }

    pub fn tenant(&self) -> Result<&TenantId, ClaimsError> {
        self.tenant_id.as_ref().ok_or(ClaimsError::MissingClaim("tenant_id"))
    }
}

/// Deterministically validate the claims' time window.
///
/// Signature verification happens in the hosted backend, not here.
pub fn validate_claims(claims: &SessionClaims, now: DateTime<Utc>) -> Result<(), ClaimsError> {
    if claims.expires_at <= claims.issued_at {
        return Err(ClaimsError::InvalidTimeWindow);
    }
    if now < claims.issued_at {
        return Err(ClaimsError::NotYetValid);
    }
    if now >= claims.expires_at {
        return Err(ClaimsError::Expired);
    }
    Ok(())
}
