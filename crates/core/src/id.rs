//! Strongly-typed tenant identifier.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::DomainError;

/// Longest slug accepted as a tenant identifier (DNS label length).
pub const MAX_TENANT_ID_LEN: usize = 63;

/// Identifier of a tenant (multi-tenant boundary).
///
/// Tenants are addressed by a stable, URL-safe slug (e.g. `acme`, `beta-co`)
/// because the identifier is the first segment of every workspace path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TenantIdError {
    #[error("tenant id is empty")]
    Empty,

    #[error("tenant id exceeds {MAX_TENANT_ID_LEN} characters")]
    TooLong,

    #[error("tenant id contains invalid character {0:?}")]
    InvalidChar(char),

    #[error("tenant id must not start or end with '-'")]
    EdgeHyphen,
}

impl TenantId {
    /// Parse and validate a tenant slug.
    ///
    /// Accepted: lowercase ASCII letters, digits and inner hyphens.
    pub fn parse(raw: impl Into<String>) -> Result<Self, TenantIdError> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(TenantIdError::Empty);
        }
        if raw.len() > MAX_TENANT_ID_LEN {
            return Err(TenantIdError::TooLong);
        }
        if let Some(c) = raw
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
        {
            return Err(TenantIdError::InvalidChar(c));
        }
        if raw.starts_with('-') || raw.ends_with('-') {
            return Err(TenantIdError::EdgeHyphen);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for TenantId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TenantId {
    type Error = TenantIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<TenantId> for String {
    fn from(value: TenantId) -> Self {
        value.0
    }
}

impl FromStr for TenantId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).map_err(|e| DomainError::invalid_id(format!("TenantId: {e}")))
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
