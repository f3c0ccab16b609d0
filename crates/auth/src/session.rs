//! Session context and the hosted-backend collaborators.

use async_trait::async_trait;
use thiserror::Error;

use crate::{ClaimsError, SessionClaims};

/// Ephemeral session: created on sign-in, dropped on sign-out or token invalidation.
///
/// Claims are kept as the raw JSON handed over by the session provider and
/// decoded on demand, so a malformed token surfaces as a typed
/// [`ClaimsError`] at the decision point instead of failing sign-in.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    access_token: String,
    claims: serde_json::Value,
}

impl SessionContext {
    pub fn new(access_token: impl Into<String>, claims: serde_json::Value) -> Self {
        Self {
            access_token: access_token.into(),
            claims,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn raw_claims(&self) -> &serde_json::Value {
        &self.claims
    }

    pub fn claims(&self) -> Result<SessionClaims, ClaimsError> {
        SessionClaims::decode(&self.claims)
    }
}

/// Session as observed by the current view.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    Absent,
    /// Still being restored (e.g. token read from storage in flight).
    Loading,
    Active(SessionContext),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ElevationError {
    #[error("elevation check transport failure: {0}")]
    Transport(String),

    #[error("elevation check rejected the session: {0}")]
    Rejected(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session refresh failed: {0}")]
    Refresh(String),

    #[error("session no longer valid")]
    Invalidated,
}

/// Authoritative round-trip "is this caller a superuser" check.
///
/// Never answered from token claims alone. Callers treat `Err` as "not elevated".
#[async_trait]
pub trait ElevationCheck: Send + Sync {
    async fn is_elevated(&self, session: &SessionContext) -> Result<bool, ElevationError>;
}

/// Re-issues the session so claims reflect backend-side changes
/// (e.g. the principal was reassigned to another tenant).
#[async_trait]
pub trait SessionRefresher: Send + Sync {
    async fn refresh(&self, session: &SessionContext) -> Result<SessionContext, SessionError>;
}
