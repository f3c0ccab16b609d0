use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tenantry_core::TenantId;
use tenantry_policy::OverrideMap;

/// Persisted override row: one per tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideRecord {
    pub tenant_id: TenantId,
    pub overrides: OverrideMap,
    /// Server-assigned, strictly increasing per tenant.
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("stored override blob could not be decoded: {0}")]
    Decode(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Storage for the per-tenant override blob.
///
/// `save` replaces the whole blob; there is no per-key write.
#[async_trait]
pub trait OverrideRepository: Send + Sync {
    async fn load(&self, tenant_id: &TenantId) -> Result<Option<OverrideRecord>, RepositoryError>;

    async fn save(
        &self,
        tenant_id: &TenantId,
        overrides: &OverrideMap,
    ) -> Result<OverrideRecord, RepositoryError>;
}

#[async_trait]
impl<R> OverrideRepository for Arc<R>
where
    R: OverrideRepository + ?Sized,
{
    async fn load(&self, tenant_id: &TenantId) -> Result<Option<OverrideRecord>, RepositoryError> {
        (**self).load(tenant_id).await
    }

    async fn save(
        &self,
        tenant_id: &TenantId,
        overrides: &OverrideMap,
    ) -> Result<OverrideRecord, RepositoryError> {
        (**self).save(tenant_id, overrides).await
    }
}

/// In-memory repository for tests/dev.
///
/// Supports failure injection (`fail_next_saves`) and counts successful saves.
#[derive(Debug, Default)]
pub struct InMemoryOverrideRepository {
    inner: RwLock<HashMap<TenantId, OverrideRecord>>,
    saves: AtomicUsize,
    failures_pending: AtomicUsize,
}

impl InMemoryOverrideRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` saves fail with `RepositoryError::Unavailable`.
    pub fn fail_next_saves(&self, n: usize) {
        self.failures_pending.store(n, Ordering::SeqCst);
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Synchronous view of the stored record (test inspection).
    pub fn stored(&self, tenant_id: &TenantId) -> Option<OverrideRecord> {
        self.inner.read().ok()?.get(tenant_id).cloned()
    }

    fn take_failure(&self) -> bool {
        self.failures_pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl OverrideRepository for InMemoryOverrideRepository {
    async fn load(&self, tenant_id: &TenantId) -> Result<Option<OverrideRecord>, RepositoryError> {
        let map = self
            .inner
            .read()
            .map_err(|_| RepositoryError::Unavailable("lock poisoned".to_string()))?;
        Ok(map.get(tenant_id).cloned())
    }

    async fn save(
        &self,
        tenant_id: &TenantId,
        overrides: &OverrideMap,
    ) -> Result<OverrideRecord, RepositoryError> {
        if self.take_failure() {
            return Err(RepositoryError::Unavailable("injected failure".to_string()));
        }

        let mut map = self
            .inner
            .write()
            .map_err(|_| RepositoryError::Unavailable("lock poisoned".to_string()))?;

        let now = Utc::now();
        let updated_at = match map.get(tenant_id) {
            Some(prev) if prev.updated_at >= now => prev.updated_at + Duration::microseconds(1),
            _ => now,
        };

        let record = OverrideRecord {
            tenant_id: tenant_id.clone(),
            overrides: overrides.clone(),
            updated_at,
        };
        map.insert(tenant_id.clone(), record.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);

        Ok(record)
    }
}
