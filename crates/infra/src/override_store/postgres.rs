//! Postgres-backed override repository.
//!
//! Table `tenant_overrides(tenant_id text primary key, overrides jsonb, updated_at timestamptz)`
//! (see `migrations/0001_tenant_overrides.sql`).
//!
//! Every query is keyed by `tenant_id`; `save` upserts the whole blob and
//! lets the database assign `updated_at`, bumped past the previous value so
//! timestamps strictly increase per tenant even under clock skew.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use tenantry_core::TenantId;
use tenantry_policy::OverrideMap;

use super::repository::{OverrideRecord, OverrideRepository, RepositoryError};

#[derive(Debug, Clone)]
pub struct PostgresOverrideRepository {
    pool: Arc<PgPool>,
}

impl PostgresOverrideRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(database_url: &str) -> Result<Self, RepositoryError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl OverrideRepository for PostgresOverrideRepository {
    #[tracing::instrument(skip(self), fields(tenant_id = %tenant_id))]
    async fn load(&self, tenant_id: &TenantId) -> Result<Option<OverrideRecord>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT overrides, updated_at
            FROM tenant_overrides
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id.as_str())
        .fetch_optional(&*self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let overrides: Json<OverrideMap> = row
            .try_get("overrides")
            .map_err(|e| RepositoryError::Decode(e.to_string()))?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

        Ok(Some(OverrideRecord {
            tenant_id: tenant_id.clone(),
            overrides: overrides.0,
            updated_at,
        }))
    }

    #[tracing::instrument(skip(self, overrides), fields(tenant_id = %tenant_id, keys = overrides.len()))]
    async fn save(
        &self,
        tenant_id: &TenantId,
        overrides: &OverrideMap,
    ) -> Result<OverrideRecord, RepositoryError> {
        let row = sqlx::query(
            r#"
            INSERT INTO tenant_overrides (tenant_id, overrides, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (tenant_id) DO UPDATE
            SET overrides = EXCLUDED.overrides,
                updated_at = GREATEST(now(), tenant_overrides.updated_at + interval '1 microsecond')
            RETURNING updated_at
            "#,
        )
        .bind(tenant_id.as_str())
        .bind(Json(overrides))
        .fetch_one(&*self.pool)
        .await?;

        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;

        Ok(OverrideRecord {
            tenant_id: tenant_id.clone(),
            overrides: overrides.clone(),
            updated_at,
        })
    }
}
