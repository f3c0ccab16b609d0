//! Configuration loading and representation.
//!
//! | variable                        | meaning                                   | default            |
//! |---------------------------------|-------------------------------------------|--------------------|
//! | `TENANTRY_PLATFORM_POLICY`      | path to the platform policy JSON          | empty policy       |
//! | `TENANTRY_TENANT_CONFIG`        | path to the tenant static config JSON     | no tenant config   |
//! | `DATABASE_URL`                  | Postgres URL for the override repository  | unset              |
//! | `REDIS_URL`                     | Redis URL for override notifications      | unset              |
//! | `TENANTRY_NOTIFY_CHANNEL`       | Redis pub/sub channel                     | `tenant_overrides` |
//! | `TENANTRY_SUBSCRIPTION_POLL_MS` | listener shutdown-check interval          | `250`              |

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

use tenantry_policy::{PlatformPolicy, PolicyContext, parse_platform_policy, parse_tenant_configs};

#[cfg(feature = "redis")]
use crate::event_bus::RedisPubSubOverrideBus;
use crate::override_store::PostgresOverrideRepository;

pub const DEFAULT_NOTIFY_CHANNEL: &str = "tenant_overrides";
pub const DEFAULT_POLL_MS: u64 = 250;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub platform_policy_path: Option<PathBuf>,
    pub tenant_config_path: Option<PathBuf>,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub notify_channel: String,
    pub subscription_poll: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            platform_policy_path: None,
            tenant_config_path: None,
            database_url: None,
            redis_url: None,
            notify_channel: DEFAULT_NOTIFY_CHANNEL.to_string(),
            subscription_poll: Duration::from_millis(DEFAULT_POLL_MS),
        }
    }
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let subscription_poll = match non_empty("TENANTRY_SUBSCRIPTION_POLL_MS") {
            Some(raw) => {
                let ms: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("TENANTRY_SUBSCRIPTION_POLL_MS is not a number: {raw:?}"))?;
                Duration::from_millis(ms.max(1))
            }
            None => Duration::from_millis(DEFAULT_POLL_MS),
        };

        Ok(Self {
            platform_policy_path: non_empty("TENANTRY_PLATFORM_POLICY").map(PathBuf::from),
            tenant_config_path: non_empty("TENANTRY_TENANT_CONFIG").map(PathBuf::from),
            database_url: non_empty("DATABASE_URL"),
            redis_url: non_empty("REDIS_URL"),
            notify_channel: non_empty("TENANTRY_NOTIFY_CHANNEL")
                .unwrap_or_else(|| DEFAULT_NOTIFY_CHANNEL.to_string()),
            subscription_poll,
        })
    }

    /// Load both immutable layers into an explicit context.
    ///
    /// Missing paths mean empty layers: every key is ungoverned.
    pub fn load_policy_context(&self) -> anyhow::Result<PolicyContext> {
        let platform = match &self.platform_policy_path {
            Some(path) => parse_platform_policy(&read(path)?)
                .with_context(|| format!("invalid platform policy at {}", path.display()))?,
            None => {
                tracing::warn!("TENANTRY_PLATFORM_POLICY not set; no platform limits apply");
                PlatformPolicy::default()
            }
        };

        let tenants = match &self.tenant_config_path {
            Some(path) => parse_tenant_configs(&read(path)?)
                .with_context(|| format!("invalid tenant config at {}", path.display()))?,
            None => HashMap::new(),
        };

        tracing::info!(
            platform_rules = platform.len(),
            tenants = tenants.len(),
            "policy context loaded"
        );
        Ok(PolicyContext::new(platform, tenants))
    }

    /// Connect the Postgres override repository named by `DATABASE_URL`.
    pub async fn connect_repository(&self) -> anyhow::Result<PostgresOverrideRepository> {
        let url = self
            .database_url
            .as_deref()
            .context("DATABASE_URL is not set")?;
        PostgresOverrideRepository::connect(url)
            .await
            .context("failed to connect the override repository")
    }

    /// Redis bus on `TENANTRY_NOTIFY_CHANNEL`. Opening does not connect.
    #[cfg(feature = "redis")]
    pub fn redis_bus(&self) -> anyhow::Result<RedisPubSubOverrideBus> {
        let url = self.redis_url.as_deref().context("REDIS_URL is not set")?;
        RedisPubSubOverrideBus::new(url, self.notify_channel.clone())
            .context("invalid REDIS_URL")
    }
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
