use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use tenantry_core::TenantId;
use tenantry_events::{EventBus, OverrideChanged};
use tenantry_policy::{EffectiveFlagSet, FlagKey, OverrideMap, PolicyContext, PolicyViolation};

use super::repository::{OverrideRepository, RepositoryError};
use super::subscription::{SubscriptionHandle, spawn_listener};

/// Default wait between shutdown checks in subscription listeners.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum SetOverrideError {
    /// Rejected before any IO; pick another key.
    #[error(transparent)]
    PolicyViolation(#[from] PolicyViolation),

    /// Storage write failed; the optimistic update was rolled back. Retryable.
    #[error("couldn't save that setting: {0}")]
    PersistenceFailure(#[from] RepositoryError),
}

/// Client-side view of one tenant's override blob.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TenantSnapshot {
    pub overrides: OverrideMap,
    /// Timestamp of the authoritative state this snapshot derives from.
    pub updated_at: Option<DateTime<Utc>>,
    /// Holds an optimistic local change not yet reconciled by a notification.
    pub pending: bool,
}

/// Outcome of reconciling one notification against the cache.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    Applied,
    /// Same snapshot already applied.
    Unchanged,
    /// Older than the cached state; ignored.
    Stale,
}

type Cache = Arc<Mutex<HashMap<TenantId, TenantSnapshot>>>;

/// Per-client owner of the runtime override layer.
///
/// Reads come from the cached snapshot; the only write path is
/// [`OverrideStore::set_override`]. Mutexes are never held across `.await`.
pub struct OverrideStore<R, B> {
    context: PolicyContext,
    repository: R,
    bus: B,
    cache: Cache,
    poll_interval: Duration,
}

impl<R, B> OverrideStore<R, B>
where
    R: OverrideRepository,
    B: EventBus<OverrideChanged>,
{
    pub fn new(context: PolicyContext, repository: R, bus: B) -> Self {
        Self {
            context,
            repository,
            bus,
            cache: Arc::new(Mutex::new(HashMap::new())),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn context(&self) -> &PolicyContext {
        &self.context
    }

    /// Prime the cache from storage. Newer cached state is kept.
    pub async fn hydrate(&self, tenant_id: &TenantId) -> Result<EffectiveFlagSet, RepositoryError> {
        if let Some(record) = self.repository.load(tenant_id).await? {
            let msg = OverrideChanged::new(record.tenant_id, record.overrides, record.updated_at);
            reconcile(&self.cache, &msg);
        } else {
            lock(&self.cache).entry(tenant_id.clone()).or_default();
        }
        Ok(self.effective(tenant_id))
    }

    /// Current cached override map (empty when nothing is cached).
    pub fn get_overrides(&self, tenant_id: &TenantId) -> OverrideMap {
        lock(&self.cache)
            .get(tenant_id)
            .map(|s| s.overrides.clone())
            .unwrap_or_default()
    }

    pub fn snapshot(&self, tenant_id: &TenantId) -> Option<TenantSnapshot> {
        lock(&self.cache).get(tenant_id).cloned()
    }

    /// Effective flags from the cached snapshot.
    pub fn effective(&self, tenant_id: &TenantId) -> EffectiveFlagSet {
        effective_from_cache(&self.cache, &self.context, tenant_id)
    }

    /// Change one override for a tenant.
    ///
    /// The caller's cache reflects the change immediately; on success the
    /// returned set is computed from the persisted blob. In-flight writes are
    /// not cancellable.
    pub async fn set_override(
        &self,
        tenant_id: &TenantId,
        key: FlagKey,
        value: bool,
    ) -> Result<EffectiveFlagSet, SetOverrideError> {
        if let Err(violation) = self.context.check_override(&key, value) {
            tracing::info!(tenant_id = %tenant_id, flag = %key, kind = ?violation.kind, "override rejected by platform policy");
            return Err(violation.into());
        }

        if !lock(&self.cache).contains_key(tenant_id) {
            self.hydrate(tenant_id).await?;
        }

        // Optimistic update.
        let (previous, optimistic) = {
            let mut cache = lock(&self.cache);
            let snapshot = cache.entry(tenant_id.clone()).or_default();
            let previous = snapshot.clone();
            snapshot.overrides.insert(key.clone(), value);
            // Entries for keys the platform now fixes are never written back.
            let platform = self.context.platform();
            snapshot.overrides.retain(|k, _| !platform.rule(k).is_fixed());
            snapshot.pending = true;
            (previous, snapshot.overrides.clone())
        };
        tracing::debug!(tenant_id = %tenant_id, flag = %key, value, "optimistic override applied");

        let record = match self.repository.save(tenant_id, &optimistic).await {
            Ok(record) => record,
            Err(e) => {
                self.roll_back(tenant_id, &optimistic, previous);
                tracing::error!(tenant_id = %tenant_id, flag = %key, error = %e, "override write failed; rolled back");
                return Err(e.into());
            }
        };

        let effective = self.context.resolve_for(tenant_id, Some(&record.overrides));

        // Persisted already: a lost notification is repaired by the next one or a re-hydrate.
        let msg = OverrideChanged::new(record.tenant_id, record.overrides, record.updated_at);
        if let Err(e) = self.bus.publish(msg) {
            tracing::warn!(tenant_id = %tenant_id, error = ?e, "override persisted but notification publish failed");
        }

        Ok(effective)
    }

    /// Reconcile one notification into the cache.
    ///
    /// Returns the recomputed set when the notification changed the cached
    /// state; duplicates and out-of-date snapshots return `None`.
    pub fn apply_notification(&self, msg: &OverrideChanged) -> Option<EffectiveFlagSet> {
        match reconcile(&self.cache, msg) {
            Reconciliation::Applied => Some(self.effective(&msg.tenant_id)),
            Reconciliation::Unchanged | Reconciliation::Stale => None,
        }
    }

    /// Listen for changes to `tenant_id` on a background thread.
    ///
    /// `on_change` receives the set recomputed from each new notification
    /// (the subscriber's own writes included). Dropping or unsubscribing the
    /// handle stops further callbacks.
    pub fn subscribe<F>(&self, tenant_id: TenantId, on_change: F) -> std::io::Result<SubscriptionHandle>
    where
        F: FnMut(&EffectiveFlagSet) + Send + 'static,
    {
        let subscription = self.bus.subscribe();
        let cache = Arc::clone(&self.cache);
        let context = self.context.clone();

        spawn_listener(
            tenant_id,
            subscription,
            self.poll_interval,
            move |msg: &OverrideChanged| match reconcile(&cache, msg) {
                Reconciliation::Stale => None,
                Reconciliation::Applied | Reconciliation::Unchanged => {
                    Some(effective_from_cache(&cache, &context, &msg.tenant_id))
                }
            },
            on_change,
        )
    }

    /// Restore the last known-good snapshot, unless a notification already
    /// replaced the optimistic state.
    fn roll_back(&self, tenant_id: &TenantId, optimistic: &OverrideMap, previous: TenantSnapshot) {
        let mut cache = lock(&self.cache);
        if let Some(current) = cache.get_mut(tenant_id) {
            if current.pending && &current.overrides == optimistic {
                *current = previous;
            }
        }
    }
}

fn lock(cache: &Cache) -> MutexGuard<'_, HashMap<TenantId, TenantSnapshot>> {
    // The cache holds plain data; a panic elsewhere cannot leave it half-written.
    cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Idempotent, order-independent merge of an authoritative snapshot.
fn reconcile(cache: &Cache, msg: &OverrideChanged) -> Reconciliation {
    let mut cache = lock(cache);
    let snapshot = cache.entry(msg.tenant_id.clone()).or_default();

    if let Some(current) = snapshot.updated_at {
        if msg.updated_at < current {
            tracing::debug!(tenant_id = %msg.tenant_id, "ignoring stale override notification");
            return Reconciliation::Stale;
        }
        if msg.updated_at == current && !snapshot.pending && snapshot.overrides == msg.overrides {
            return Reconciliation::Unchanged;
        }
    }

    *snapshot = TenantSnapshot {
        overrides: msg.overrides.clone(),
        updated_at: Some(msg.updated_at),
        pending: false,
    };
    Reconciliation::Applied
}

fn effective_from_cache(cache: &Cache, context: &PolicyContext, tenant_id: &TenantId) -> EffectiveFlagSet {
    let cache = lock(cache);
    context.resolve_for(tenant_id, cache.get(tenant_id).map(|s| &s.overrides))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    use chrono::Duration as ChronoDuration;

    use tenantry_events::InMemoryEventBus;
    use tenantry_policy::{PlatformPolicy, TenantStaticConfig, ViolationKind};

    use crate::override_store::InMemoryOverrideRepository;

    type TestStore = OverrideStore<Arc<InMemoryOverrideRepository>, Arc<InMemoryEventBus<OverrideChanged>>>;

    fn acme() -> TenantId {
        TenantId::parse("acme").unwrap()
    }

    fn context() -> PolicyContext {
        let platform = PlatformPolicy::default()
            .with(FlagKey::Beta, true, false)
            .with(FlagKey::SmsCampaigns, false, false)
            .with(FlagKey::Invoicing, true, true);
        let mut tenants = HashMap::new();
        tenants.insert(acme(), TenantStaticConfig::default().with(FlagKey::Beta, false));
        PolicyContext::new(platform, tenants)
    }

    fn setup() -> (TestStore, Arc<InMemoryOverrideRepository>, Arc<InMemoryEventBus<OverrideChanged>>) {
        let repo = Arc::new(InMemoryOverrideRepository::new());
        let bus = Arc::new(InMemoryEventBus::new());
        let store = OverrideStore::new(context(), repo.clone(), bus.clone());
        (store, repo, bus)
    }

    fn notification(entries: &[(FlagKey, bool)], at: DateTime<Utc>) -> OverrideChanged {
        OverrideChanged::new(acme(), entries.iter().cloned().collect(), at)
    }

    #[tokio::test]
    async fn hard_limited_key_is_rejected_without_a_write() {
        let (store, repo, bus) = setup();
        let sub = bus.subscribe();

        let err = store
            .set_override(&acme(), FlagKey::SmsCampaigns, true)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SetOverrideError::PolicyViolation(PolicyViolation {
                kind: ViolationKind::HardLimited,
                ..
            })
        ));
        assert_eq!(repo.save_count(), 0);
        assert_eq!(repo.stored(&acme()), None);
        assert!(sub.try_recv().is_err());
        assert!(!store.effective(&acme()).is_enabled(&FlagKey::SmsCampaigns));
    }

    #[tokio::test]
    async fn locked_key_is_rejected_without_a_write() {
        let (store, repo, _bus) = setup();

        let err = store
            .set_override(&acme(), FlagKey::Invoicing, false)
            .await
            .unwrap_err();

        assert!(matches!(err, SetOverrideError::PolicyViolation(v) if v.kind == ViolationKind::Locked));
        assert_eq!(repo.save_count(), 0);
        assert!(store.effective(&acme()).is_enabled(&FlagKey::Invoicing));
    }

    #[tokio::test]
    async fn successful_write_persists_whole_blob_and_notifies() {
        let (store, repo, bus) = setup();
        let sub = bus.subscribe();

        store.set_override(&acme(), FlagKey::Automations, false).await.unwrap();
        let effective = store.set_override(&acme(), FlagKey::Beta, true).await.unwrap();

        // Override beats the tenant's static `beta: false`.
        assert!(effective.is_enabled(&FlagKey::Beta));
        assert!(!effective.is_enabled(&FlagKey::Automations));

        let stored = repo.stored(&acme()).unwrap();
        assert_eq!(stored.overrides.len(), 2);
        assert_eq!(stored.overrides.get(&FlagKey::Automations), Some(&false));

        let first = sub.try_recv().unwrap();
        let second = sub.try_recv().unwrap();
        assert_eq!(first.overrides.len(), 1);
        assert_eq!(second.overrides, stored.overrides);
        assert_eq!(second.updated_at, stored.updated_at);
    }

    #[tokio::test]
    async fn entries_for_newly_fixed_keys_are_dropped_on_the_next_write() {
        let (store, repo, _bus) = setup();
        // Persisted before the platform started fixing these keys.
        let legacy: OverrideMap = [(FlagKey::Invoicing, false), (FlagKey::SmsCampaigns, true)]
            .into_iter()
            .collect();
        repo.save(&acme(), &legacy).await.unwrap();

        let effective = store.set_override(&acme(), FlagKey::Beta, true).await.unwrap();

        let stored = repo.stored(&acme()).unwrap().overrides;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored.get(&FlagKey::Beta), Some(&true));
        assert_eq!(store.get_overrides(&acme()), stored);
        assert!(effective.is_enabled(&FlagKey::Invoicing));
        assert!(!effective.is_enabled(&FlagKey::SmsCampaigns));
    }

    #[tokio::test]
    async fn failed_write_rolls_back_the_optimistic_update() {
        let (store, repo, bus) = setup();
        let sub = bus.subscribe();
        store.set_override(&acme(), FlagKey::Beta, true).await.unwrap();
        let before = store.snapshot(&acme()).unwrap();

        repo.fail_next_saves(1);
        let err = store
            .set_override(&acme(), FlagKey::Automations, false)
            .await
            .unwrap_err();

        assert!(matches!(err, SetOverrideError::PersistenceFailure(_)));
        assert_eq!(err.to_string(), "couldn't save that setting: storage unavailable: injected failure");
        assert_eq!(store.snapshot(&acme()).unwrap(), before);
        assert!(store.effective(&acme()).is_enabled(&FlagKey::Automations));
        assert_eq!(repo.save_count(), 1);
        // Only the first (successful) write was announced.
        assert!(sub.try_recv().is_ok());
        assert!(sub.try_recv().is_err());
    }

    #[tokio::test]
    async fn first_write_builds_on_persisted_state() {
        let (store, repo, _bus) = setup();
        let mut existing = OverrideMap::new();
        existing.insert(FlagKey::LeadScoring, false);
        repo.save(&acme(), &existing).await.unwrap();

        store.set_override(&acme(), FlagKey::Beta, true).await.unwrap();

        let stored = repo.stored(&acme()).unwrap();
        assert_eq!(stored.overrides.get(&FlagKey::LeadScoring), Some(&false));
        assert_eq!(stored.overrides.get(&FlagKey::Beta), Some(&true));
    }

    #[test]
    fn reapplying_the_same_notification_is_a_no_op() {
        let (store, _repo, _bus) = setup();
        let msg = notification(&[(FlagKey::Beta, true)], Utc::now());

        let applied = store.apply_notification(&msg).unwrap();
        assert!(applied.is_enabled(&FlagKey::Beta));
        assert_eq!(store.apply_notification(&msg), None);
        assert_eq!(store.get_overrides(&acme()), msg.overrides);
    }

    #[test]
    fn out_of_order_notifications_keep_the_newest_snapshot() {
        let (store, _repo, _bus) = setup();
        let t0 = Utc::now();
        let newer = notification(&[(FlagKey::Beta, true)], t0 + ChronoDuration::seconds(1));
        let older = notification(&[(FlagKey::Beta, false)], t0);

        store.apply_notification(&newer);
        assert_eq!(store.apply_notification(&older), None);
        assert!(store.effective(&acme()).is_enabled(&FlagKey::Beta));
    }

    #[tokio::test]
    async fn echo_reconciles_the_writers_pending_state() {
        let (store, _repo, bus) = setup();
        let sub = bus.subscribe();

        store.set_override(&acme(), FlagKey::Beta, true).await.unwrap();
        assert!(store.snapshot(&acme()).unwrap().pending);

        let echo = sub.try_recv().unwrap();
        assert!(store.apply_notification(&echo).is_some());

        let snapshot = store.snapshot(&acme()).unwrap();
        assert!(!snapshot.pending);
        assert_eq!(snapshot.updated_at, Some(echo.updated_at));
        // Redelivery changes nothing.
        assert_eq!(store.apply_notification(&echo), None);
    }

    #[tokio::test]
    async fn hydrate_loads_persisted_overrides() {
        let (store, repo, _bus) = setup();
        let mut existing = OverrideMap::new();
        existing.insert(FlagKey::Beta, true);
        repo.save(&acme(), &existing).await.unwrap();

        assert!(store.get_overrides(&acme()).is_empty());
        let effective = store.hydrate(&acme()).await.unwrap();

        assert!(effective.is_enabled(&FlagKey::Beta));
        assert_eq!(store.get_overrides(&acme()), existing);
    }
}
