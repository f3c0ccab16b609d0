//! Integration tests for the override propagation pipeline.
//!
//! Tests: set_override → OverrideRepository → EventBus → subscription → view
//!
//! Verifies:
//! - Every client rendering a tenant converges on the persisted blob
//! - Writers receive their own change back and reconcile it idempotently
//! - Tenant isolation is preserved on a shared bus
//! - Unsubscribing stops callbacks
//! - Whole-blob last-writer-wins semantics (known limitation)

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::time::Duration;

    use tenantry_core::TenantId;
    use tenantry_events::{EventBus, InMemoryEventBus, OverrideChanged};
    use tenantry_policy::{EffectiveFlagSet, FlagKey, PlatformPolicy, PolicyContext, TenantStaticConfig};

    use crate::override_store::{InMemoryOverrideRepository, OverrideStore, SetOverrideError};

    type Repo = Arc<InMemoryOverrideRepository>;
    type Bus = Arc<InMemoryEventBus<OverrideChanged>>;
    type Client = OverrideStore<Repo, Bus>;

    const WAIT: Duration = Duration::from_secs(2);

    fn acme() -> TenantId {
        TenantId::parse("acme").unwrap()
    }

    fn globex() -> TenantId {
        TenantId::parse("globex").unwrap()
    }

    fn context() -> PolicyContext {
        let platform = PlatformPolicy::default()
            .with(FlagKey::Beta, true, false)
            .with(FlagKey::AiAssistant, true, false)
            .with(FlagKey::SmsCampaigns, false, false)
            .with(FlagKey::Invoicing, true, true);
        let mut tenants = HashMap::new();
        tenants.insert(acme(), TenantStaticConfig::default().with(FlagKey::AiAssistant, false));
        PolicyContext::new(platform, tenants)
    }

    /// Two clients (e.g. two browser tabs) sharing storage and the bus.
    fn setup() -> (Client, Client, Repo, Bus) {
        tenantry_observability::init_for_tests();

        let repo: Repo = Arc::new(InMemoryOverrideRepository::new());
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let a = OverrideStore::new(context(), repo.clone(), bus.clone())
            .with_poll_interval(Duration::from_millis(10));
        let b = OverrideStore::new(context(), repo.clone(), bus.clone())
            .with_poll_interval(Duration::from_millis(10));
        (a, b, repo, bus)
    }

    fn forwarding() -> (
        impl FnMut(&EffectiveFlagSet) + Send + 'static,
        mpsc::Receiver<EffectiveFlagSet>,
    ) {
        let (tx, rx) = mpsc::channel();
        (
            move |set: &EffectiveFlagSet| {
                let _ = tx.send(set.clone());
            },
            rx,
        )
    }

    #[tokio::test]
    async fn change_propagates_to_every_subscribed_client() {
        let (a, b, repo, _bus) = setup();
        let (on_change, rx_b) = forwarding();
        let _handle = b.subscribe(acme(), on_change).unwrap();

        a.set_override(&acme(), FlagKey::AiAssistant, true).await.unwrap();

        let seen = rx_b.recv_timeout(WAIT).unwrap();
        // Override beats the tenant's static `ai_assistant: false`.
        assert!(seen.is_enabled(&FlagKey::AiAssistant));
        assert_eq!(b.get_overrides(&acme()), repo.stored(&acme()).unwrap().overrides);
        assert!(b.effective(&acme()).is_enabled(&FlagKey::AiAssistant));
    }

    #[tokio::test]
    async fn writer_receives_its_own_change_exactly_once() {
        let (a, _b, repo, bus) = setup();
        let (on_change, rx_a) = forwarding();
        let _handle = a.subscribe(acme(), on_change).unwrap();

        let returned = a.set_override(&acme(), FlagKey::Beta, false).await.unwrap();

        let echoed = rx_a.recv_timeout(WAIT).unwrap();
        assert_eq!(echoed, returned);

        // Redelivery of the same snapshot is not reported again.
        let record = repo.stored(&acme()).unwrap();
        bus.publish(OverrideChanged::new(acme(), record.overrides, record.updated_at))
            .unwrap();
        assert!(rx_a.recv_timeout(Duration::from_millis(150)).is_err());

        let snapshot = a.snapshot(&acme()).unwrap();
        assert!(!snapshot.pending);
        assert_eq!(snapshot.updated_at, Some(record.updated_at));
    }

    #[tokio::test]
    async fn subscribers_only_hear_about_their_tenant() {
        let (a, b, _repo, _bus) = setup();
        let (on_change, rx_b) = forwarding();
        let _handle = b.subscribe(acme(), on_change).unwrap();

        a.set_override(&globex(), FlagKey::Beta, false).await.unwrap();

        assert!(rx_b.recv_timeout(Duration::from_millis(150)).is_err());
        assert!(b.get_overrides(&acme()).is_empty());
    }

    #[tokio::test]
    async fn unsubscribe_stops_callbacks() {
        let (a, b, _repo, bus) = setup();
        let (on_change, rx_b) = forwarding();
        let handle = b.subscribe(acme(), on_change).unwrap();
        assert_eq!(handle.tenant_id(), &acme());

        handle.unsubscribe();
        a.set_override(&acme(), FlagKey::Beta, false).await.unwrap();

        assert!(rx_b.recv_timeout(Duration::from_millis(150)).is_err());
        // The listener's bus subscription is pruned on the next publish.
        a.set_override(&acme(), FlagKey::Beta, true).await.unwrap();
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn rejected_and_failed_writes_never_reach_other_clients() {
        let (a, b, repo, _bus) = setup();
        let (on_change, rx_b) = forwarding();
        let _handle = b.subscribe(acme(), on_change).unwrap();

        let err = a.set_override(&acme(), FlagKey::Invoicing, false).await.unwrap_err();
        assert!(matches!(err, SetOverrideError::PolicyViolation(_)));

        repo.fail_next_saves(1);
        let err = a.set_override(&acme(), FlagKey::Beta, false).await.unwrap_err();
        assert!(matches!(err, SetOverrideError::PersistenceFailure(_)));
        assert!(a.get_overrides(&acme()).is_empty());

        assert!(rx_b.recv_timeout(Duration::from_millis(150)).is_err());
        assert_eq!(repo.stored(&acme()), None);
    }

    #[tokio::test]
    async fn fresh_client_hydrates_from_storage() {
        let (a, _b, repo, bus) = setup();
        a.set_override(&acme(), FlagKey::Beta, false).await.unwrap();

        let late = OverrideStore::new(context(), repo.clone(), bus.clone());
        assert!(late.get_overrides(&acme()).is_empty());

        let effective = late.hydrate(&acme()).await.unwrap();
        assert!(!effective.is_enabled(&FlagKey::Beta));
        assert_eq!(late.get_overrides(&acme()), a.get_overrides(&acme()));
    }

    #[tokio::test]
    async fn concurrent_writers_from_stale_caches_lose_updates() {
        // Whole-blob replace: a client writing from a stale cache clobbers
        // keys it never saw. Kept as-is; documented on `OverrideStore`.
        let (a, b, repo, _bus) = setup();
        a.hydrate(&acme()).await.unwrap();
        b.hydrate(&acme()).await.unwrap();

        a.set_override(&acme(), FlagKey::Beta, false).await.unwrap();
        b.set_override(&acme(), FlagKey::AiAssistant, true).await.unwrap();

        let stored = repo.stored(&acme()).unwrap().overrides;
        assert_eq!(stored.get(&FlagKey::AiAssistant), Some(&true));
        assert_eq!(stored.get(&FlagKey::Beta), None);
    }

    #[tokio::test]
    async fn subscribed_clients_converge_on_the_last_write() {
        let (a, b, repo, _bus) = setup();
        let (on_a, rx_a) = forwarding();
        let (on_b, rx_b) = forwarding();
        let _ha = a.subscribe(acme(), on_a).unwrap();
        let _hb = b.subscribe(acme(), on_b).unwrap();

        a.set_override(&acme(), FlagKey::Beta, false).await.unwrap();
        rx_a.recv_timeout(WAIT).unwrap();
        rx_b.recv_timeout(WAIT).unwrap();

        b.set_override(&acme(), FlagKey::AiAssistant, true).await.unwrap();
        let last_a = rx_a.recv_timeout(WAIT).unwrap();
        let last_b = rx_b.recv_timeout(WAIT).unwrap();

        assert_eq!(last_a, last_b);
        assert!(!last_a.is_enabled(&FlagKey::Beta));
        assert!(last_a.is_enabled(&FlagKey::AiAssistant));
        assert_eq!(a.get_overrides(&acme()), repo.stored(&acme()).unwrap().overrides);
        assert_eq!(b.get_overrides(&acme()), a.get_overrides(&acme()));
    }
}
