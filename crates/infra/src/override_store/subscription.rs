//! Background listener feeding override notifications into a view.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};

use tenantry_core::TenantId;
use tenantry_events::{OverrideChanged, Subscription, TenantScoped};
use tenantry_policy::EffectiveFlagSet;

/// Handle returned by `OverrideStore::subscribe`.
///
/// Dropping the handle stops the listener (without waiting for it);
/// [`SubscriptionHandle::unsubscribe`] stops it and waits.
#[derive(Debug)]
pub struct SubscriptionHandle {
    tenant_id: TenantId,
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    /// Stop further callbacks and wait for the listener to exit.
    pub fn unsubscribe(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
    }
}

/// Spawn the listener thread.
///
/// `recompute` reconciles a notification and yields the set to report
/// (`None` for stale messages). `on_change` fires at most once per
/// `updated_at`, so redelivered notifications are not reported twice.
pub(crate) fn spawn_listener<G, F>(
    tenant_id: TenantId,
    subscription: Subscription<OverrideChanged>,
    poll_interval: Duration,
    mut recompute: G,
    mut on_change: F,
) -> std::io::Result<SubscriptionHandle>
where
    G: FnMut(&OverrideChanged) -> Option<EffectiveFlagSet> + Send + 'static,
    F: FnMut(&EffectiveFlagSet) + Send + 'static,
{
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
    let tenant = tenant_id.clone();

    let join = thread::Builder::new()
        .name(format!("overrides-{tenant_id}"))
        .spawn(move || {
            let mut last_reported: Option<DateTime<Utc>> = None;

            loop {
                // Shutdown check (non-blocking); a dropped handle also counts.
                match shutdown_rx.try_recv() {
                    Ok(()) | Err(mpsc::TryRecvError::Disconnected) => break,
                    Err(mpsc::TryRecvError::Empty) => {}
                }

                let msg = match subscription.recv_timeout(poll_interval) {
                    Ok(msg) => msg,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                };

                if !msg.is_for(&tenant) {
                    continue;
                }
                if last_reported.is_some_and(|t| msg.updated_at <= t) {
                    continue;
                }

                if let Some(effective) = recompute(&msg) {
                    // Torn down while reconciling: the cache is updated, the view is not.
                    if shutdown_rx.try_recv().is_ok() {
                        break;
                    }
                    last_reported = Some(msg.updated_at);
                    on_change(&effective);
                }
            }

            tracing::debug!(tenant_id = %tenant, "override subscription stopped");
        })?;

    Ok(SubscriptionHandle {
        tenant_id,
        shutdown: shutdown_tx,
        join: Some(join),
    })
}
