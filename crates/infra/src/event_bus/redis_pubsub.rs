//! Redis pub/sub transport for override notifications.
//!
//! Pub/sub is not durable: a subscriber that is offline misses messages.
//! That is acceptable here because every notification carries the full
//! override blob and clients re-hydrate from the repository on start.

use std::sync::mpsc;
use std::thread;

use redis::Commands;
use thiserror::Error;

use tenantry_events::{EventBus, OverrideChanged, Subscription};

#[derive(Debug, Error)]
pub enum RedisBusError {
    #[error("redis error: {0}")]
    Redis(String),

    #[error("failed to serialize notification: {0}")]
    Serialize(String),
}

/// Redis pub/sub bus carrying JSON-encoded [`OverrideChanged`] messages.
///
/// All tenants share one channel; subscribers filter by tenant.
#[derive(Debug, Clone)]
pub struct RedisPubSubOverrideBus {
    client: redis::Client,
    channel: String,
}

impl RedisPubSubOverrideBus {
    pub fn new(redis_url: impl AsRef<str>, channel: impl Into<String>) -> Result<Self, RedisBusError> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| RedisBusError::Redis(e.to_string()))?;
        Ok(Self {
            client,
            channel: channel.into(),
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl EventBus<OverrideChanged> for RedisPubSubOverrideBus {
    type Error = RedisBusError;

    fn publish(&self, message: OverrideChanged) -> Result<(), Self::Error> {
        let payload = serde_json::to_string(&message)
            .map_err(|e| RedisBusError::Serialize(e.to_string()))?;

        let mut conn = self
            .client
            .get_connection()
            .map_err(|e| RedisBusError::Redis(e.to_string()))?;

        let _: i64 = conn
            .publish(&self.channel, payload)
            .map_err(|e| RedisBusError::Redis(e.to_string()))?;

        Ok(())
    }

    fn subscribe(&self) -> Subscription<OverrideChanged> {
        let (tx, rx) = mpsc::channel();

        let client = self.client.clone();
        let channel = self.channel.clone();

        // Background thread that receives pub/sub messages and forwards them.
        // It exits once the subscription's receiver is dropped.
        thread::spawn(move || {
            let mut conn = match client.get_connection() {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!(error = %e, "redis subscription connection failed");
                    return;
                }
            };

            let mut pubsub = conn.as_pubsub();
            if let Err(e) = pubsub.subscribe(&channel) {
                tracing::error!(error = %e, channel = %channel, "redis subscribe failed");
                return;
            }

            loop {
                let msg = match pubsub.get_message() {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::warn!(error = %e, "redis subscription closed");
                        return;
                    }
                };

                let payload: String = match msg.get_payload() {
                    Ok(p) => p,
                    Err(_) => continue,
                };

                let notification: OverrideChanged = match serde_json::from_str(&payload) {
                    Ok(n) => n,
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping undecodable override notification");
                        continue;
                    }
                };

                if tx.send(notification).is_err() {
                    return;
                }
            }
        });

        Subscription::new(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_a_client_does_not_connect() {
        let bus = RedisPubSubOverrideBus::new("redis://127.0.0.1:6379", "tenant_overrides").unwrap();
        assert_eq!(bus.channel(), "tenant_overrides");
    }

    #[test]
    fn rejects_malformed_urls() {
        let err = RedisPubSubOverrideBus::new("not a redis url", "tenant_overrides").unwrap_err();
        assert!(matches!(err, RedisBusError::Redis(_)));
    }
}
