//! Infrastructure-backed notification buses.
//!
//! The bus abstraction lives in `tenantry-events` as pure mechanics. This
//! module provides the cross-process transport for override notifications.

#[cfg(feature = "redis")]
pub mod redis_pubsub;

#[cfg(feature = "redis")]
pub use redis_pubsub::{RedisBusError, RedisPubSubOverrideBus};
