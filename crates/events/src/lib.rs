//! `tenantry-events` — change-notification mechanics.
//!
//! Pub/sub plumbing for pushing override changes to every client that
//! renders a tenant's workspace.

pub mod bus;
pub mod in_memory_bus;
pub mod notification;
pub mod tenant;

pub use bus::{EventBus, Subscription};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use notification::OverrideChanged;
pub use tenant::TenantScoped;
