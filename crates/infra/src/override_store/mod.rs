//! Runtime override layer: persistence + live propagation.
//!
//! ```text
//! set_override
//!   ↓
//! 1. policy precondition (no IO on violation)
//!   ↓
//! 2. optimistic cache update + recompute
//!   ↓
//! 3. persist the whole per-tenant blob (rollback on failure)
//!   ↓
//! 4. publish OverrideChanged → every subscriber (writer included) reconciles
//! ```
//!
//! Known limitation: writes replace the tenant's whole blob. Two admins
//! editing different keys of the same tenant concurrently race, and the later
//! snapshot silently drops the earlier change (last writer wins per tenant,
//! not per key).

pub mod postgres;
pub mod repository;
pub mod store;
pub mod subscription;

pub use postgres::PostgresOverrideRepository;
pub use repository::{InMemoryOverrideRepository, OverrideRecord, OverrideRepository, RepositoryError};
pub use store::{OverrideStore, Reconciliation, SetOverrideError, TenantSnapshot};
pub use subscription::SubscriptionHandle;
