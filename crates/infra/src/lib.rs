//! Infrastructure layer: override persistence, live propagation, configuration.

pub mod config;
pub mod event_bus;
pub mod override_store;

#[cfg(test)]
mod integration_tests;

pub use config::Settings;
pub use override_store::{
    InMemoryOverrideRepository, OverrideRecord, OverrideRepository, OverrideStore,
    PostgresOverrideRepository, RepositoryError, SetOverrideError, SubscriptionHandle,
};
