// Port Layer - Interfaces for external dependencies

pub mod id_provider;
pub mod item_worker;
pub mod provider_client;
pub mod time_provider;

// Re-exports
pub use id_provider::IdProvider;
pub use item_worker::{ItemWorker, WorkError};
pub use provider_client::{ProviderClient, ProviderError};
pub use time_provider::TimeProvider;
