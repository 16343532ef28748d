//! Infrastructure layer: configuration and shipment persistence adapters.

pub mod config;
pub mod shipment_store;

pub use config::{ConfigError, InfraConfig};
pub use shipment_store::{
    InMemoryShipmentStore, PostgresShipmentStore, StoredShipment, resolve_recorded_source,
};
