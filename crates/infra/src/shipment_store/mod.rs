//! Shipment persistence adapters.
//!
//! Both adapters implement [`quickship_shipping::ShipmentStore`]: shipments
//! staged in a transaction become visible only on commit.

pub mod in_memory;
pub mod postgres;

pub use in_memory::{InMemoryShipmentStore, StoredShipment};
pub use postgres::PostgresShipmentStore;

use quickship_inventory::SourceCode;
use quickship_shipping::ShipmentRequest;

/// Source a shipment is recorded against.
///
/// A fallback-bucket shipment that deducts nothing is recorded against
/// `default_source`; everything else keeps its allocated source.
pub fn resolve_recorded_source(request: &ShipmentRequest, default_source: &str) -> SourceCode {
    match &request.source {
        SourceCode::Unmatched if request.deduction_skipped => SourceCode::real(default_source),
        source => source.clone(),
    }
}
