//! Ship many orders, one transaction each.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use quickship_inventory::SourceOracle;
use quickship_sales::{Order, ShippabilityValidator};

use crate::error::ShipmentError;
use crate::request::ShipOrderRequest;
use crate::service::{ShipmentReceipt, ShipmentService};
use crate::store::ShipmentStore;

/// Per-order outcomes of a batch, keyed by increment id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchShipReport {
    pub shipped: Vec<(String, ShipmentReceipt)>,
    /// Orders the validator rejected or that had nothing left to ship.
    pub not_shippable: Vec<(String, String)>,
    /// Orders that failed during allocation or persistence.
    pub failed: Vec<(String, String)>,
}

impl BatchShipReport {
    pub fn total(&self) -> usize {
        self.shipped.len() + self.not_shippable.len() + self.failed.len()
    }
}

/// Ship each order independently; a failure on one never affects another.
#[instrument(skip_all)]
pub fn ship_orders<'o, V, O, S, I>(
    service: &ShipmentService<V, O, S>,
    orders: I,
    request: &ShipOrderRequest,
) -> BatchShipReport
where
    V: ShippabilityValidator,
    O: SourceOracle,
    S: ShipmentStore,
    I: IntoIterator<Item = &'o Order>,
{
    let mut report = BatchShipReport::default();

    for order in orders {
        let key = order.increment_id().to_string();
        if !order.can_ship() {
            report
                .not_shippable
                .push((key, "order cannot be shipped in its current state".to_string()));
            continue;
        }
        match service.ship(order, request.clone()) {
            Ok(receipt) => report.shipped.push((key, receipt)),
            Err(
                err @ (ShipmentError::OrderNotShippable(_) | ShipmentError::NoShippableItems),
            ) => report.not_shippable.push((key, err.to_string())),
            Err(err) => report.failed.push((key, err.to_string())),
        }
    }

    info!(
        shipped = report.shipped.len(),
        not_shippable = report.not_shippable.len(),
        failed = report.failed.len(),
        "batch shipment finished"
    );
    report
}
