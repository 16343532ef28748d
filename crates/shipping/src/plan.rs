//! Validate, allocate and group an order without touching persistence.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use quickship_core::OrderId;
use quickship_inventory::{SourceAllocator, SourceOracle};
use quickship_sales::{Order, ShippabilityValidator};

use crate::error::ShipmentError;
use crate::grouper::{ShipmentGroups, group_for_shipment};
use crate::request::{ShipOrderRequest, ShipmentOptions};
use crate::store::{ShipmentComment, TrackingRecord};

/// What would be committed for an order: groups plus shared metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentPlan {
    pub order_id: OrderId,
    pub groups: ShipmentGroups,
    pub options: ShipmentOptions,
    pub comment: Option<ShipmentComment>,
    pub track: Option<TrackingRecord>,
}

/// Build a plan for `order`.
///
/// Has no side effects of its own: calling it twice with the same inputs
/// against an unchanged oracle yields equal plans. A rejected order fails
/// before the oracle is queried.
#[instrument(skip_all, fields(order_id = %order.id()))]
pub fn build_shipment_plan<V, O>(
    validator: &V,
    allocator: &SourceAllocator<O>,
    order: &Order,
    request: ShipOrderRequest,
) -> Result<ShipmentPlan, ShipmentError>
where
    V: ShippabilityValidator + ?Sized,
    O: SourceOracle,
{
    let messages = validator.validate(order);
    if !messages.is_empty() {
        return Err(ShipmentError::OrderNotShippable(messages));
    }

    let items = order.items_to_ship();
    let allocation = allocator.allocate(
        order.id(),
        &items,
        &request.constraints,
        request.options.allocation_policy(),
    )?;

    let groups = group_for_shipment(&allocation)?;
    if groups.is_empty() {
        return Err(ShipmentError::NoShippableItems);
    }
    debug!(sources = groups.len(), "shipment plan built");

    Ok(ShipmentPlan {
        order_id: order.id(),
        groups,
        options: request.options,
        comment: request.comment,
        track: request.track,
    })
}
