//! Allocation output → per-source "items to ship".

use serde::{Deserialize, Serialize};

use quickship_core::{OrderItemId, Quantity, Sku};
use quickship_inventory::{SourceCode, SourceGroup};

use crate::error::ShipmentError;

/// One order item quantity to put on a shipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentItem {
    pub order_item_id: OrderItemId,
    pub sku: Sku,
    pub quantity: Quantity,
}

/// Shipment items bucketed by source, in allocation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShipmentGroups {
    groups: Vec<(SourceCode, Vec<ShipmentItem>)>,
}

impl ShipmentGroups {
    pub fn iter(&self) -> impl Iterator<Item = (&SourceCode, &[ShipmentItem])> {
        self.groups.iter().map(|(s, items)| (s, items.as_slice()))
    }

    pub fn get(&self, source: &SourceCode) -> Option<&[ShipmentItem]> {
        self.groups
            .iter()
            .find(|(s, _)| s == source)
            .map(|(_, items)| items.as_slice())
    }

    pub fn source_codes(&self) -> Vec<&SourceCode> {
        self.groups.iter().map(|(s, _)| s).collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Convert a [`SourceGroup`] 1:1 into [`ShipmentGroups`].
pub fn group_for_shipment(group: &SourceGroup) -> Result<ShipmentGroups, ShipmentError> {
    let mut groups = Vec::with_capacity(group.len());

    for (source, allocations) in group.iter() {
        let mut items = Vec::with_capacity(allocations.len());
        for allocation in allocations {
            if allocation.item_id.is_nil() {
                return Err(ShipmentError::InvalidAllocation(format!(
                    "allocation for sku '{}' at '{}' has no order item",
                    allocation.sku, source
                )));
            }
            if !allocation.quantity.is_positive() {
                return Err(ShipmentError::InvalidAllocation(format!(
                    "allocation for item {} at '{}' has non-positive quantity {}",
                    allocation.item_id, source, allocation.quantity
                )));
            }
            items.push(ShipmentItem {
                order_item_id: allocation.item_id,
                sku: allocation.sku.clone(),
                quantity: allocation.quantity,
            });
        }
        groups.push((source.clone(), items));
    }

    Ok(ShipmentGroups { groups })
}
