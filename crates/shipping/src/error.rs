//! Shipment flow error model.

use thiserror::Error;

use quickship_core::{OrderId, Sku};
use quickship_inventory::{AllocationError, OracleError};

use crate::store::StoreError;

/// Failure of a single order's shipment attempt.
///
/// ## Error Categories
///
/// - **OrderNotShippable**: the validator rejected the order; retry only after
///   the order changes
/// - **SourceLookup**: inventory has no record of a SKU and fallback is off
/// - **SourceSelection**: the oracle itself failed
/// - **NoShippableItems**: allocation left nothing to ship (a no-op, not a fault)
/// - **InvalidAllocation**: a malformed allocation reached the grouper (a bug)
/// - **Commit**: persistence failed; the transaction was rolled back first
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShipmentError {
    #[error("order cannot be shipped: {}", .0.join(", "))]
    OrderNotShippable(Vec<String>),

    #[error("no source could be resolved for sku '{sku}' on order {order_id}")]
    SourceLookup { order_id: OrderId, sku: Sku },

    #[error("source selection failed: {0}")]
    SourceSelection(#[source] OracleError),

    #[error("no items to ship")]
    NoShippableItems,

    #[error("invalid allocation: {0}")]
    InvalidAllocation(String),

    #[error("could not save a shipment: {source}")]
    Commit {
        #[source]
        source: StoreError,
    },
}

impl ShipmentError {
    /// Whether re-running the whole attempt (validate, allocate, commit) may succeed
    /// without anything else changing first.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ShipmentError::Commit { .. } | ShipmentError::SourceSelection(_)
        )
    }
}

impl From<AllocationError> for ShipmentError {
    fn from(value: AllocationError) -> Self {
        match value {
            AllocationError::SourceLookup { order_id, sku } => {
                ShipmentError::SourceLookup { order_id, sku }
            }
            AllocationError::Oracle(err) => ShipmentError::SourceSelection(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_shippable_message_joins_reasons() {
        let err = ShipmentError::OrderNotShippable(vec![
            "order is on hold".to_string(),
            "nothing left to ship".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "order cannot be shipped: order is on hold, nothing left to ship"
        );
    }

    #[test]
    fn only_commit_and_oracle_failures_are_retriable() {
        let commit = ShipmentError::Commit {
            source: StoreError::Storage("disk full".to_string()),
        };
        assert!(commit.is_retriable());
        assert!(ShipmentError::SourceSelection(OracleError::Backend("down".to_string())).is_retriable());
        assert!(!ShipmentError::NoShippableItems.is_retriable());
        assert!(!ShipmentError::OrderNotShippable(vec![]).is_retriable());
    }

    #[test]
    fn commit_error_exposes_underlying_cause() {
        use std::error::Error as _;

        let err = ShipmentError::Commit {
            source: StoreError::Constraint("duplicate shipment".to_string()),
        };
        let cause = err.source().unwrap();
        assert!(cause.to_string().contains("duplicate shipment"));
    }
}
