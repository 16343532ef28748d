//! End-to-end shipment flow for one order.

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use quickship_core::OrderId;
use quickship_inventory::{QuantityConstraints, SourceAllocator, SourceOracle};
use quickship_sales::{Order, ShippabilityValidator};

use crate::commit::{CommittedShipment, ShipmentCommitManager};
use crate::error::ShipmentError;
use crate::plan::{ShipmentPlan, build_shipment_plan};
use crate::request::{ShipOrderRequest, ShipmentOptions};
use crate::store::ShipmentStore;

/// Outcome of a successful attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentReceipt {
    pub order_id: OrderId,
    pub shipments: Vec<CommittedShipment>,
}

/// Validate → allocate → group → commit.
///
/// Holds no per-attempt state; one service can serve many orders, including
/// concurrently when its collaborators allow it.
#[derive(Debug, Clone)]
pub struct ShipmentService<V, O, S> {
    validator: V,
    allocator: SourceAllocator<O>,
    committer: ShipmentCommitManager<S>,
}

impl<V, O, S> ShipmentService<V, O, S>
where
    V: ShippabilityValidator,
    O: SourceOracle,
    S: ShipmentStore,
{
    pub fn new(validator: V, oracle: O, store: S) -> Self {
        Self {
            validator,
            allocator: SourceAllocator::new(oracle),
            committer: ShipmentCommitManager::new(store),
        }
    }

    pub fn store(&self) -> &S {
        self.committer.store()
    }

    pub fn oracle(&self) -> &O {
        self.allocator.oracle()
    }

    /// Dry run: everything up to, but excluding, persistence.
    pub fn plan(
        &self,
        order: &Order,
        request: ShipOrderRequest,
    ) -> Result<ShipmentPlan, ShipmentError> {
        build_shipment_plan(&self.validator, &self.allocator, order, request)
    }

    /// Persist a previously built plan.
    pub fn commit(&self, plan: &ShipmentPlan) -> Result<ShipmentReceipt, ShipmentError> {
        let shipments = self.committer.commit(
            plan.order_id,
            &plan.groups,
            plan.options.skip_inventory_deduction,
            plan.comment.as_ref(),
            plan.track.as_ref(),
        )?;
        Ok(ShipmentReceipt {
            order_id: plan.order_id,
            shipments,
        })
    }

    /// Full attempt with explicit options and metadata.
    #[instrument(skip_all, fields(order_id = %order.id(), increment_id = order.increment_id()))]
    pub fn ship(
        &self,
        order: &Order,
        request: ShipOrderRequest,
    ) -> Result<ShipmentReceipt, ShipmentError> {
        let plan = match self.plan(order, request) {
            Ok(plan) => plan,
            Err(err) => {
                warn!(error = %err, "shipment not planned");
                return Err(err);
            }
        };

        match self.commit(&plan) {
            Ok(receipt) => {
                info!(shipments = receipt.shipments.len(), "order shipped");
                Ok(receipt)
            }
            Err(err) => {
                warn!(error = %err, retriable = err.is_retriable(), "shipment commit failed");
                Err(err)
            }
        }
    }

    /// Ship `order`, with one switch controlling both deduction skipping and
    /// fallback allocation, and no comment or tracking.
    pub fn ship_order(
        &self,
        order: &Order,
        constraints: QuantityConstraints,
        skip_inventory_check: bool,
    ) -> Result<ShipmentReceipt, ShipmentError> {
        let request = ShipOrderRequest::new()
            .with_constraints(constraints)
            .with_options(ShipmentOptions::linked(skip_inventory_check));
        self.ship(order, request)
    }
}
