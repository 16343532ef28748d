use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use quickship_core::{OrderId, ShipmentId};
use quickship_inventory::{
    AnySku, DeductionPlan, InMemoryStock, ItemToDeduct, SkipScope, SkuCatalog, SourceCode,
    items_to_deduct,
};
use quickship_shipping::{
    ShipmentComment, ShipmentItem, ShipmentRequest, ShipmentStore, ShipmentTransaction,
    StoreError, TrackingRecord,
};

use super::resolve_recorded_source;
use crate::config::DEFAULT_SOURCE_CODE;

/// A committed shipment as held by [`InMemoryShipmentStore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredShipment {
    pub shipment_id: ShipmentId,
    pub order_id: OrderId,
    /// Source the shipment is recorded against (after default-source reassignment).
    pub source: SourceCode,
    pub items: Vec<ShipmentItem>,
    pub comment: Option<ShipmentComment>,
    pub track: Option<TrackingRecord>,
    pub deduction_skipped: bool,
    /// Stock taken out at commit; empty when no stock is wired.
    pub deducted: Vec<ItemToDeduct>,
    pub created_at: DateTime<Utc>,
}

struct StockWiring {
    stock: Arc<InMemoryStock>,
    catalog: Arc<dyn SkuCatalog>,
    skip_scope: SkipScope,
}

/// In-memory shipment store.
///
/// Intended for tests/dev. Not optimized for performance.
pub struct InMemoryShipmentStore {
    shipments: RwLock<Vec<StoredShipment>>,
    default_source: String,
    fail_on_submission: Option<usize>,
    stock: Option<StockWiring>,
}

impl Default for InMemoryShipmentStore {
    fn default() -> Self {
        Self {
            shipments: RwLock::new(Vec::new()),
            default_source: DEFAULT_SOURCE_CODE.to_string(),
            fail_on_submission: None,
            stock: None,
        }
    }
}

impl std::fmt::Debug for InMemoryShipmentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryShipmentStore")
            .field("default_source", &self.default_source)
            .field("fail_on_submission", &self.fail_on_submission)
            .field("stock_wired", &self.stock.is_some())
            .finish_non_exhaustive()
    }
}

impl InMemoryShipmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_source(mut self, default_source: impl Into<String>) -> Self {
        self.default_source = default_source.into();
        self
    }

    /// Fail the `n`-th shipment submitted within any single transaction (1-based).
    pub fn fail_on_submission(mut self, n: usize) -> Self {
        self.fail_on_submission = Some(n);
        self
    }

    /// Deduct stock at commit, atomically with the shipments.
    pub fn with_stock<C>(mut self, stock: Arc<InMemoryStock>, catalog: C) -> Self
    where
        C: SkuCatalog + 'static,
    {
        self.stock = Some(StockWiring {
            stock,
            catalog: Arc::new(catalog),
            skip_scope: SkipScope::default(),
        });
        self
    }

    /// Narrow "skip deduction" to SKUs the wired catalog does not know.
    ///
    /// No effect until stock is wired.
    pub fn with_skip_scope(mut self, scope: SkipScope) -> Self {
        if let Some(wiring) = &mut self.stock {
            wiring.skip_scope = scope;
        }
        self
    }

    /// Same as [`with_stock`](Self::with_stock) with a catalog that knows every SKU.
    pub fn with_stock_any_sku(self, stock: Arc<InMemoryStock>) -> Self {
        self.with_stock(stock, AnySku)
    }

    pub fn shipments(&self) -> Result<Vec<StoredShipment>, StoreError> {
        let shipments = self.shipments.read().map_err(|_| lock_poisoned())?;
        Ok(shipments.clone())
    }

    pub fn shipments_for_order(&self, order_id: OrderId) -> Result<Vec<StoredShipment>, StoreError> {
        let shipments = self.shipments.read().map_err(|_| lock_poisoned())?;
        Ok(shipments
            .iter()
            .filter(|s| s.order_id == order_id)
            .cloned()
            .collect())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let shipments = self.shipments.read().map_err(|_| lock_poisoned())?;
        Ok(shipments.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    fn deduction_for(&self, request: &ShipmentRequest) -> Result<DeductionPlan, StoreError> {
        let Some(wiring) = &self.stock else {
            return Ok(DeductionPlan {
                source: resolve_recorded_source(request, &self.default_source),
                items: Vec::new(),
            });
        };

        items_to_deduct(
            &request.source,
            request.deduction_skipped,
            wiring.skip_scope,
            request.items.iter().map(|i| (i.sku.clone(), i.quantity)),
            wiring.catalog.as_ref(),
            &self.default_source,
        )
        .map_err(|err| StoreError::Constraint(err.to_string()))
    }
}

fn lock_poisoned() -> StoreError {
    StoreError::Storage("lock poisoned".to_string())
}

/// Writes staged by one [`InMemoryShipmentStore`] transaction.
#[derive(Debug)]
pub struct InMemoryShipmentTransaction<'a> {
    store: &'a InMemoryShipmentStore,
    staged: Vec<(StoredShipment, DeductionPlan)>,
    submissions: usize,
}

impl ShipmentStore for InMemoryShipmentStore {
    type Transaction<'a>
        = InMemoryShipmentTransaction<'a>
    where
        Self: 'a;

    fn begin(&self) -> Result<Self::Transaction<'_>, StoreError> {
        Ok(InMemoryShipmentTransaction {
            store: self,
            staged: Vec::new(),
            submissions: 0,
        })
    }
}

impl ShipmentTransaction for InMemoryShipmentTransaction<'_> {
    fn create_shipment(&mut self, request: &ShipmentRequest) -> Result<ShipmentId, StoreError> {
        self.submissions += 1;
        if self.store.fail_on_submission == Some(self.submissions) {
            return Err(StoreError::Storage(format!(
                "injected failure on submission {}",
                self.submissions
            )));
        }

        let plan = self.store.deduction_for(request)?;
        let shipment = StoredShipment {
            shipment_id: ShipmentId::new(),
            order_id: request.order_id,
            source: plan.source.clone(),
            items: request.items.clone(),
            comment: request.comment.clone(),
            track: request.track.clone(),
            deduction_skipped: request.deduction_skipped,
            deducted: plan.items.clone(),
            created_at: Utc::now(),
        };
        let shipment_id = shipment.shipment_id;
        self.staged.push((shipment, plan));
        Ok(shipment_id)
    }

    fn commit(self) -> Result<(), StoreError> {
        let mut shipments = self.store.shipments.write().map_err(|_| lock_poisoned())?;

        if let Some(wiring) = &self.store.stock {
            let plans: Vec<DeductionPlan> = self.staged.iter().map(|(_, p)| p.clone()).collect();
            wiring
                .stock
                .apply_all(&plans)
                .map_err(|err| StoreError::Constraint(err.to_string()))?;
        }

        debug!(count = self.staged.len(), "shipments committed");
        shipments.extend(self.staged.into_iter().map(|(s, _)| s));
        Ok(())
    }

    fn rollback(self) -> Result<(), StoreError> {
        debug!(count = self.staged.len(), "staged shipments discarded");
        Ok(())
    }
}
