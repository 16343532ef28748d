//! Persistence boundary for shipments.
//!
//! A [`ShipmentStore`] hands out transactions; every shipment of one order is
//! created inside a single [`ShipmentTransaction`] and becomes visible only on
//! commit. Implementations live in `quickship-infra`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use quickship_core::{OrderId, ShipmentId};
use quickship_inventory::SourceCode;

use crate::grouper::ShipmentItem;

/// Free-text note attached to every shipment of one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentComment {
    pub text: String,
    pub visible_on_front: bool,
}

/// Carrier tracking information attached to every shipment of one attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub track_number: String,
    pub title: String,
    pub carrier_code: String,
}

impl TrackingRecord {
    pub fn new(
        track_number: impl Into<String>,
        title: impl Into<String>,
        carrier_code: impl Into<String>,
    ) -> Self {
        Self {
            track_number: track_number.into(),
            title: title.into(),
            carrier_code: carrier_code.into(),
        }
    }

    /// Empty only when number, title and carrier are all blank.
    pub fn is_empty(&self) -> bool {
        [&self.track_number, &self.title, &self.carrier_code]
            .iter()
            .all(|field| field.trim().is_empty())
    }
}

/// Everything needed to create one shipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipmentRequest {
    pub order_id: OrderId,
    pub source: SourceCode,
    pub items: Vec<ShipmentItem>,
    pub comment: Option<ShipmentComment>,
    pub track: Option<TrackingRecord>,
    /// Stock must not be decremented for this shipment.
    pub deduction_skipped: bool,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Opens transactions for shipment creation.
pub trait ShipmentStore: Send + Sync {
    type Transaction<'a>: ShipmentTransaction
    where
        Self: 'a;

    fn begin(&self) -> Result<Self::Transaction<'_>, StoreError>;
}

/// Unit of work spanning every shipment of one order.
///
/// Dropping a transaction without calling [`commit`](Self::commit) must
/// discard its writes.
pub trait ShipmentTransaction {
    /// Stage one shipment and return its id.
    fn create_shipment(&mut self, request: &ShipmentRequest) -> Result<ShipmentId, StoreError>;

    fn commit(self) -> Result<(), StoreError>;

    fn rollback(self) -> Result<(), StoreError>;
}

impl<S> ShipmentStore for Arc<S>
where
    S: ShipmentStore,
{
    type Transaction<'a>
        = S::Transaction<'a>
    where
        Self: 'a;

    fn begin(&self) -> Result<Self::Transaction<'_>, StoreError> {
        (**self).begin()
    }
}
