//! Source-selection boundary.
//!
//! How sources are ranked is not this crate's business: the oracle answers
//! "for this order, SKU and quantity, which sources and how much of each".

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use quickship_core::{OrderId, Quantity, Sku};

/// One candidate returned by the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSelection {
    pub source_code: String,
    pub quantity: Quantity,
}

impl SourceSelection {
    pub fn new(source_code: impl Into<String>, quantity: Quantity) -> Self {
        Self {
            source_code: source_code.into(),
            quantity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OracleError {
    /// The SKU/order pairing is unknown to inventory tracking.
    #[error("no inventory record for sku '{sku}'")]
    NotFound { sku: Sku },

    /// The oracle itself failed (lookup backend unavailable, etc.).
    #[error("source selection failed: {0}")]
    Backend(String),
}

/// Source selection oracle.
///
/// Returned quantities are expected to sum to at most the requested quantity;
/// callers do not rely on it.
pub trait SourceOracle: Send + Sync {
    fn query(
        &self,
        order_id: OrderId,
        sku: &Sku,
        quantity: Quantity,
    ) -> Result<Vec<SourceSelection>, OracleError>;
}

impl<O> SourceOracle for Arc<O>
where
    O: SourceOracle + ?Sized,
{
    fn query(
        &self,
        order_id: OrderId,
        sku: &Sku,
        quantity: Quantity,
    ) -> Result<Vec<SourceSelection>, OracleError> {
        (**self).query(order_id, sku, quantity)
    }
}
