//! What a persisted shipment takes out of stock.
//!
//! A shipment flagged "skip deduction" takes nothing out of stock. A skipped
//! fallback-bucket shipment is also recorded against the default source.
//! With [`SkipScope::UnknownSkus`] the flag is narrowed to SKUs the catalog no
//! longer knows, and every other item is deducted as usual.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use quickship_core::{Quantity, Sku};

use crate::source::SourceCode;

/// Answers whether a SKU still maps to a catalog product.
pub trait SkuCatalog: Send + Sync {
    fn contains(&self, sku: &Sku) -> bool;
}

impl<C> SkuCatalog for Arc<C>
where
    C: SkuCatalog + ?Sized,
{
    fn contains(&self, sku: &Sku) -> bool {
        (**self).contains(sku)
    }
}

impl SkuCatalog for HashSet<Sku> {
    fn contains(&self, sku: &Sku) -> bool {
        HashSet::contains(self, sku)
    }
}

/// Catalog that knows every SKU.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnySku;

impl SkuCatalog for AnySku {
    fn contains(&self, _sku: &Sku) -> bool {
        true
    }
}

/// How far a "skip deduction" flag reaches on a real-source shipment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipScope {
    /// Nothing on the shipment is deducted.
    #[default]
    AllItems,
    /// Only items whose SKU is missing from the catalog are left alone.
    UnknownSkus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemToDeduct {
    pub sku: Sku,
    pub quantity: Quantity,
}

/// Deduction resolved for one shipment.
///
/// `source` is where the shipment ends up recorded; for a skipped fallback
/// shipment that is the default source, with nothing to deduct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeductionPlan {
    pub source: SourceCode,
    pub items: Vec<ItemToDeduct>,
}

impl DeductionPlan {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeductionError {
    #[error("cannot deduct stock for a shipment without a source")]
    UnmatchedSource,
}

/// Resolve the stock deduction for a shipment from `source`.
///
/// `catalog` is only consulted under [`SkipScope::UnknownSkus`]. Quantities
/// for the same SKU are summed, first-appearance order kept.
pub fn items_to_deduct<I, C>(
    source: &SourceCode,
    deduction_skipped: bool,
    scope: SkipScope,
    items: I,
    catalog: &C,
    default_source: &str,
) -> Result<DeductionPlan, DeductionError>
where
    I: IntoIterator<Item = (Sku, Quantity)>,
    C: SkuCatalog + ?Sized,
{
    match (source, deduction_skipped) {
        (SourceCode::Unmatched, true) => Ok(DeductionPlan {
            source: SourceCode::real(default_source),
            items: Vec::new(),
        }),
        (SourceCode::Unmatched, false) => Err(DeductionError::UnmatchedSource),
        (SourceCode::Real(_), true) if scope == SkipScope::AllItems => Ok(DeductionPlan {
            source: source.clone(),
            items: Vec::new(),
        }),
        (SourceCode::Real(_), skipped) => {
            let mut merged: Vec<ItemToDeduct> = Vec::new();
            for (sku, quantity) in items {
                if skipped && !catalog.contains(&sku) {
                    continue;
                }
                match merged.iter_mut().find(|i| i.sku == sku) {
                    Some(existing) => existing.quantity = existing.quantity + quantity,
                    None => merged.push(ItemToDeduct { sku, quantity }),
                }
            }
            Ok(DeductionPlan {
                source: source.clone(),
                items: merged,
            })
        }
    }
}
