use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use quickship_core::{OrderId, Quantity, Sku};

use crate::deduction::DeductionPlan;
use crate::oracle::{OracleError, SourceOracle, SourceSelection};
use crate::source::SourceCode;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StockError {
    #[error("unknown source '{0}'")]
    UnknownSource(String),

    #[error("source '{source_code}' has {available} of '{sku}', {requested} requested")]
    Insufficient {
        source_code: String,
        sku: Sku,
        requested: Quantity,
        available: Quantity,
    },

    #[error("cannot deduct from a shipment without a source")]
    UnmatchedSource,

    #[error("stock lock poisoned")]
    LockPoisoned,
}

#[derive(Debug, Clone)]
struct SourceStock {
    code: String,
    levels: HashMap<Sku, Quantity>,
}

/// In-memory, multi-source stock levels.
///
/// Sources are consulted in the order they were added (priority order).
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryStock {
    sources: RwLock<Vec<SourceStock>>,
}

impl InMemoryStock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the level of `sku` at `source_code`, registering the source if needed.
    pub fn set_level(
        &self,
        source_code: &str,
        sku: Sku,
        quantity: Quantity,
    ) -> Result<(), StockError> {
        let mut sources = self.sources.write().map_err(|_| StockError::LockPoisoned)?;
        match sources.iter_mut().find(|s| s.code == source_code) {
            Some(source) => {
                source.levels.insert(sku, quantity);
            }
            None => sources.push(SourceStock {
                code: source_code.to_string(),
                levels: HashMap::from([(sku, quantity)]),
            }),
        }
        Ok(())
    }

    pub fn level(&self, source_code: &str, sku: &Sku) -> Option<Quantity> {
        let sources = self.sources.read().ok()?;
        sources
            .iter()
            .find(|s| s.code == source_code)
            .and_then(|s| s.levels.get(sku).copied())
    }

    /// Apply a deduction plan; either every line is deducted or none is.
    pub fn apply(&self, plan: &DeductionPlan) -> Result<(), StockError> {
        self.apply_all(std::slice::from_ref(plan))
    }

    /// Apply several plans as one unit.
    pub fn apply_all(&self, plans: &[DeductionPlan]) -> Result<(), StockError> {
        let mut sources = self.sources.write().map_err(|_| StockError::LockPoisoned)?;

        // Validate against a scratch copy so a failure leaves stock untouched.
        let mut scratch = sources.clone();
        for plan in plans {
            if plan.items.is_empty() {
                continue;
            }
            let code = match &plan.source {
                SourceCode::Real(code) => code,
                SourceCode::Unmatched => return Err(StockError::UnmatchedSource),
            };
            let source = scratch
                .iter_mut()
                .find(|s| &s.code == code)
                .ok_or_else(|| StockError::UnknownSource(code.clone()))?;

            for item in &plan.items {
                let available = source.levels.get(&item.sku).copied().unwrap_or_default();
                if item.quantity.value() > available.value() + Quantity::EPSILON {
                    return Err(StockError::Insufficient {
                        source_code: code.clone(),
                        sku: item.sku.clone(),
                        requested: item.quantity,
                        available,
                    });
                }
                source
                    .levels
                    .insert(item.sku.clone(), available.saturating_sub(item.quantity));
            }
        }

        *sources = scratch;
        Ok(())
    }
}

impl SourceOracle for InMemoryStock {
    /// Greedy draw in source priority order.
    fn query(
        &self,
        _order_id: OrderId,
        sku: &Sku,
        quantity: Quantity,
    ) -> Result<Vec<SourceSelection>, OracleError> {
        let sources = self
            .sources
            .read()
            .map_err(|_| OracleError::Backend("stock lock poisoned".to_string()))?;

        if !sources.iter().any(|s| s.levels.contains_key(sku)) {
            return Err(OracleError::NotFound { sku: sku.clone() });
        }

        let mut remaining = quantity;
        let mut selections = Vec::new();
        for source in sources.iter() {
            if !remaining.is_positive() {
                break;
            }
            let Some(level) = source.levels.get(sku).copied() else {
                continue;
            };
            let take = level.min(remaining);
            if take.is_positive() {
                selections.push(SourceSelection::new(source.code.clone(), take));
                remaining = remaining.saturating_sub(take);
            }
        }
        Ok(selections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deduction::ItemToDeduct;

    fn qty(v: f64) -> Quantity {
        Quantity::new(v).unwrap()
    }

    fn sku(s: &str) -> Sku {
        Sku::new(s).unwrap()
    }

    fn stock() -> InMemoryStock {
        let stock = InMemoryStock::new();
        stock.set_level("primary", sku("A"), qty(2.0)).unwrap();
        stock.set_level("overflow", sku("A"), qty(5.0)).unwrap();
        stock.set_level("overflow", sku("B"), qty(1.0)).unwrap();
        stock
    }

    #[test]
    fn query_draws_in_priority_order() {
        let selections = stock().query(OrderId::new(), &sku("A"), qty(4.0)).unwrap();
        assert_eq!(
            selections,
            vec![
                SourceSelection::new("primary", qty(2.0)),
                SourceSelection::new("overflow", qty(2.0)),
            ]
        );
    }

    #[test]
    fn query_reports_short_supply_without_padding() {
        let selections = stock().query(OrderId::new(), &sku("B"), qty(3.0)).unwrap();
        assert_eq!(selections, vec![SourceSelection::new("overflow", qty(1.0))]);
    }

    #[test]
    fn untracked_sku_is_not_found() {
        let err = stock().query(OrderId::new(), &sku("Z"), qty(1.0)).unwrap_err();
        assert_eq!(err, OracleError::NotFound { sku: sku("Z") });
    }

    #[test]
    fn failed_apply_leaves_levels_untouched() {
        let stock = stock();
        let plans = vec![
            DeductionPlan {
                source: SourceCode::real("primary"),
                items: vec![ItemToDeduct {
                    sku: sku("A"),
                    quantity: qty(1.0),
                }],
            },
            DeductionPlan {
                source: SourceCode::real("overflow"),
                items: vec![ItemToDeduct {
                    sku: sku("B"),
                    quantity: qty(9.0),
                }],
            },
        ];

        let err = stock.apply_all(&plans).unwrap_err();
        assert!(matches!(err, StockError::Insufficient { .. }));
        assert_eq!(stock.level("primary", &sku("A")), Some(qty(2.0)));
    }

    #[test]
    fn apply_deducts_levels() {
        let stock = stock();
        stock
            .apply(&DeductionPlan {
                source: SourceCode::real("overflow"),
                items: vec![ItemToDeduct {
                    sku: sku("A"),
                    quantity: qty(1.5),
                }],
            })
            .unwrap();
        assert_eq!(stock.level("overflow", &sku("A")), Some(qty(3.5)));
    }
}
