//! Source allocation: how much of each order item to draw from which source.
//!
//! ```text
//! items ──► effective quantity (constraints, remaining-to-ship)
//!       ──► oracle candidates (trimmed, merged per source)
//!       ──► optional fallback bucket for the shortfall
//!       ──► SourceGroup (source → allocations, first-appearance order)
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use quickship_core::{OrderId, OrderItemId, Quantity, Sku};
use quickship_sales::OrderItem;

use crate::oracle::{OracleError, SourceOracle, SourceSelection};
use crate::source::SourceCode;

/// Per-SKU caps requested by the caller.
///
/// An empty set means "no constraints": every item ships its full remaining
/// quantity. A non-empty set is exhaustive: SKUs missing from it are not
/// shipped at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuantityConstraints(HashMap<Sku, Quantity>);

impl QuantityConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sku: Sku, quantity: Quantity) -> Self {
        self.0.insert(sku, quantity);
        self
    }

    pub fn insert(&mut self, sku: Sku, quantity: Quantity) {
        self.0.insert(sku, quantity);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, sku: &Sku) -> Option<Quantity> {
        self.0.get(sku).copied()
    }

    /// Quantity to allocate for `sku` given what is left to ship, or `None`
    /// when the constraint set excludes the SKU.
    pub fn effective_quantity(&self, sku: &Sku, remaining: Quantity) -> Option<Quantity> {
        if self.0.is_empty() {
            return Some(remaining);
        }
        self.get(sku).map(|cap| cap.min(remaining))
    }
}

impl FromIterator<(Sku, Quantity)> for QuantityConstraints {
    fn from_iter<I: IntoIterator<Item = (Sku, Quantity)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Allocation behaviour switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPolicy {
    /// Put any quantity the oracle cannot cover into the unmatched bucket
    /// (and tolerate SKUs unknown to inventory) instead of under-allocating.
    pub force_fallback: bool,
}

impl AllocationPolicy {
    pub fn strict() -> Self {
        Self {
            force_fallback: false,
        }
    }

    pub fn with_fallback() -> Self {
        Self {
            force_fallback: true,
        }
    }
}

/// One quantity of one order item assigned to one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceAllocation {
    pub item_id: OrderItemId,
    pub sku: Sku,
    pub quantity: Quantity,
    pub source: SourceCode,
}

/// Allocations bucketed by source, in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceGroup {
    buckets: Vec<(SourceCode, Vec<SourceAllocation>)>,
}

impl SourceGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, allocation: SourceAllocation) {
        match self
            .buckets
            .iter_mut()
            .find(|(source, _)| *source == allocation.source)
        {
            Some((_, allocations)) => allocations.push(allocation),
            None => self
                .buckets
                .push((allocation.source.clone(), vec![allocation])),
        }
    }

    pub fn get(&self, source: &SourceCode) -> Option<&[SourceAllocation]> {
        self.buckets
            .iter()
            .find(|(s, _)| s == source)
            .map(|(_, allocations)| allocations.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SourceCode, &[SourceAllocation])> {
        self.buckets.iter().map(|(s, a)| (s, a.as_slice()))
    }

    pub fn source_codes(&self) -> Vec<&SourceCode> {
        self.buckets.iter().map(|(s, _)| s).collect()
    }

    /// Number of distinct sources.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Sum of one item's allocations across all sources.
    pub fn total_for_item(&self, item_id: OrderItemId) -> Quantity {
        self.buckets
            .iter()
            .flat_map(|(_, allocations)| allocations.iter())
            .filter(|a| a.item_id == item_id)
            .map(|a| a.quantity)
            .sum()
    }

    pub fn into_buckets(self) -> Vec<(SourceCode, Vec<SourceAllocation>)> {
        self.buckets
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AllocationError {
    /// Inventory has no record of the SKU for this order and fallback is off.
    #[error("no source could be resolved for sku '{sku}' on order {order_id}")]
    SourceLookup { order_id: OrderId, sku: Sku },

    /// The oracle failed for a reason other than "not found".
    #[error(transparent)]
    Oracle(#[from] OracleError),
}

/// Splits order items across inventory sources using a [`SourceOracle`].
#[derive(Debug, Clone)]
pub struct SourceAllocator<O> {
    oracle: O,
}

impl<O> SourceAllocator<O> {
    pub fn new(oracle: O) -> Self {
        Self { oracle }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }
}

impl<O> SourceAllocator<O>
where
    O: SourceOracle,
{
    /// Allocate every item, in input order.
    ///
    /// Fails on the first item whose lookup fails; no partial group is returned.
    pub fn allocate(
        &self,
        order_id: OrderId,
        items: &[&OrderItem],
        constraints: &QuantityConstraints,
        policy: AllocationPolicy,
    ) -> Result<SourceGroup, AllocationError> {
        let mut group = SourceGroup::new();
        for item in items {
            self.allocate_item(order_id, item, constraints, policy, &mut group)?;
        }
        Ok(group)
    }

    fn allocate_item(
        &self,
        order_id: OrderId,
        item: &OrderItem,
        constraints: &QuantityConstraints,
        policy: AllocationPolicy,
        group: &mut SourceGroup,
    ) -> Result<(), AllocationError> {
        let remaining = item.qty_to_ship();
        let Some(effective) = constraints.effective_quantity(&item.sku, remaining) else {
            debug!(item_id = %item.item_id, sku = %item.sku, "sku not in constraints; skipping");
            return Ok(());
        };
        if !effective.is_positive() {
            debug!(item_id = %item.item_id, sku = %item.sku, "nothing to ship; skipping");
            return Ok(());
        }

        let selections = match self.oracle.query(order_id, &item.sku, effective) {
            Ok(selections) => selections,
            Err(OracleError::NotFound { sku }) => {
                if !policy.force_fallback {
                    return Err(AllocationError::SourceLookup { order_id, sku });
                }
                debug!(%order_id, %sku, "sku unknown to inventory; using fallback bucket");
                Vec::new()
            }
            Err(err) => return Err(AllocationError::Oracle(err)),
        };

        let mut candidates = collect_candidates(item, effective, selections);

        let allocated: Quantity = candidates.iter().map(|(_, q)| *q).sum();
        let shortfall = effective.saturating_sub(allocated);
        if policy.force_fallback && shortfall.is_positive() {
            candidates.push((SourceCode::Unmatched, shortfall));
        }
        if policy.force_fallback && candidates.is_empty() {
            candidates.push((SourceCode::Unmatched, effective));
        }

        for (source, quantity) in candidates {
            group.push(SourceAllocation {
                item_id: item.item_id,
                sku: item.sku.clone(),
                quantity,
                source,
            });
        }

        Ok(())
    }
}

/// Turn raw oracle output into per-source candidates for one item.
///
/// Non-positive entries are dropped, repeated source codes are merged, and
/// anything beyond `effective` is trimmed in oracle order.
fn collect_candidates(
    item: &OrderItem,
    effective: Quantity,
    selections: Vec<SourceSelection>,
) -> Vec<(SourceCode, Quantity)> {
    let mut candidates: Vec<(SourceCode, Quantity)> = Vec::new();
    let mut budget = effective;

    for selection in selections {
        if !selection.quantity.is_positive() {
            continue;
        }
        let take = selection.quantity.min(budget);
        if !take.is_positive() {
            warn!(
                item_id = %item.item_id,
                sku = %item.sku,
                source = %selection.source_code,
                "oracle offered more than requested; ignoring excess"
            );
            continue;
        }
        budget = budget.saturating_sub(take);

        let source = SourceCode::Real(selection.source_code);
        match candidates.iter_mut().find(|(s, _)| *s == source) {
            Some((_, quantity)) => *quantity = *quantity + take,
            None => candidates.push((source, take)),
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use proptest::prelude::*;

    fn qty(v: f64) -> Quantity {
        Quantity::new(v).unwrap()
    }

    fn sku(s: &str) -> Sku {
        Sku::new(s).unwrap()
    }

    /// Oracle answering from a fixed table and recording every call.
    #[derive(Default)]
    struct ScriptedOracle {
        answers: HashMap<Sku, Result<Vec<SourceSelection>, OracleError>>,
        calls: Mutex<Vec<(Sku, Quantity)>>,
    }

    impl ScriptedOracle {
        fn answer(mut self, s: &str, selections: Vec<(&str, f64)>) -> Self {
            let selections = selections
                .into_iter()
                .map(|(code, q)| SourceSelection::new(code, qty(q)))
                .collect();
            self.answers.insert(sku(s), Ok(selections));
            self
        }

        fn fail(mut self, s: &str, err: OracleError) -> Self {
            self.answers.insert(sku(s), Err(err));
            self
        }

        fn calls(&self) -> Vec<(Sku, Quantity)> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl SourceOracle for ScriptedOracle {
        fn query(
            &self,
            _order_id: OrderId,
            sku: &Sku,
            quantity: Quantity,
        ) -> Result<Vec<SourceSelection>, OracleError> {
            self.calls.lock().unwrap().push((sku.clone(), quantity));
            self.answers
                .get(sku)
                .cloned()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn item(order_id: OrderId, s: &str, remaining: f64) -> OrderItem {
        OrderItem::new(order_id, sku(s), qty(remaining))
    }

    fn totals(group: &SourceGroup) -> Vec<(String, String, f64)> {
        group
            .iter()
            .flat_map(|(source, allocations)| {
                allocations
                    .iter()
                    .map(move |a| (source.to_string(), a.sku.to_string(), a.quantity.value()))
            })
            .collect()
    }

    fn scenario() -> (OrderId, OrderItem, OrderItem, ScriptedOracle, QuantityConstraints) {
        let order_id = OrderId::new();
        let a = item(order_id, "A", 5.0);
        let b = item(order_id, "B", 3.0);
        let oracle = ScriptedOracle::default()
            .answer("A", vec![("source1", 5.0)])
            .answer("B", vec![]);
        let constraints = QuantityConstraints::new()
            .with(sku("A"), qty(5.0))
            .with(sku("B"), qty(2.0));
        (order_id, a, b, oracle, constraints)
    }

    #[test]
    fn fallback_puts_unserved_quantity_into_unmatched_bucket() {
        let (order_id, a, b, oracle, constraints) = scenario();
        let allocator = SourceAllocator::new(oracle);

        let group = allocator
            .allocate(order_id, &[&a, &b], &constraints, AllocationPolicy::with_fallback())
            .unwrap();

        assert_eq!(
            totals(&group),
            vec![
                ("source1".to_string(), "A".to_string(), 5.0),
                ("no_source".to_string(), "B".to_string(), 2.0),
            ]
        );
        assert_eq!(
            group.source_codes(),
            vec![&SourceCode::real("source1"), &SourceCode::Unmatched]
        );
    }

    #[test]
    fn strict_policy_under_allocates_without_synthetic_bucket() {
        let (order_id, a, b, oracle, constraints) = scenario();
        let allocator = SourceAllocator::new(oracle);

        let group = allocator
            .allocate(order_id, &[&a, &b], &constraints, AllocationPolicy::strict())
            .unwrap();

        assert_eq!(
            totals(&group),
            vec![("source1".to_string(), "A".to_string(), 5.0)]
        );
        assert_eq!(group.total_for_item(b.item_id), Quantity::ZERO);
    }

    #[test]
    fn sku_missing_from_non_empty_constraints_is_skipped() {
        let order_id = OrderId::new();
        let a = item(order_id, "A", 5.0);
        let b = item(order_id, "B", 3.0);
        let allocator = SourceAllocator::new(
            ScriptedOracle::default()
                .answer("A", vec![("source1", 5.0)])
                .answer("B", vec![("source1", 2.0)]),
        );
        let constraints = QuantityConstraints::new().with(sku("B"), qty(2.0));

        let group = allocator
            .allocate(order_id, &[&a, &b], &constraints, AllocationPolicy::with_fallback())
            .unwrap();

        assert_eq!(
            totals(&group),
            vec![("source1".to_string(), "B".to_string(), 2.0)]
        );
        assert_eq!(allocator.oracle().calls(), vec![(sku("B"), qty(2.0))]);
    }

    #[test]
    fn absent_constraints_ship_full_remaining_quantity() {
        let order_id = OrderId::new();
        let a = item(order_id, "A", 4.0);
        let b = item(order_id, "B", 1.5);
        let allocator = SourceAllocator::new(
            ScriptedOracle::default()
                .answer("A", vec![("wh1", 4.0)])
                .answer("B", vec![("wh2", 1.5)]),
        );

        allocator
            .allocate(
                order_id,
                &[&a, &b],
                &QuantityConstraints::new(),
                AllocationPolicy::strict(),
            )
            .unwrap();

        assert_eq!(
            allocator.oracle().calls(),
            vec![(sku("A"), qty(4.0)), (sku("B"), qty(1.5))]
        );
    }

    #[test]
    fn constraint_above_remaining_is_clamped() {
        let order_id = OrderId::new();
        let a = item(order_id, "A", 2.0);
        let allocator = SourceAllocator::new(ScriptedOracle::default());
        let constraints = QuantityConstraints::new().with(sku("A"), qty(10.0));

        let group = allocator
            .allocate(order_id, &[&a], &constraints, AllocationPolicy::with_fallback())
            .unwrap();

        assert_eq!(allocator.oracle().calls(), vec![(sku("A"), qty(2.0))]);
        assert_eq!(group.total_for_item(a.item_id), qty(2.0));
    }

    #[test]
    fn zero_constraint_skips_item_without_querying() {
        let order_id = OrderId::new();
        let a = item(order_id, "A", 2.0);
        let allocator = SourceAllocator::new(ScriptedOracle::default());
        let constraints = QuantityConstraints::new().with(sku("A"), Quantity::ZERO);

        let group = allocator
            .allocate(order_id, &[&a], &constraints, AllocationPolicy::with_fallback())
            .unwrap();

        assert!(group.is_empty());
        assert!(allocator.oracle().calls().is_empty());
    }

    #[test]
    fn not_found_without_fallback_is_a_lookup_error() {
        let order_id = OrderId::new();
        let a = item(order_id, "A", 1.0);
        let c = item(order_id, "C", 1.0);
        let allocator = SourceAllocator::new(
            ScriptedOracle::default()
                .answer("A", vec![("wh1", 1.0)])
                .fail("C", OracleError::NotFound { sku: sku("C") }),
        );

        let err = allocator
            .allocate(
                order_id,
                &[&a, &c],
                &QuantityConstraints::new(),
                AllocationPolicy::strict(),
            )
            .unwrap_err();

        assert_eq!(
            err,
            AllocationError::SourceLookup {
                order_id,
                sku: sku("C")
            }
        );
    }

    #[test]
    fn not_found_with_fallback_ships_everything_unmatched() {
        let order_id = OrderId::new();
        let c = item(order_id, "C", 3.0);
        let allocator = SourceAllocator::new(
            ScriptedOracle::default().fail("C", OracleError::NotFound { sku: sku("C") }),
        );

        let group = allocator
            .allocate(
                order_id,
                &[&c],
                &QuantityConstraints::new(),
                AllocationPolicy::with_fallback(),
            )
            .unwrap();

        assert_eq!(
            totals(&group),
            vec![("no_source".to_string(), "C".to_string(), 3.0)]
        );
    }

    #[test]
    fn backend_failure_propagates_even_with_fallback() {
        let order_id = OrderId::new();
        let a = item(order_id, "A", 1.0);
        let allocator = SourceAllocator::new(
            ScriptedOracle::default().fail("A", OracleError::Backend("timeout".to_string())),
        );

        let err = allocator
            .allocate(
                order_id,
                &[&a],
                &QuantityConstraints::new(),
                AllocationPolicy::with_fallback(),
            )
            .unwrap_err();

        assert!(matches!(err, AllocationError::Oracle(OracleError::Backend(_))));
    }

    #[test]
    fn partial_supply_is_topped_up_with_unmatched_shortfall() {
        let order_id = OrderId::new();
        let a = item(order_id, "A", 5.0);
        let allocator = SourceAllocator::new(
            ScriptedOracle::default().answer("A", vec![("wh1", 2.0), ("wh2", 1.0), ("wh3", 0.0)]),
        );

        let group = allocator
            .allocate(
                order_id,
                &[&a],
                &QuantityConstraints::new(),
                AllocationPolicy::with_fallback(),
            )
            .unwrap();

        assert_eq!(
            totals(&group),
            vec![
                ("wh1".to_string(), "A".to_string(), 2.0),
                ("wh2".to_string(), "A".to_string(), 1.0),
                ("no_source".to_string(), "A".to_string(), 2.0),
            ]
        );
    }

    #[test]
    fn over_supply_is_trimmed_to_requested_quantity() {
        let order_id = OrderId::new();
        let a = item(order_id, "A", 3.0);
        let allocator = SourceAllocator::new(
            ScriptedOracle::default().answer("A", vec![("wh1", 2.0), ("wh2", 5.0), ("wh3", 1.0)]),
        );

        let group = allocator
            .allocate(
                order_id,
                &[&a],
                &QuantityConstraints::new(),
                AllocationPolicy::strict(),
            )
            .unwrap();

        assert_eq!(
            totals(&group),
            vec![
                ("wh1".to_string(), "A".to_string(), 2.0),
                ("wh2".to_string(), "A".to_string(), 1.0),
            ]
        );
    }

    #[test]
    fn repeated_source_for_one_item_is_merged() {
        let order_id = OrderId::new();
        let a = item(order_id, "A", 4.0);
        let allocator = SourceAllocator::new(
            ScriptedOracle::default().answer("A", vec![("wh1", 1.0), ("wh2", 1.0), ("wh1", 2.0)]),
        );

        let group = allocator
            .allocate(
                order_id,
                &[&a],
                &QuantityConstraints::new(),
                AllocationPolicy::strict(),
            )
            .unwrap();

        let wh1 = group.get(&SourceCode::real("wh1")).unwrap();
        assert_eq!(wh1.len(), 1);
        assert_eq!(wh1[0].quantity, qty(3.0));
        assert_eq!(group.source_codes().len(), 2);
    }

    #[test]
    fn allocating_twice_is_deterministic() {
        let (order_id, a, b, oracle, constraints) = scenario();
        let allocator = SourceAllocator::new(oracle);
        let policy = AllocationPolicy::with_fallback();

        let first = allocator.allocate(order_id, &[&a, &b], &constraints, policy).unwrap();
        let second = allocator.allocate(order_id, &[&a, &b], &constraints, policy).unwrap();
        assert_eq!(first, second);
    }

    fn arb_case() -> impl Strategy<Value = (f64, Option<f64>, Vec<f64>)> {
        (
            0.0f64..50.0,
            prop::option::of(0.0f64..60.0),
            prop::collection::vec(0.0f64..30.0, 0..5),
        )
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: with fallback on, nothing requested is silently lost.
        #[test]
        fn fallback_allocates_exactly_the_effective_quantity(case in arb_case()) {
            let (remaining, cap, offers) = case;
            let order_id = OrderId::new();
            let a = item(order_id, "A", remaining);
            let offers: Vec<(String, f64)> = offers
                .into_iter()
                .enumerate()
                .map(|(i, q)| (format!("wh{i}"), q))
                .collect();
            let oracle = ScriptedOracle::default()
                .answer("A", offers.iter().map(|(c, q)| (c.as_str(), *q)).collect());
            let constraints = match cap {
                Some(c) => QuantityConstraints::new().with(sku("A"), qty(c)),
                None => QuantityConstraints::new(),
            };

            let group = SourceAllocator::new(oracle)
                .allocate(order_id, &[&a], &constraints, AllocationPolicy::with_fallback())
                .unwrap();

            let effective = constraints.effective_quantity(&a.sku, a.qty_to_ship()).unwrap();
            let total = group.total_for_item(a.item_id);
            prop_assert!(effective.value() <= remaining + Quantity::EPSILON);
            if effective.is_positive() {
                prop_assert!(total.approx_eq(effective));
            } else {
                prop_assert!(group.is_empty());
            }
        }

        /// Property: with fallback off, the allocation equals what the oracle
        /// offered (capped at the effective quantity), with no synthetic fill.
        #[test]
        fn strict_allocates_what_the_oracle_offers(case in arb_case()) {
            let (remaining, cap, offers) = case;
            let order_id = OrderId::new();
            let a = item(order_id, "A", remaining);
            let offered: Vec<(String, f64)> = offers
                .into_iter()
                .enumerate()
                .map(|(i, q)| (format!("wh{i}"), q))
                .collect();
            let oracle = ScriptedOracle::default()
                .answer("A", offered.iter().map(|(c, q)| (c.as_str(), *q)).collect());
            let constraints = match cap {
                Some(c) => QuantityConstraints::new().with(sku("A"), qty(c)),
                None => QuantityConstraints::new(),
            };

            let group = SourceAllocator::new(oracle)
                .allocate(order_id, &[&a], &constraints, AllocationPolicy::strict())
                .unwrap();

            let effective = constraints.effective_quantity(&a.sku, a.qty_to_ship()).unwrap();
            let total = group.total_for_item(a.item_id);
            prop_assert!(group.get(&SourceCode::Unmatched).is_none());
            prop_assert!(total.value() <= effective.value() + Quantity::EPSILON);
            if effective.is_positive() {
                let offered_sum: f64 = offered.iter().map(|(_, q)| *q).sum();
                let expected = offered_sum.min(effective.value());
                prop_assert!((total.value() - expected).abs() < 1e-3);
            }
            for (_, allocations) in group.iter() {
                for allocation in allocations {
                    prop_assert!(allocation.quantity.is_positive());
                }
            }
        }
    }
}
