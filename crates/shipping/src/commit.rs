//! All-or-nothing persistence of an order's shipments.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use quickship_core::{OrderId, ShipmentId};
use quickship_inventory::SourceCode;

use crate::error::ShipmentError;
use crate::grouper::ShipmentGroups;
use crate::store::{
    ShipmentComment, ShipmentRequest, ShipmentStore, ShipmentTransaction, TrackingRecord,
};

/// A shipment that was persisted, and the source it ships from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedShipment {
    pub shipment_id: ShipmentId,
    pub source: SourceCode,
}

/// Creates one shipment per source group inside a single transaction.
#[derive(Debug, Clone)]
pub struct ShipmentCommitManager<S> {
    store: S,
}

impl<S> ShipmentCommitManager<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S> ShipmentCommitManager<S>
where
    S: ShipmentStore,
{
    /// Persist every group, or none of them.
    ///
    /// The same comment and tracking record go on every shipment. On any
    /// submission failure the transaction is rolled back and the submission
    /// failure is returned.
    #[instrument(skip(self, groups, comment, track), fields(groups = groups.len()))]
    pub fn commit(
        &self,
        order_id: OrderId,
        groups: &ShipmentGroups,
        deduction_skipped: bool,
        comment: Option<&ShipmentComment>,
        track: Option<&TrackingRecord>,
    ) -> Result<Vec<CommittedShipment>, ShipmentError> {
        if groups.is_empty() {
            return Err(ShipmentError::NoShippableItems);
        }

        let mut tx = self
            .store
            .begin()
            .map_err(|source| ShipmentError::Commit { source })?;

        let mut committed = Vec::with_capacity(groups.len());
        for (source, items) in groups.iter() {
            let request = ShipmentRequest {
                order_id,
                source: source.clone(),
                items: items.to_vec(),
                comment: comment.cloned(),
                track: track.cloned(),
                deduction_skipped,
            };

            match tx.create_shipment(&request) {
                Ok(shipment_id) => {
                    debug!(%shipment_id, source = %source, "shipment staged");
                    committed.push(CommittedShipment {
                        shipment_id,
                        source: source.clone(),
                    });
                }
                Err(err) => {
                    if let Err(rollback_err) = tx.rollback() {
                        error!(%order_id, error = %rollback_err, "shipment rollback failed");
                    }
                    return Err(ShipmentError::Commit { source: err });
                }
            }
        }

        tx.commit()
            .map_err(|source| ShipmentError::Commit { source })?;

        Ok(committed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::grouper::group_for_shipment;
    use crate::store::StoreError;
    use quickship_core::{OrderItemId, Quantity, Sku};
    use quickship_inventory::{SourceAllocation, SourceGroup};

    #[derive(Default)]
    struct Ledger {
        persisted: Vec<ShipmentRequest>,
        rollbacks: usize,
    }

    #[derive(Default)]
    struct TestStore {
        ledger: Mutex<Ledger>,
        fail_on: Option<usize>,
    }

    struct TestTx<'a> {
        store: &'a TestStore,
        staged: Vec<ShipmentRequest>,
    }

    impl ShipmentStore for TestStore {
        type Transaction<'a>
            = TestTx<'a>
        where
            Self: 'a;

        fn begin(&self) -> Result<TestTx<'_>, StoreError> {
            Ok(TestTx {
                store: self,
                staged: Vec::new(),
            })
        }
    }

    impl ShipmentTransaction for TestTx<'_> {
        fn create_shipment(&mut self, request: &ShipmentRequest) -> Result<ShipmentId, StoreError> {
            if self.store.fail_on == Some(self.staged.len() + 1) {
                return Err(StoreError::Storage("write failed".to_string()));
            }
            self.staged.push(request.clone());
            Ok(ShipmentId::new())
        }

        fn commit(self) -> Result<(), StoreError> {
            self.store.ledger.lock().unwrap().persisted.extend(self.staged);
            Ok(())
        }

        fn rollback(self) -> Result<(), StoreError> {
            self.store.ledger.lock().unwrap().rollbacks += 1;
            Ok(())
        }
    }

    fn groups(sources: &[&str]) -> ShipmentGroups {
        let mut group = SourceGroup::new();
        for code in sources {
            group.push(SourceAllocation {
                item_id: OrderItemId::new(),
                sku: Sku::new("A").unwrap(),
                quantity: Quantity::new(1.0).unwrap(),
                source: SourceCode::real(*code),
            });
        }
        group_for_shipment(&group).unwrap()
    }

    #[test]
    fn commits_one_shipment_per_group_with_shared_metadata() {
        let manager = ShipmentCommitManager::new(TestStore::default());
        let comment = ShipmentComment {
            text: "fragile".to_string(),
            visible_on_front: false,
        };
        let track = TrackingRecord::new("1Z999", "UPS", "ups");

        let committed = manager
            .commit(
                OrderId::new(),
                &groups(&["wh1", "wh2"]),
                false,
                Some(&comment),
                Some(&track),
            )
            .unwrap();

        assert_eq!(committed.len(), 2);
        assert_eq!(committed[0].source, SourceCode::real("wh1"));
        let ledger = manager.store().ledger.lock().unwrap();
        assert_eq!(ledger.persisted.len(), 2);
        assert!(
            ledger
                .persisted
                .iter()
                .all(|r| r.comment.as_ref() == Some(&comment) && r.track.as_ref() == Some(&track))
        );
    }

    #[test]
    fn failure_mid_way_rolls_back_everything() {
        let manager = ShipmentCommitManager::new(TestStore {
            fail_on: Some(2),
            ..TestStore::default()
        });

        let err = manager
            .commit(OrderId::new(), &groups(&["wh1", "wh2", "wh3"]), false, None, None)
            .unwrap_err();

        assert!(matches!(err, ShipmentError::Commit { .. }));
        let ledger = manager.store().ledger.lock().unwrap();
        assert!(ledger.persisted.is_empty());
        assert_eq!(ledger.rollbacks, 1);
    }

    #[test]
    fn empty_groups_never_open_a_transaction() {
        let manager = ShipmentCommitManager::new(TestStore::default());
        let err = manager
            .commit(OrderId::new(), &ShipmentGroups::default(), false, None, None)
            .unwrap_err();
        assert_eq!(err, ShipmentError::NoShippableItems);
    }
}
