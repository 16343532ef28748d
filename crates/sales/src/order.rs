use serde::{Deserialize, Serialize};

use quickship_core::{DomainError, DomainResult, OrderId, OrderItemId, Quantity, Sku};

/// Sales order status lifecycle (as seen by fulfilment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Processing,
    Complete,
    Closed,
    Canceled,
    Holded,
    PaymentReview,
}

impl OrderStatus {
    /// Statuses in which no new shipment may be created.
    pub fn blocks_shipment(self) -> bool {
        matches!(
            self,
            OrderStatus::Complete
                | OrderStatus::Closed
                | OrderStatus::Canceled
                | OrderStatus::Holded
                | OrderStatus::PaymentReview
        )
    }
}

/// Order line item.
///
/// `has_children` marks a composite parent whose children ship on their own
/// lines; `is_dummy` marks a child that ships through its parent line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub item_id: OrderItemId,
    pub order_id: OrderId,
    pub sku: Sku,
    pub qty_ordered: Quantity,
    pub qty_shipped: Quantity,
    pub qty_canceled: Quantity,
    pub qty_refunded: Quantity,
    pub is_virtual: bool,
    pub locked_do_ship: bool,
    pub has_children: bool,
    pub parent_item_id: Option<OrderItemId>,
    pub is_dummy: bool,
}

impl OrderItem {
    /// A plain, physical, nothing-shipped-yet line.
    pub fn new(order_id: OrderId, sku: Sku, qty_ordered: Quantity) -> Self {
        Self {
            item_id: OrderItemId::new(),
            order_id,
            sku,
            qty_ordered,
            qty_shipped: Quantity::ZERO,
            qty_canceled: Quantity::ZERO,
            qty_refunded: Quantity::ZERO,
            is_virtual: false,
            locked_do_ship: false,
            has_children: false,
            parent_item_id: None,
            is_dummy: false,
        }
    }

    pub fn with_item_id(mut self, item_id: OrderItemId) -> Self {
        self.item_id = item_id;
        self
    }

    pub fn with_shipped(mut self, qty: Quantity) -> Self {
        self.qty_shipped = qty;
        self
    }

    pub fn with_canceled(mut self, qty: Quantity) -> Self {
        self.qty_canceled = qty;
        self
    }

    /// Quantity not yet shipped, canceled or refunded.
    pub fn qty_to_ship(&self) -> Quantity {
        self.qty_ordered
            .saturating_sub(self.qty_shipped)
            .saturating_sub(self.qty_canceled)
            .saturating_sub(self.qty_refunded)
    }

    fn is_excluded(&self) -> bool {
        self.is_virtual || self.locked_do_ship
    }
}

/// Sales order as read by the shipment flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    increment_id: String,
    status: OrderStatus,
    items: Vec<OrderItem>,
}

impl Order {
    /// Build an order, checking that every item belongs to it and that child
    /// items reference a parent present on the order.
    pub fn new(
        id: OrderId,
        increment_id: impl Into<String>,
        status: OrderStatus,
        items: Vec<OrderItem>,
    ) -> DomainResult<Self> {
        for item in &items {
            if item.order_id != id {
                return Err(DomainError::invariant(format!(
                    "item {} belongs to order {}, not {}",
                    item.item_id, item.order_id, id
                )));
            }
            if let Some(parent) = item.parent_item_id {
                if !items.iter().any(|i| i.item_id == parent) {
                    return Err(DomainError::validation(format!(
                        "item {} references missing parent {}",
                        item.item_id, parent
                    )));
                }
            }
            if item.is_dummy && item.parent_item_id.is_none() {
                return Err(DomainError::validation(format!(
                    "dummy item {} has no parent",
                    item.item_id
                )));
            }
        }

        Ok(Self {
            id,
            increment_id: increment_id.into(),
            status,
            items,
        })
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    /// Human-facing order number.
    pub fn increment_id(&self) -> &str {
        &self.increment_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn item(&self, item_id: OrderItemId) -> Option<&OrderItem> {
        self.items.iter().find(|i| i.item_id == item_id)
    }

    /// Items handed to source allocation, in order of first appearance.
    ///
    /// Virtual and locked lines are skipped, as are composite parents whose
    /// children ship individually. A dummy child resolves to its parent line.
    /// Lines with nothing left to ship are dropped.
    pub fn items_to_ship(&self) -> Vec<&OrderItem> {
        let mut result: Vec<&OrderItem> = Vec::new();

        for item in &self.items {
            if item.is_excluded() {
                continue;
            }

            let candidate = if item.is_dummy {
                match item.parent_item_id.and_then(|p| self.item(p)) {
                    Some(parent) if !parent.is_excluded() => parent,
                    _ => continue,
                }
            } else if item.has_children {
                continue;
            } else {
                item
            };

            if !candidate.qty_to_ship().is_positive() {
                continue;
            }
            if result.iter().any(|i| i.item_id == candidate.item_id) {
                continue;
            }
            result.push(candidate);
        }

        result
    }

    /// Cheap pre-check used by batch flows before attempting a shipment.
    pub fn can_ship(&self) -> bool {
        !self.status.blocks_shipment() && !self.items_to_ship().is_empty()
    }
}
