//! Shippability gate run before any source allocation.

use std::sync::Arc;

use crate::order::{Order, OrderStatus};

/// Decides whether an order may be shipped at all.
///
/// An empty result means shippable; otherwise every entry is a human-readable
/// reason, in the order the checks ran.
pub trait ShippabilityValidator: Send + Sync {
    fn validate(&self, order: &Order) -> Vec<String>;
}

impl<V> ShippabilityValidator for Arc<V>
where
    V: ShippabilityValidator + ?Sized,
{
    fn validate(&self, order: &Order) -> Vec<String> {
        (**self).validate(order)
    }
}

/// Default validator: order state plus "is there anything left to ship".
#[derive(Debug, Default, Clone, Copy)]
pub struct CanShip;

impl CanShip {
    pub fn new() -> Self {
        Self
    }
}

impl ShippabilityValidator for CanShip {
    fn validate(&self, order: &Order) -> Vec<String> {
        let mut messages = Vec::new();

        match order.status() {
            OrderStatus::Canceled => messages.push("A canceled order cannot be shipped.".to_string()),
            OrderStatus::Holded => messages.push("An order on hold cannot be shipped.".to_string()),
            OrderStatus::PaymentReview => {
                messages.push("An order in payment review cannot be shipped.".to_string())
            }
            OrderStatus::Closed | OrderStatus::Complete => {
                messages.push("The order is already closed.".to_string())
            }
            OrderStatus::Pending | OrderStatus::Processing => {}
        }

        if order.items_to_ship().is_empty() {
            messages.push("The order does not allow a shipment to be created.".to_string());
        }

        messages
    }
}
