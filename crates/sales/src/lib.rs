//! Sales order read model consumed by the shipment engine.
//!
//! Orders and their items are owned by the order subsystem; this crate only
//! describes the shape the shipment flow reads, which items are eligible to
//! ship, and the shippability gate run before any allocation.

pub mod order;
pub mod validation;

pub use order::{Order, OrderItem, OrderStatus};
pub use validation::{CanShip, ShippabilityValidator};
