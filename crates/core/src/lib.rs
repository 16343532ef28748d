//! `quickship-core`: shared building blocks for the shipment engine.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod quantity;
pub mod value_object;

pub use error::{DomainError, DomainResult};
pub use id::{OrderId, OrderItemId, ShipmentId};
pub use quantity::{Quantity, Sku};
pub use value_object::ValueObject;
