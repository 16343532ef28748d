//! Shipment creation pipeline.
//!
//! ```text
//! Order + ShipOrderRequest
//!   ↓
//! 1. Shippability gate (validator)
//!   ↓
//! 2. Source allocation (oracle per item)
//!   ↓
//! 3. Grouping into per-source shipment items
//!   ↓
//! 4. Transactional commit, one shipment per source
//! ```
//!
//! Steps 1–3 produce a [`ShipmentPlan`] without side effects; step 4 is the
//! only place anything is persisted.

pub mod batch;
pub mod commit;
pub mod error;
pub mod grouper;
pub mod plan;
pub mod request;
pub mod service;
pub mod store;

pub use batch::{BatchShipReport, ship_orders};
pub use commit::{CommittedShipment, ShipmentCommitManager};
pub use error::ShipmentError;
pub use grouper::{ShipmentGroups, ShipmentItem, group_for_shipment};
pub use plan::{ShipmentPlan, build_shipment_plan};
pub use request::{ShipOrderRequest, ShipmentOptions};
pub use service::{ShipmentReceipt, ShipmentService};
pub use store::{
    ShipmentComment, ShipmentRequest, ShipmentStore, ShipmentTransaction, StoreError,
    TrackingRecord,
};
