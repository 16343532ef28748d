//! Inventory side of fulfilment: where stock for an order line comes from.
//!
//! - [`source`]: source codes, including the synthetic "unmatched" bucket
//! - [`oracle`]: the source-selection boundary (opaque to this crate)
//! - [`allocator`]: splits order items across sources
//! - [`deduction`]: what a persisted shipment deducts from stock
//! - [`stock`]: in-memory stock levels for tests/dev

pub mod allocator;
pub mod deduction;
pub mod oracle;
pub mod source;
pub mod stock;

pub use allocator::{
    AllocationError, AllocationPolicy, QuantityConstraints, SourceAllocation, SourceAllocator,
    SourceGroup,
};
pub use deduction::{
    AnySku, DeductionError, DeductionPlan, ItemToDeduct, SkipScope, SkuCatalog, items_to_deduct,
};
pub use oracle::{OracleError, SourceOracle, SourceSelection};
pub use source::SourceCode;
pub use stock::{InMemoryStock, StockError};
