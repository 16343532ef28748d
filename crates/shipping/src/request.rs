//! Caller-side inputs for one shipment attempt.

use serde::{Deserialize, Serialize};

use quickship_core::{Quantity, Sku};
use quickship_inventory::{AllocationPolicy, QuantityConstraints};

use crate::store::{ShipmentComment, TrackingRecord};

/// Behaviour toggles for one attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentOptions {
    /// Persist shipments flagged so stock is not decremented.
    pub skip_inventory_deduction: bool,
    /// Send any quantity the oracle cannot cover to the unmatched bucket.
    pub force_fallback: bool,
}

impl ShipmentOptions {
    /// Both toggles set together, the way the single "skip inventory check"
    /// switch behaves.
    pub fn linked(skip_inventory_check: bool) -> Self {
        Self {
            skip_inventory_deduction: skip_inventory_check,
            force_fallback: skip_inventory_check,
        }
    }

    pub fn allocation_policy(&self) -> AllocationPolicy {
        AllocationPolicy {
            force_fallback: self.force_fallback,
        }
    }
}

/// Explicit request replacing any per-attempt mutable state.
///
/// ```
/// use quickship_shipping::ShipOrderRequest;
///
/// let request = ShipOrderRequest::new()
///     .with_comment("leave at reception")
///     .with_track("1Z999", "UPS", "ups")
///     .skip_inventory_deduction(true);
/// assert!(request.options.skip_inventory_deduction);
/// assert!(!request.options.force_fallback);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShipOrderRequest {
    pub constraints: QuantityConstraints,
    pub options: ShipmentOptions,
    pub comment: Option<ShipmentComment>,
    pub track: Option<TrackingRecord>,
}

impl ShipOrderRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_constraints(mut self, constraints: QuantityConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_constraint(mut self, sku: Sku, quantity: Quantity) -> Self {
        self.constraints.insert(sku, quantity);
        self
    }

    pub fn with_options(mut self, options: ShipmentOptions) -> Self {
        self.options = options;
        self
    }

    /// Attach a comment to every shipment; blank text is ignored.
    pub fn with_comment(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        if !text.trim().is_empty() {
            self.comment = Some(ShipmentComment {
                text,
                visible_on_front: false,
            });
        }
        self
    }

    /// Attach tracking to every shipment. A record whose fields are all blank is ignored.
    pub fn with_track(
        mut self,
        track_number: impl Into<String>,
        title: impl Into<String>,
        carrier_code: impl Into<String>,
    ) -> Self {
        let track = TrackingRecord::new(track_number, title, carrier_code);
        if !track.is_empty() {
            self.track = Some(track);
        }
        self
    }

    pub fn skip_inventory_deduction(mut self, skip: bool) -> Self {
        self.options.skip_inventory_deduction = skip;
        self
    }

    pub fn force_fallback(mut self, force: bool) -> Self {
        self.options.force_fallback = force;
        self
    }
}
