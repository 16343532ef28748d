//! Quantity and SKU value objects.

use core::cmp::Ordering;
use core::iter::Sum;
use core::ops::Add;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// A non-negative, finite item quantity.
///
/// Order quantities are decimal in the sales domain (weight- or length-based
/// products ship fractional amounts), so this wraps an `f64`. Comparisons that
/// decide whether something is "left over" go through [`Quantity::EPSILON`].
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Quantity(f64);

impl Quantity {
    /// Tolerance below which a quantity is treated as zero.
    pub const EPSILON: f64 = 1e-6;

    pub const ZERO: Quantity = Quantity(0.0);

    pub fn new(value: f64) -> DomainResult<Self> {
        if !value.is_finite() {
            return Err(DomainError::validation("quantity must be finite"));
        }
        if value < 0.0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        Ok(Self(value))
    }

    /// Clamp an arbitrary float into a valid quantity (NaN and negatives become zero).
    pub fn clamped(value: f64) -> Self {
        if value.is_finite() && value > 0.0 {
            Self(value)
        } else {
            Self::ZERO
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn is_positive(self) -> bool {
        self.0 > Self::EPSILON
    }

    pub fn min(self, other: Quantity) -> Quantity {
        match self.partial_cmp(&other) {
            Some(Ordering::Greater) => other,
            _ => self,
        }
    }

    /// `self - other`, floored at zero.
    pub fn saturating_sub(self, other: Quantity) -> Quantity {
        Self::clamped(self.0 - other.0)
    }

    /// Equality within [`Quantity::EPSILON`].
    pub fn approx_eq(self, other: Quantity) -> bool {
        (self.0 - other.0).abs() <= Self::EPSILON
    }
}

impl ValueObject for Quantity {}

impl TryFrom<f64> for Quantity {
    type Error = DomainError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for f64 {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

/// Saturates at `f64::MAX`.
impl Add for Quantity {
    type Output = Quantity;

    fn add(self, rhs: Quantity) -> Quantity {
        Quantity((self.0 + rhs.0).min(f64::MAX))
    }
}

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Self {
        iter.fold(Quantity::ZERO, Add::add)
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Stock-keeping unit identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sku(String);

impl Sku {
    pub fn new(value: impl Into<String>) -> DomainResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ValueObject for Sku {}

impl TryFrom<String> for Sku {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Sku> for String {
    fn from(value: Sku) -> Self {
        value.0
    }
}

impl core::fmt::Display for Sku {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
