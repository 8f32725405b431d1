//! Unit-of-measure conversion.
//!
//! A product is stocked in its *stock unit* and often bought in a larger
//! *purchase unit* (e.g. a carton of 12). Document lines may be entered in
//! either unit; they are converted to stock units exactly once, at the line
//! boundary. The ledger, reservations and projections only ever see stock
//! units. This module is the single implementation of that rule, including
//! the single rounding rule.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// All quantities are kept at this decimal scale.
pub const QUANTITY_SCALE: u32 = 2;

/// Which unit a raw input quantity is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitOfMeasure {
    Stock,
    Purchase,
}

/// How many stock units make up one purchase unit.
///
/// A factor ≤ 0 is a product configuration error and is rejected here, at
/// construction — conversion itself never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversionFactor(Decimal);

impl ConversionFactor {
    pub fn new(value: Decimal) -> DomainResult<Self> {
        if value <= Decimal::ZERO {
            return Err(DomainError::validation(
                "conversion factor must be greater than zero",
            ));
        }
        Ok(Self(value))
    }

    /// Factor of 1: purchase unit and stock unit coincide.
    pub fn identity() -> Self {
        Self(Decimal::ONE)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl ValueObject for ConversionFactor {}

/// Convert a quantity into stock units.
///
/// `Purchase` quantities are multiplied by the factor; `Stock` quantities
/// pass through. The result is rounded to [`QUANTITY_SCALE`].
pub fn to_stock_units(quantity: Decimal, unit: UnitOfMeasure, factor: ConversionFactor) -> Decimal {
    match unit {
        UnitOfMeasure::Purchase => (quantity * factor.value()).round_dp(QUANTITY_SCALE),
        UnitOfMeasure::Stock => quantity.round_dp(QUANTITY_SCALE),
    }
}

/// Convert a quantity expressed in stock units back into the given unit.
///
/// The inverse of [`to_stock_units`]: `Purchase` divides by the factor,
/// `Stock` passes through. Rounded to [`QUANTITY_SCALE`].
pub fn to_purchase_units(
    quantity: Decimal,
    unit: UnitOfMeasure,
    factor: ConversionFactor,
) -> Decimal {
    match unit {
        UnitOfMeasure::Purchase => (quantity / factor.value()).round_dp(QUANTITY_SCALE),
        UnitOfMeasure::Stock => quantity.round_dp(QUANTITY_SCALE),
    }
}
