use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockmaster_core::{
    ConversionFactor, DomainError, DomainResult, Entity, ProductId, UnitOfMeasure, to_stock_units,
};

/// Catalog product.
///
/// Identity (id + sku) is immutable; descriptive attributes may change over
/// time. All stock accounting happens in `stock_unit`; `purchase_unit` is an
/// input/display convenience tied to `conversion_factor`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    sku: String,
    name: String,
    stock_unit: String,
    purchase_unit: Option<String>,
    conversion_factor: ConversionFactor,
    reorder_level: Decimal,
    reorder_quantity: Decimal,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl Product {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: ProductId,
        sku: impl Into<String>,
        name: impl Into<String>,
        stock_unit: impl Into<String>,
        purchase_unit: Option<String>,
        conversion_factor: ConversionFactor,
        reorder_level: Decimal,
        reorder_quantity: Decimal,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let sku = sku.into();
        let name = name.into();
        let stock_unit = stock_unit.into();

        if sku.trim().is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        if name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if stock_unit.trim().is_empty() {
            return Err(DomainError::validation("stock unit cannot be empty"));
        }
        if reorder_level < Decimal::ZERO || reorder_quantity < Decimal::ZERO {
            return Err(DomainError::validation(
                "reorder level and quantity cannot be negative",
            ));
        }

        Ok(Self {
            id,
            sku,
            name,
            stock_unit,
            purchase_unit,
            conversion_factor,
            reorder_level,
            reorder_quantity,
            is_active: true,
            created_at,
        })
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stock_unit(&self) -> &str {
        &self.stock_unit
    }

    pub fn purchase_unit(&self) -> Option<&str> {
        self.purchase_unit.as_deref()
    }

    pub fn conversion_factor(&self) -> ConversionFactor {
        self.conversion_factor
    }

    pub fn reorder_level(&self) -> Decimal {
        self.reorder_level
    }

    pub fn reorder_quantity(&self) -> Decimal {
        self.reorder_quantity
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
    }

    pub fn activate(&mut self) {
        self.is_active = true;
    }

    /// Convert a document-line quantity into stock units using this
    /// product's conversion factor.
    pub fn stock_quantity(&self, quantity: Decimal, unit: UnitOfMeasure) -> Decimal {
        to_stock_units(quantity, unit, self.conversion_factor)
    }

    /// Whether the given on-hand level is at or below the reorder level.
    pub fn is_low_stock(&self, on_hand: Decimal) -> bool {
        on_hand <= self.reorder_level
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
