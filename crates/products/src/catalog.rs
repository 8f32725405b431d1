//! In-memory master-data registry.
//!
//! Reads hand out clones; the registry is safe to share across the engine
//! and read-side consumers. Not optimized for very large catalogs.

use std::collections::HashMap;
use std::sync::RwLock;

use stockmaster_core::{BinId, DomainError, DomainResult, Entity, ProductId, WarehouseId};

use crate::product::Product;
use crate::warehouse::{BinLocation, Warehouse};

#[derive(Debug, Default)]
pub struct Catalog {
    products: RwLock<HashMap<ProductId, Product>>,
    warehouses: RwLock<HashMap<WarehouseId, Warehouse>>,
    bins: RwLock<HashMap<BinId, BinLocation>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_product(&self, product: Product) {
        if let Ok(mut map) = self.products.write() {
            map.insert(*product.id(), product);
        }
    }

    pub fn upsert_warehouse(&self, warehouse: Warehouse) {
        if let Ok(mut map) = self.warehouses.write() {
            map.insert(*warehouse.id(), warehouse);
        }
    }

    pub fn upsert_bin(&self, bin: BinLocation) {
        if let Ok(mut map) = self.bins.write() {
            map.insert(*bin.id(), bin);
        }
    }

    pub fn product(&self, id: ProductId) -> Option<Product> {
        self.products.read().ok()?.get(&id).cloned()
    }

    pub fn warehouse(&self, id: WarehouseId) -> Option<Warehouse> {
        self.warehouses.read().ok()?.get(&id).cloned()
    }

    pub fn bin(&self, id: BinId) -> Option<BinLocation> {
        self.bins.read().ok()?.get(&id).cloned()
    }

    /// Product lookup that fails with `NotFound` instead of `None`.
    pub fn require_product(&self, id: ProductId) -> DomainResult<Product> {
        self.product(id).ok_or(DomainError::NotFound)
    }

    pub fn require_warehouse(&self, id: WarehouseId) -> DomainResult<Warehouse> {
        self.warehouse(id).ok_or(DomainError::NotFound)
    }

    pub fn products(&self) -> Vec<Product> {
        self.products
            .read()
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn warehouses(&self) -> Vec<Warehouse> {
        self.warehouses
            .read()
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    /// The warehouse customer returns are routed into, when configured.
    pub fn active_quarantine_warehouse(&self) -> Option<Warehouse> {
        self.warehouses
            .read()
            .ok()?
            .values()
            .find(|w| w.is_active() && w.is_quarantine())
            .cloned()
    }

    /// Whether `bin` belongs to `warehouse`. Unknown bins fail closed.
    pub fn bin_in_warehouse(&self, bin: BinId, warehouse: WarehouseId) -> bool {
        self.bin(bin)
            .map(|b| b.warehouse_id() == warehouse)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use stockmaster_core::ConversionFactor;

    fn seed() -> (Catalog, WarehouseId, BinId) {
        let catalog = Catalog::new();
        let wh = Warehouse::new(WarehouseId::new(), "MAIN", "Main Warehouse").unwrap();
        let wh_id = *wh.id();
        let bin = BinLocation::new(BinId::new(), wh_id, "A1", None).unwrap();
        let bin_id = *bin.id();
        catalog.upsert_warehouse(wh);
        catalog.upsert_bin(bin);
        (catalog, wh_id, bin_id)
    }

    #[test]
    fn bin_membership_fails_closed_for_unknown_bins() {
        let (catalog, wh_id, bin_id) = seed();
        assert!(catalog.bin_in_warehouse(bin_id, wh_id));
        assert!(!catalog.bin_in_warehouse(BinId::new(), wh_id));
        assert!(!catalog.bin_in_warehouse(bin_id, WarehouseId::new()));
    }

    #[test]
    fn quarantine_lookup_skips_inactive() {
        let (catalog, _, _) = seed();
        assert!(catalog.active_quarantine_warehouse().is_none());

        let mut qrn = Warehouse::new(WarehouseId::new(), "QRN", "Quarantine")
            .unwrap()
            .quarantine();
        qrn.deactivate();
        catalog.upsert_warehouse(qrn.clone());
        assert!(catalog.active_quarantine_warehouse().is_none());

        qrn.activate();
        catalog.upsert_warehouse(qrn);
        assert!(catalog.active_quarantine_warehouse().is_some());
    }

    #[test]
    fn require_product_maps_missing_to_not_found() {
        let catalog = Catalog::new();
        assert_eq!(
            catalog.require_product(ProductId::new()).unwrap_err(),
            DomainError::NotFound
        );

        let product = Product::new(
            ProductId::new(),
            "SKU-1",
            "Thing",
            "pcs",
            None,
            ConversionFactor::identity(),
            Decimal::ZERO,
            Decimal::ZERO,
            Utc::now(),
        )
        .unwrap();
        let id = *product.id();
        catalog.upsert_product(product);
        assert!(catalog.require_product(id).is_ok());
    }
}
