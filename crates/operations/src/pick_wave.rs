//! Pick waves: batches of ready deliveries grouped for one picking pass.
//!
//! Waves sequence work; they are read-only relative to the ledger. Stock
//! leaves the warehouse only when each member delivery validates.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockmaster_core::{BinId, DocumentId, Entity, ProductId, UserId, WarehouseId, WaveId};
use stockmaster_products::Catalog;

use crate::document::{Document, DocumentBody};
use crate::status::WaveStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickWave {
    id: WaveId,
    name: String,
    status: WaveStatus,
    warehouse_id: WarehouseId,
    delivery_ids: Vec<DocumentId>,
    assigned_picker: Option<UserId>,
    created_by: UserId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl PickWave {
    pub(crate) fn new(
        id: WaveId,
        name: String,
        warehouse_id: WarehouseId,
        delivery_ids: Vec<DocumentId>,
        created_by: UserId,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            status: WaveStatus::Planned,
            warehouse_id,
            delivery_ids,
            assigned_picker: None,
            created_by,
            created_at,
            updated_at: created_at,
            completed_at: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> WaveStatus {
        self.status
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn delivery_ids(&self) -> &[DocumentId] {
        &self.delivery_ids
    }

    pub fn assigned_picker(&self) -> Option<UserId> {
        self.assigned_picker
    }

    pub fn created_by(&self) -> UserId {
        self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub(crate) fn set_status(&mut self, to: WaveStatus, now: DateTime<Utc>) {
        self.status = to;
        if to == WaveStatus::Completed {
            self.completed_at = Some(now);
        }
        self.updated_at = now;
    }

    pub(crate) fn assign_picker(&mut self, picker: UserId, now: DateTime<Utc>) {
        self.assigned_picker = Some(picker);
        self.updated_at = now;
    }
}

impl Entity for PickWave {
    type Id = WaveId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Selection criteria for wave generation. All criteria are conjunctive;
/// only `ready` deliveries are ever considered.
#[derive(Debug, Clone, Default)]
pub struct WaveFilter {
    pub name: Option<String>,
    pub warehouse_id: Option<WarehouseId>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub document_ids: Option<Vec<DocumentId>>,
}

/// One row of a consolidated pick list: everything to pick for a
/// (product, bin) pair across the wave's deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickListRow {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_sku: String,
    /// `-` when the lines carry no bin.
    pub bin_code: String,
    pub total_quantity: Decimal,
    pub order_count: u32,
}

/// Consolidate the given deliveries into a bin-sorted pick list.
///
/// Lines are grouped by (product, bin), quantities summed and contributing
/// orders counted; rows come out sorted by bin code then product SKU so the
/// picker walks the warehouse once. Pure read-side aggregation.
pub fn consolidate(deliveries: &[&Document], catalog: &Catalog) -> Vec<PickListRow> {
    let mut rows: HashMap<(ProductId, Option<BinId>), PickListRow> = HashMap::new();

    for doc in deliveries {
        let DocumentBody::Delivery(details) = doc.body() else {
            continue;
        };
        for line in &details.lines {
            let row = rows
                .entry((line.product_id, line.bin_id))
                .or_insert_with(|| {
                    let (name, sku) = catalog
                        .product(line.product_id)
                        .map(|p| (p.name().to_string(), p.sku().to_string()))
                        .unwrap_or_else(|| (line.product_id.to_string(), String::new()));
                    let bin_code = line
                        .bin_id
                        .and_then(|b| catalog.bin(b))
                        .map(|b| b.code().to_string())
                        .unwrap_or_else(|| "-".to_string());
                    PickListRow {
                        product_id: line.product_id,
                        product_name: name,
                        product_sku: sku,
                        bin_code,
                        total_quantity: Decimal::ZERO,
                        order_count: 0,
                    }
                });
            row.total_quantity += line.quantity;
            row.order_count += 1;
        }
    }

    let mut out: Vec<PickListRow> = rows.into_values().collect();
    out.sort_by(|a, b| {
        a.bin_code
            .cmp(&b.bin_code)
            .then_with(|| a.product_sku.cmp(&b.product_sku))
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DeliveryDetails, DeliveryLine};
    use rust_decimal_macros::dec;
    use stockmaster_core::ConversionFactor;
    use stockmaster_products::{BinLocation, Product, Warehouse};

    fn delivery_doc(wh: WarehouseId, lines: Vec<DeliveryLine>) -> Document {
        Document::new(
            DocumentId::new(),
            "DEL-000001".to_string(),
            wh,
            UserId::new(),
            String::new(),
            false,
            DocumentBody::Delivery(DeliveryDetails {
                customer: "ACME".to_string(),
                customer_reference: String::new(),
                shipping_address: String::new(),
                lines,
            }),
            Utc::now(),
        )
    }

    fn product(catalog: &Catalog, sku: &str) -> ProductId {
        let p = Product::new(
            ProductId::new(),
            sku,
            format!("Product {sku}"),
            "pcs",
            None,
            ConversionFactor::identity(),
            Decimal::ZERO,
            Decimal::ZERO,
            Utc::now(),
        )
        .unwrap();
        let id = *p.id();
        catalog.upsert_product(p);
        id
    }

    #[test]
    fn lines_for_the_same_product_and_bin_merge() {
        let catalog = Catalog::new();
        let wh = Warehouse::new(WarehouseId::new(), "MAIN", "Main").unwrap();
        let wh_id = *wh.id();
        catalog.upsert_warehouse(wh);
        let bin = BinLocation::new(BinId::new(), wh_id, "A1", None).unwrap();
        let bin_id = *bin.id();
        catalog.upsert_bin(bin);
        let sku_x = product(&catalog, "X");

        let d1 = delivery_doc(
            wh_id,
            vec![DeliveryLine {
                product_id: sku_x,
                bin_id: Some(bin_id),
                quantity: dec!(3),
            }],
        );
        let d2 = delivery_doc(
            wh_id,
            vec![DeliveryLine {
                product_id: sku_x,
                bin_id: Some(bin_id),
                quantity: dec!(3),
            }],
        );

        let rows = consolidate(&[&d1, &d2], &catalog);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].bin_code, "A1");
        assert_eq!(rows[0].total_quantity, dec!(6));
        assert_eq!(rows[0].order_count, 2);
    }

    #[test]
    fn rows_sort_by_bin_then_sku() {
        let catalog = Catalog::new();
        let wh = Warehouse::new(WarehouseId::new(), "MAIN", "Main").unwrap();
        let wh_id = *wh.id();
        catalog.upsert_warehouse(wh);
        let bin_a = BinLocation::new(BinId::new(), wh_id, "A1", None).unwrap();
        let bin_b = BinLocation::new(BinId::new(), wh_id, "B2", None).unwrap();
        let bin_a_id = *bin_a.id();
        let bin_b_id = *bin_b.id();
        catalog.upsert_bin(bin_a);
        catalog.upsert_bin(bin_b);

        let alpha = product(&catalog, "ALPHA");
        let zulu = product(&catalog, "ZULU");

        let doc = delivery_doc(
            wh_id,
            vec![
                DeliveryLine {
                    product_id: zulu,
                    bin_id: Some(bin_b_id),
                    quantity: dec!(1),
                },
                DeliveryLine {
                    product_id: zulu,
                    bin_id: Some(bin_a_id),
                    quantity: dec!(1),
                },
                DeliveryLine {
                    product_id: alpha,
                    bin_id: Some(bin_a_id),
                    quantity: dec!(1),
                },
            ],
        );

        let rows = consolidate(&[&doc], &catalog);
        let order: Vec<(&str, &str)> = rows
            .iter()
            .map(|r| (r.bin_code.as_str(), r.product_sku.as_str()))
            .collect();
        assert_eq!(order, vec![("A1", "ALPHA"), ("A1", "ZULU"), ("B2", "ZULU")]);
    }

    #[test]
    fn binless_lines_group_under_dash() {
        let catalog = Catalog::new();
        let wh_id = WarehouseId::new();
        let sku = product(&catalog, "X");
        let doc = delivery_doc(
            wh_id,
            vec![DeliveryLine {
                product_id: sku,
                bin_id: None,
                quantity: dec!(2),
            }],
        );
        let rows = consolidate(&[&doc], &catalog);
        assert_eq!(rows[0].bin_code, "-");
    }
}
