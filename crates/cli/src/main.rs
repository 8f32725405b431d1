//! Demo binary: seeds a small catalog and drives one of everything through
//! the document engine, logging stock levels and the ledger tail along the
//! way. `RUST_LOG=debug` shows the individual ledger appends.

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value as JsonValue;

use stockmaster_core::{
    BinId, ConversionFactor, Entity, ProductId, UnitOfMeasure, UserId, WarehouseId,
};
use stockmaster_events::{EventEnvelope, InMemoryEventBus};
use stockmaster_ledger::{LedgerFilter, Page, StockStore};
use stockmaster_operations::{
    CountMethod, CycleCountDraft, CycleCountLineDraft, DeliveryDraft, DeliveryLineDraft,
    DocumentEngine, DocumentStatus, ReceiptDraft, ReceiptLineDraft, TransferDraft,
    TransferLineDraft, WaveFilter,
};
use stockmaster_products::{BinLocation, Catalog, Product, Warehouse};

type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

struct Demo {
    engine: DocumentEngine<Bus>,
    actor: UserId,
    main: WarehouseId,
    south: WarehouseId,
    bin_a1: BinId,
    bin_b2: BinId,
    laptop: ProductId,
    cable: ProductId,
    paper: ProductId,
}

fn seed() -> Result<Demo> {
    let catalog = Arc::new(Catalog::new());
    let now = Utc::now();

    let main = Warehouse::new(WarehouseId::new(), "MAIN", "Main Warehouse")?;
    let south = Warehouse::new(WarehouseId::new(), "SOUTH", "South Warehouse")?;
    let quarantine = Warehouse::new(WarehouseId::new(), "QRN", "Returns Quarantine")?.quarantine();
    let main_id = *main.id();
    let south_id = *south.id();
    catalog.upsert_warehouse(main);
    catalog.upsert_warehouse(south);
    catalog.upsert_warehouse(quarantine);

    let bin_a1 = BinLocation::new(BinId::new(), main_id, "A1", Some("Fast movers".into()))?;
    let bin_b2 = BinLocation::new(BinId::new(), main_id, "B2", None)?;
    let bin_a1_id = *bin_a1.id();
    let bin_b2_id = *bin_b2.id();
    catalog.upsert_bin(bin_a1);
    catalog.upsert_bin(bin_b2);

    let laptop = Product::new(
        ProductId::new(),
        "LAP-015",
        "Laptop 15\"",
        "unit",
        None,
        ConversionFactor::identity(),
        dec!(10),
        dec!(25),
        now,
    )?;
    let cable = Product::new(
        ProductId::new(),
        "CBL-USB",
        "USB-C Cable",
        "pcs",
        Some("box".to_string()),
        ConversionFactor::new(dec!(50))?,
        dec!(100),
        dec!(500),
        now,
    )?;
    let paper = Product::new(
        ProductId::new(),
        "PAP-A4",
        "A4 Paper Ream",
        "ream",
        Some("pallet".to_string()),
        ConversionFactor::new(dec!(240))?,
        dec!(50),
        dec!(480),
        now,
    )?;
    let laptop_id = *laptop.id();
    let cable_id = *cable.id();
    let paper_id = *paper.id();
    catalog.upsert_product(laptop);
    catalog.upsert_product(cable);
    catalog.upsert_product(paper);

    let stock = Arc::new(StockStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let engine = DocumentEngine::new(catalog, stock, bus);

    Ok(Demo {
        engine,
        actor: UserId::new(),
        main: main_id,
        south: south_id,
        bin_a1: bin_a1_id,
        bin_b2: bin_b2_id,
        laptop: laptop_id,
        cable: cable_id,
        paper: paper_id,
    })
}

fn log_level(demo: &Demo, label: &str, product: ProductId) -> Result<()> {
    let level = demo.engine.stock_by_warehouse(product, demo.main)?;
    tracing::info!(
        product = label,
        quantity = %level.quantity,
        reserved = %level.reserved_quantity,
        available = %level.available_quantity,
        "stock level (MAIN)"
    );
    Ok(())
}

fn run(demo: &Demo) -> Result<()> {
    let now = Utc::now();

    // Goods in: laptops by the unit, cables by the box of 50.
    let receipt = demo.engine.create_receipt(
        ReceiptDraft {
            warehouse_id: demo.main,
            supplier: "Acme Components".to_string(),
            supplier_reference: "PO-2024-001".to_string(),
            notes: String::new(),
            requested_status: DocumentStatus::Ready,
            lines: vec![
                ReceiptLineDraft {
                    product_id: demo.laptop,
                    bin_id: Some(demo.bin_b2),
                    quantity_ordered: dec!(40),
                    quantity_received: dec!(40),
                    unit: UnitOfMeasure::Stock,
                    unit_price: Some(dec!(649.00)),
                },
                ReceiptLineDraft {
                    product_id: demo.cable,
                    bin_id: Some(demo.bin_a1),
                    quantity_ordered: dec!(4),
                    quantity_received: dec!(4),
                    unit: UnitOfMeasure::Purchase,
                    unit_price: Some(dec!(45.00)),
                },
            ],
        },
        demo.actor,
        now,
    )?;
    let outcome = demo.engine.validate_document(*receipt.id(), demo.actor, now)?;
    tracing::info!(document = receipt.number(), message = %outcome.message, "receipt");
    log_level(demo, "LAP-015", demo.laptop)?;
    log_level(demo, "CBL-USB", demo.cable)?;

    // Two deliveries go ready, get batched into one wave, then validate.
    let mut delivery_ids = Vec::new();
    for (qty, customer) in [(dec!(5), "Initech"), (dec!(3), "Globex")] {
        let delivery = demo.engine.create_delivery(
            DeliveryDraft {
                warehouse_id: demo.main,
                customer: customer.to_string(),
                customer_reference: String::new(),
                shipping_address: String::new(),
                notes: String::new(),
                requested_status: DocumentStatus::Ready,
                lines: vec![DeliveryLineDraft {
                    product_id: demo.laptop,
                    bin_id: Some(demo.bin_b2),
                    quantity: qty,
                    unit: UnitOfMeasure::Stock,
                }],
            },
            demo.actor,
            now,
        )?;
        delivery_ids.push(*delivery.id());
    }
    log_level(demo, "LAP-015", demo.laptop)?;

    let generation = demo.engine.generate_wave(
        WaveFilter {
            warehouse_id: Some(demo.main),
            ..WaveFilter::default()
        },
        demo.actor,
        now,
    )?;
    if let Some(wave) = &generation.pick_wave {
        let wave_id = *wave.id();
        for row in demo.engine.pick_list(wave_id)? {
            tracing::info!(
                bin = row.bin_code,
                sku = row.product_sku,
                quantity = %row.total_quantity,
                orders = row.order_count,
                "pick list row"
            );
        }
        demo.engine.start_picking(wave_id, now)?;
        for id in &delivery_ids {
            let outcome = demo.engine.validate_document(*id, demo.actor, now)?;
            tracing::info!(message = %outcome.message, "delivery");
        }
        demo.engine.complete_picking(wave_id, now)?;
    }
    log_level(demo, "LAP-015", demo.laptop)?;

    // Rebalance: move 10 laptops to the south warehouse.
    let transfer = demo.engine.create_transfer(
        TransferDraft {
            warehouse_id: demo.main,
            to_warehouse_id: demo.south,
            notes: String::new(),
            requested_status: DocumentStatus::Ready,
            lines: vec![TransferLineDraft {
                product_id: demo.laptop,
                bin_id: None,
                quantity: dec!(10),
                unit: UnitOfMeasure::Stock,
            }],
        },
        demo.actor,
        now,
    )?;
    let outcome = demo.engine.validate_document(*transfer.id(), demo.actor, now)?;
    tracing::info!(document = transfer.number(), message = %outcome.message, "transfer");

    // A cycle count finds two cables missing; the engine writes the -2.
    let count = demo.engine.create_cycle_count(
        CycleCountDraft {
            warehouse_id: demo.main,
            scheduled_date: None,
            method: CountMethod::Partial,
            notes: String::new(),
            requested_status: DocumentStatus::Ready,
            lines: vec![CycleCountLineDraft {
                product_id: demo.cable,
                expected_quantity: None,
            }],
        },
        demo.actor,
        now,
    )?;
    let on_hand = demo.engine.stock_by_warehouse(demo.cable, demo.main)?.quantity;
    demo.engine
        .record_counts(*count.id(), &[(demo.cable, on_hand - Decimal::TWO)], now)?;
    let outcome = demo.engine.validate_document(*count.id(), demo.actor, now)?;
    tracing::info!(document = count.number(), message = %outcome.message, "cycle count");

    // Reorder check + ledger tail.
    for (label, product) in [
        ("LAP-015", demo.laptop),
        ("CBL-USB", demo.cable),
        ("PAP-A4", demo.paper),
    ] {
        let level = demo.engine.stock_by_warehouse(product, demo.main)?;
        if let Some(p) = demo.engine.catalog().product(product) {
            if p.is_low_stock(level.quantity) {
                tracing::warn!(
                    product = label,
                    quantity = %level.quantity,
                    reorder_level = %p.reorder_level(),
                    reorder_quantity = %p.reorder_quantity(),
                    "below reorder level"
                );
            }
        }
    }

    let page = demo
        .engine
        .ledger(&LedgerFilter::default(), Page::new(0, 10))?;
    tracing::info!(total = page.total, "ledger entries (newest first)");
    for entry in &page.items {
        tracing::info!(
            document = entry.document_number,
            transaction = %entry.transaction_type,
            quantity = %entry.quantity,
            balance_after = %entry.balance_after,
            "ledger"
        );
    }

    Ok(())
}

fn main() -> Result<()> {
    stockmaster_observability::init();
    let demo = seed()?;
    run(&demo)?;
    tracing::info!("demo finished");
    Ok(())
}
