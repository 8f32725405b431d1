//! End-to-end flows through the public engine API.

use std::sync::Arc;
use std::thread;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value as JsonValue;

use stockmaster_core::{BinId, ConversionFactor, Entity, ProductId, UnitOfMeasure, UserId, WarehouseId};
use stockmaster_events::{EventBus, EventEnvelope, InMemoryEventBus};
use stockmaster_ledger::{LedgerFilter, Page, StockCache, StockStore, TransactionType};
use stockmaster_operations::{
    Actor, AdjustmentDraft, AdjustmentLineDraft, AdjustmentType, ApprovalPolicy, CountMethod,
    CycleCountDraft, CycleCountLineDraft, DeliveryDraft, DeliveryLineDraft, Disposition,
    DocumentBody, DocumentEngine, DocumentStatus, ReceiptDraft, ReceiptLineDraft, ReturnDraft,
    ReturnLineDraft, Role, TransferDraft, TransferLineDraft, WaveFilter,
};
use stockmaster_products::{BinLocation, Catalog, Product, Warehouse};

type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
type Engine = DocumentEngine<Bus>;

struct Fixture {
    engine: Arc<Engine>,
    bus: Bus,
    actor: UserId,
    main: WarehouseId,
    south: WarehouseId,
    bin_a1: BinId,
    widget: ProductId,
    gadget: ProductId,
}

fn fixture() -> Fixture {
    let catalog = Arc::new(Catalog::new());
    let actor = UserId::new();

    let main = Warehouse::new(WarehouseId::new(), "MAIN", "Main Warehouse").unwrap();
    let south = Warehouse::new(WarehouseId::new(), "SOUTH", "South Warehouse").unwrap();
    let main_id = *main.id();
    let south_id = *south.id();
    catalog.upsert_warehouse(main);
    catalog.upsert_warehouse(south);

    let bin_a1 = BinLocation::new(BinId::new(), main_id, "A1", None).unwrap();
    let bin_a1_id = *bin_a1.id();
    catalog.upsert_bin(bin_a1);

    // Widget is bought by the carton of 12, stocked by the piece.
    let widget = Product::new(
        ProductId::new(),
        "WID-1",
        "Blue Widget",
        "pcs",
        Some("carton".to_string()),
        ConversionFactor::new(dec!(12)).unwrap(),
        dec!(10),
        dec!(50),
        Utc::now(),
    )
    .unwrap();
    let gadget = Product::new(
        ProductId::new(),
        "GAD-1",
        "Red Gadget",
        "pcs",
        None,
        ConversionFactor::identity(),
        dec!(5),
        dec!(20),
        Utc::now(),
    )
    .unwrap();
    let widget_id = *widget.id();
    let gadget_id = *gadget.id();
    catalog.upsert_product(widget);
    catalog.upsert_product(gadget);

    let stock = Arc::new(StockStore::new());
    let bus: Bus = Arc::new(InMemoryEventBus::new());
    let engine = Arc::new(DocumentEngine::new(catalog, stock, bus.clone()));

    Fixture {
        engine,
        bus,
        actor,
        main: main_id,
        south: south_id,
        bin_a1: bin_a1_id,
        widget: widget_id,
        gadget: gadget_id,
    }
}

fn receipt_line(product: ProductId, qty: Decimal) -> ReceiptLineDraft {
    ReceiptLineDraft {
        product_id: product,
        bin_id: None,
        quantity_ordered: qty,
        quantity_received: qty,
        unit: UnitOfMeasure::Stock,
        unit_price: None,
    }
}

/// Seed stock through the front door: a validated receipt.
fn seed_stock(f: &Fixture, product: ProductId, warehouse: WarehouseId, qty: Decimal) {
    let doc = f
        .engine
        .create_receipt(
            ReceiptDraft {
                warehouse_id: warehouse,
                supplier: "Seed Supplies".to_string(),
                supplier_reference: String::new(),
                notes: String::new(),
                requested_status: DocumentStatus::Ready,
                lines: vec![receipt_line(product, qty)],
            },
            f.actor,
            Utc::now(),
        )
        .unwrap();
    let outcome = f
        .engine
        .validate_document(*doc.id(), f.actor, Utc::now())
        .unwrap();
    assert!(outcome.success, "seed receipt failed: {}", outcome.message);
}

fn delivery_draft(
    f: &Fixture,
    product: ProductId,
    qty: Decimal,
    status: DocumentStatus,
) -> DeliveryDraft {
    DeliveryDraft {
        warehouse_id: f.main,
        customer: "ACME Corp".to_string(),
        customer_reference: String::new(),
        shipping_address: String::new(),
        notes: String::new(),
        requested_status: status,
        lines: vec![DeliveryLineDraft {
            product_id: product,
            bin_id: None,
            quantity: qty,
            unit: UnitOfMeasure::Stock,
        }],
    }
}

#[test]
fn receipt_in_purchase_units_converts_once() {
    let f = fixture();
    let doc = f
        .engine
        .create_receipt(
            ReceiptDraft {
                warehouse_id: f.main,
                supplier: "Carton Co".to_string(),
                supplier_reference: "PO-17".to_string(),
                notes: String::new(),
                requested_status: DocumentStatus::Draft,
                lines: vec![ReceiptLineDraft {
                    product_id: f.widget,
                    bin_id: Some(f.bin_a1),
                    quantity_ordered: dec!(2),
                    quantity_received: dec!(2),
                    unit: UnitOfMeasure::Purchase,
                    unit_price: Some(dec!(36.00)),
                }],
            },
            f.actor,
            Utc::now(),
        )
        .unwrap();
    assert_eq!(doc.number(), "REC-000001");

    let outcome = f
        .engine
        .validate_document(*doc.id(), f.actor, Utc::now())
        .unwrap();
    assert!(outcome.success);

    // 2 cartons of 12 land as 24 stock units.
    let level = f.engine.stock_by_warehouse(f.widget, f.main).unwrap();
    assert_eq!(level.quantity, dec!(24));

    let page = f
        .engine
        .ledger(
            &LedgerFilter {
                product_id: Some(f.widget),
                ..LedgerFilter::default()
            },
            Page::default(),
        )
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].transaction_type, TransactionType::Receipt);
    assert_eq!(page.items[0].quantity, dec!(24));
    assert_eq!(page.items[0].balance_after, dec!(24));
    assert_eq!(page.items[0].document_number, "REC-000001");
}

#[test]
fn over_issuing_delivery_leaves_ledger_and_status_untouched() {
    let f = fixture();
    seed_stock(&f, f.gadget, f.main, dec!(10));

    let doc = f
        .engine
        .create_delivery(
            delivery_draft(&f, f.gadget, dec!(15), DocumentStatus::Draft),
            f.actor,
            Utc::now(),
        )
        .unwrap();
    let id = *doc.id();

    let outcome = f.engine.validate_document(id, f.actor, Utc::now()).unwrap();
    assert!(!outcome.success);
    assert!(outcome.message.contains("requested 15"), "{}", outcome.message);
    assert!(outcome.message.contains("available 10"), "{}", outcome.message);

    // Quantity still 10, document still draft, no delivery rows.
    assert_eq!(
        f.engine.stock_by_warehouse(f.gadget, f.main).unwrap().quantity,
        dec!(10)
    );
    assert_eq!(f.engine.document(id).unwrap().status(), DocumentStatus::Draft);
    let page = f
        .engine
        .ledger(
            &LedgerFilter {
                transaction_type: Some(TransactionType::Delivery),
                ..LedgerFilter::default()
            },
            Page::default(),
        )
        .unwrap();
    assert_eq!(page.total, 0);
}

#[test]
fn delivery_reserves_at_ready_and_releases_on_cancel() {
    let f = fixture();
    seed_stock(&f, f.gadget, f.main, dec!(10));

    let doc = f
        .engine
        .create_delivery(
            delivery_draft(&f, f.gadget, dec!(6), DocumentStatus::Draft),
            f.actor,
            Utc::now(),
        )
        .unwrap();
    let id = *doc.id();

    // Drafts hold nothing.
    let level = f.engine.stock_by_warehouse(f.gadget, f.main).unwrap();
    assert_eq!(level.reserved_quantity, dec!(0));

    f.engine.mark_ready(id, Utc::now()).unwrap();
    let level = f.engine.stock_by_warehouse(f.gadget, f.main).unwrap();
    assert_eq!(level.quantity, dec!(10));
    assert_eq!(level.reserved_quantity, dec!(6));
    assert_eq!(level.available_quantity, dec!(4));

    // A second delivery for more than what's left cannot go ready.
    let second = f
        .engine
        .create_delivery(
            delivery_draft(&f, f.gadget, dec!(5), DocumentStatus::Draft),
            f.actor,
            Utc::now(),
        )
        .unwrap();
    let second_id = *second.id();
    assert!(f.engine.mark_ready(second_id, Utc::now()).is_err());

    // Cancel releases the hold; no ledger rows were written.
    f.engine.cancel_document(id, Utc::now()).unwrap();
    let level = f.engine.stock_by_warehouse(f.gadget, f.main).unwrap();
    assert_eq!(level.reserved_quantity, dec!(0));
    assert_eq!(level.available_quantity, dec!(10));
    assert_eq!(
        f.engine.document(id).unwrap().status(),
        DocumentStatus::Canceled
    );
}

#[test]
fn reserved_delivery_commits_without_transient_available_glitch() {
    let f = fixture();
    seed_stock(&f, f.gadget, f.main, dec!(10));

    let doc = f
        .engine
        .create_delivery(
            delivery_draft(&f, f.gadget, dec!(6), DocumentStatus::Ready),
            f.actor,
            Utc::now(),
        )
        .unwrap();
    let id = *doc.id();
    assert!(doc.is_reserved());

    let outcome = f.engine.validate_document(id, f.actor, Utc::now()).unwrap();
    assert!(outcome.success, "{}", outcome.message);

    let level = f.engine.stock_by_warehouse(f.gadget, f.main).unwrap();
    assert_eq!(level.quantity, dec!(4));
    assert_eq!(level.reserved_quantity, dec!(0));
    assert_eq!(level.available_quantity, dec!(4));
}

#[test]
fn validation_is_exactly_once() {
    let f = fixture();
    seed_stock(&f, f.gadget, f.main, dec!(10));

    let doc = f
        .engine
        .create_delivery(
            delivery_draft(&f, f.gadget, dec!(4), DocumentStatus::Ready),
            f.actor,
            Utc::now(),
        )
        .unwrap();
    let id = *doc.id();

    assert!(f.engine.validate_document(id, f.actor, Utc::now()).unwrap().success);
    let again = f.engine.validate_document(id, f.actor, Utc::now()).unwrap();
    assert!(!again.success);
    assert!(again.message.contains("already completed"), "{}", again.message);

    // Stock moved exactly once.
    assert_eq!(
        f.engine.stock_by_warehouse(f.gadget, f.main).unwrap().quantity,
        dec!(6)
    );
}

#[test]
fn transfer_moves_both_sides_or_neither() {
    let f = fixture();
    seed_stock(&f, f.gadget, f.main, dec!(20));
    seed_stock(&f, f.widget, f.main, dec!(3));

    // Happy path: 5 units MAIN → SOUTH.
    let transfer = f
        .engine
        .create_transfer(
            TransferDraft {
                warehouse_id: f.main,
                to_warehouse_id: f.south,
                notes: String::new(),
                requested_status: DocumentStatus::Ready,
                lines: vec![TransferLineDraft {
                    product_id: f.gadget,
                    bin_id: None,
                    quantity: dec!(5),
                    unit: UnitOfMeasure::Stock,
                }],
            },
            f.actor,
            Utc::now(),
        )
        .unwrap();
    let outcome = f
        .engine
        .validate_document(*transfer.id(), f.actor, Utc::now())
        .unwrap();
    assert!(outcome.success, "{}", outcome.message);
    assert_eq!(
        f.engine.stock_by_warehouse(f.gadget, f.main).unwrap().quantity,
        dec!(15)
    );
    assert_eq!(
        f.engine.stock_by_warehouse(f.gadget, f.south).unwrap().quantity,
        dec!(5)
    );

    // Failure path: second line exceeds source stock → neither line moves.
    let doomed = f
        .engine
        .create_transfer(
            TransferDraft {
                warehouse_id: f.main,
                to_warehouse_id: f.south,
                notes: String::new(),
                requested_status: DocumentStatus::Draft,
                lines: vec![
                    TransferLineDraft {
                        product_id: f.gadget,
                        bin_id: None,
                        quantity: dec!(5),
                        unit: UnitOfMeasure::Stock,
                    },
                    TransferLineDraft {
                        product_id: f.widget,
                        bin_id: None,
                        quantity: dec!(99),
                        unit: UnitOfMeasure::Stock,
                    },
                ],
            },
            f.actor,
            Utc::now(),
        )
        .unwrap();
    let outcome = f
        .engine
        .validate_document(*doomed.id(), f.actor, Utc::now())
        .unwrap();
    assert!(!outcome.success);

    // Zero net rows on both sides for both products.
    assert_eq!(
        f.engine.stock_by_warehouse(f.gadget, f.main).unwrap().quantity,
        dec!(15)
    );
    assert_eq!(
        f.engine.stock_by_warehouse(f.gadget, f.south).unwrap().quantity,
        dec!(5)
    );
    assert_eq!(
        f.engine.stock_by_warehouse(f.widget, f.main).unwrap().quantity,
        dec!(3)
    );
    assert_eq!(
        f.engine.stock_by_warehouse(f.widget, f.south).unwrap().quantity,
        dec!(0)
    );
    let transfers = f
        .engine
        .ledger(
            &LedgerFilter {
                document_number: Some(doomed.number().to_string()),
                ..LedgerFilter::default()
            },
            Page::default(),
        )
        .unwrap();
    assert_eq!(transfers.total, 0);
}

#[test]
fn transfer_to_same_warehouse_is_an_invalid_pairing() {
    let f = fixture();
    let err = f
        .engine
        .create_transfer(
            TransferDraft {
                warehouse_id: f.main,
                to_warehouse_id: f.main,
                notes: String::new(),
                requested_status: DocumentStatus::Draft,
                lines: vec![],
            },
            f.actor,
            Utc::now(),
        )
        .unwrap_err();
    assert!(err.to_string().contains("cannot be the same"));
}

#[test]
fn adjustment_set_and_increase_converge() {
    let f = fixture();
    seed_stock(&f, f.gadget, f.main, dec!(20));
    seed_stock(&f, f.widget, f.main, dec!(8));

    // set: 20 → 14 writes exactly one entry of −6.
    let set = f
        .engine
        .create_adjustment(
            AdjustmentDraft {
                warehouse_id: f.main,
                reason: "Annual recount".to_string(),
                adjustment_type: AdjustmentType::Set,
                force: false,
                notes: String::new(),
                requested_status: DocumentStatus::Ready,
                lines: vec![AdjustmentLineDraft {
                    product_id: f.gadget,
                    adjustment_quantity: dec!(14),
                    reason: String::new(),
                }],
            },
            f.actor,
            Utc::now(),
        )
        .unwrap();
    assert!(
        f.engine
            .validate_document(*set.id(), f.actor, Utc::now())
            .unwrap()
            .success
    );

    let rows = f
        .engine
        .ledger(
            &LedgerFilter {
                document_number: Some(set.number().to_string()),
                ..LedgerFilter::default()
            },
            Page::default(),
        )
        .unwrap();
    assert_eq!(rows.total, 1);
    assert_eq!(rows.items[0].quantity, dec!(-6));
    assert_eq!(rows.items[0].balance_after, dec!(14));

    // increase by 6: 8 → 14, same destination by the delta route.
    let increase = f
        .engine
        .create_adjustment(
            AdjustmentDraft {
                warehouse_id: f.main,
                reason: "Found stock".to_string(),
                adjustment_type: AdjustmentType::Increase,
                force: false,
                notes: String::new(),
                requested_status: DocumentStatus::Ready,
                lines: vec![AdjustmentLineDraft {
                    product_id: f.widget,
                    adjustment_quantity: dec!(6),
                    reason: String::new(),
                }],
            },
            f.actor,
            Utc::now(),
        )
        .unwrap();
    assert!(
        f.engine
            .validate_document(*increase.id(), f.actor, Utc::now())
            .unwrap()
            .success
    );

    assert_eq!(
        f.engine.stock_by_warehouse(f.gadget, f.main).unwrap().quantity,
        dec!(14)
    );
    assert_eq!(
        f.engine.stock_by_warehouse(f.widget, f.main).unwrap().quantity,
        dec!(14)
    );
}

#[test]
fn cycle_count_variance_generates_a_delta_adjustment() {
    let f = fixture();
    seed_stock(&f, f.gadget, f.main, dec!(50));

    let task = f
        .engine
        .create_cycle_count(
            CycleCountDraft {
                warehouse_id: f.main,
                scheduled_date: None,
                method: CountMethod::Full,
                notes: String::new(),
                requested_status: DocumentStatus::Ready,
                lines: vec![CycleCountLineDraft {
                    product_id: f.gadget,
                    expected_quantity: None, // snapshot: 50
                }],
            },
            f.actor,
            Utc::now(),
        )
        .unwrap();
    let task_id = *task.id();

    let updated = f
        .engine
        .record_counts(task_id, &[(f.gadget, dec!(47))], Utc::now())
        .unwrap();
    assert_eq!(updated, 1);

    let outcome = f.engine.validate_document(task_id, f.actor, Utc::now()).unwrap();
    assert!(outcome.success, "{}", outcome.message);

    // The ledger records the −3 variance, never an absolute 47.
    let adjustments = f
        .engine
        .ledger(
            &LedgerFilter {
                transaction_type: Some(TransactionType::Adjustment),
                ..LedgerFilter::default()
            },
            Page::default(),
        )
        .unwrap();
    assert_eq!(adjustments.total, 1);
    assert_eq!(adjustments.items[0].quantity, dec!(-3));
    assert_eq!(adjustments.items[0].balance_after, dec!(47));

    let task = f.engine.document(task_id).unwrap();
    assert_eq!(task.status(), DocumentStatus::Done);
    let DocumentBody::CycleCount(details) = task.body() else {
        panic!("expected cycle count body");
    };
    let generated = details.generated_adjustment.clone().expect("back-reference");
    assert_eq!(adjustments.items[0].document_number, generated);

    // The generated adjustment itself is a completed document.
    assert_eq!(
        f.engine
            .documents_of_kind(stockmaster_operations::DocumentKind::Adjustment)
            .into_iter()
            .filter(|d| d.status() == DocumentStatus::Done)
            .count(),
        1
    );
}

#[test]
fn cycle_count_without_variance_writes_nothing() {
    let f = fixture();
    seed_stock(&f, f.gadget, f.main, dec!(12));

    let task = f
        .engine
        .create_cycle_count(
            CycleCountDraft {
                warehouse_id: f.main,
                scheduled_date: None,
                method: CountMethod::Partial,
                notes: String::new(),
                requested_status: DocumentStatus::Ready,
                lines: vec![CycleCountLineDraft {
                    product_id: f.gadget,
                    expected_quantity: None,
                }],
            },
            f.actor,
            Utc::now(),
        )
        .unwrap();
    let task_id = *task.id();
    f.engine
        .record_counts(task_id, &[(f.gadget, dec!(12))], Utc::now())
        .unwrap();

    let outcome = f.engine.validate_document(task_id, f.actor, Utc::now()).unwrap();
    assert!(outcome.success);
    assert!(outcome.message.contains("No stock differences"), "{}", outcome.message);

    let adjustments = f
        .engine
        .ledger(
            &LedgerFilter {
                transaction_type: Some(TransactionType::Adjustment),
                ..LedgerFilter::default()
            },
            Page::default(),
        )
        .unwrap();
    assert_eq!(adjustments.total, 0);
}

#[test]
fn returns_restock_or_log_only_by_disposition() {
    let f = fixture();
    seed_stock(&f, f.gadget, f.main, dec!(10));

    let restock = f
        .engine
        .create_return(
            ReturnDraft {
                warehouse_id: f.main,
                delivery_number: None,
                reason: "Wrong size".to_string(),
                disposition: Disposition::Restock,
                notes: String::new(),
                requested_status: DocumentStatus::Ready,
                lines: vec![ReturnLineDraft {
                    product_id: f.gadget,
                    quantity: dec!(2),
                    reason_code: "RMA-1".to_string(),
                }],
            },
            f.actor,
            Utc::now(),
        )
        .unwrap();
    assert!(
        f.engine
            .validate_document(*restock.id(), f.actor, Utc::now())
            .unwrap()
            .success
    );
    assert_eq!(
        f.engine.stock_by_warehouse(f.gadget, f.main).unwrap().quantity,
        dec!(12)
    );

    // Scrap keeps stock flat but still leaves an auditable row.
    let scrap = f
        .engine
        .create_return(
            ReturnDraft {
                warehouse_id: f.main,
                delivery_number: None,
                reason: "Damaged in transit".to_string(),
                disposition: Disposition::Scrap,
                notes: String::new(),
                requested_status: DocumentStatus::Ready,
                lines: vec![ReturnLineDraft {
                    product_id: f.gadget,
                    quantity: dec!(3),
                    reason_code: "RMA-2".to_string(),
                }],
            },
            f.actor,
            Utc::now(),
        )
        .unwrap();
    assert!(
        f.engine
            .validate_document(*scrap.id(), f.actor, Utc::now())
            .unwrap()
            .success
    );
    assert_eq!(
        f.engine.stock_by_warehouse(f.gadget, f.main).unwrap().quantity,
        dec!(12)
    );

    let rows = f
        .engine
        .ledger(
            &LedgerFilter {
                document_number: Some(scrap.number().to_string()),
                ..LedgerFilter::default()
            },
            Page::default(),
        )
        .unwrap();
    assert_eq!(rows.total, 1);
    assert_eq!(rows.items[0].transaction_type, TransactionType::Return);
    assert_eq!(rows.items[0].quantity, dec!(0));
    assert!(rows.items[0].reference.contains("scrap"));
}

#[test]
fn restock_routes_into_the_quarantine_warehouse_when_configured() {
    let f = fixture();
    let quarantine = Warehouse::new(WarehouseId::new(), "QRN", "Quarantine")
        .unwrap()
        .quarantine();
    let quarantine_id = *quarantine.id();
    f.engine.catalog().upsert_warehouse(quarantine);

    let ret = f
        .engine
        .create_return(
            ReturnDraft {
                warehouse_id: f.main,
                delivery_number: None,
                reason: "Customer remorse".to_string(),
                disposition: Disposition::Restock,
                notes: String::new(),
                requested_status: DocumentStatus::Ready,
                lines: vec![ReturnLineDraft {
                    product_id: f.gadget,
                    quantity: dec!(4),
                    reason_code: String::new(),
                }],
            },
            f.actor,
            Utc::now(),
        )
        .unwrap();
    assert!(
        f.engine
            .validate_document(*ret.id(), f.actor, Utc::now())
            .unwrap()
            .success
    );

    assert_eq!(
        f.engine
            .stock_by_warehouse(f.gadget, quarantine_id)
            .unwrap()
            .quantity,
        dec!(4)
    );
    assert_eq!(
        f.engine.stock_by_warehouse(f.gadget, f.main).unwrap().quantity,
        dec!(0)
    );
}

#[test]
fn pick_wave_consolidates_and_sequences_only() {
    let f = fixture();
    seed_stock(&f, f.gadget, f.main, dec!(20));

    for _ in 0..2 {
        let draft = DeliveryDraft {
            warehouse_id: f.main,
            customer: "ACME Corp".to_string(),
            customer_reference: String::new(),
            shipping_address: String::new(),
            notes: String::new(),
            requested_status: DocumentStatus::Ready,
            lines: vec![DeliveryLineDraft {
                product_id: f.gadget,
                bin_id: Some(f.bin_a1),
                quantity: dec!(3),
                unit: UnitOfMeasure::Stock,
            }],
        };
        f.engine.create_delivery(draft, f.actor, Utc::now()).unwrap();
    }

    let generation = f
        .engine
        .generate_wave(
            WaveFilter {
                warehouse_id: Some(f.main),
                ..WaveFilter::default()
            },
            f.actor,
            Utc::now(),
        )
        .unwrap();
    assert!(generation.success, "{}", generation.message);
    let wave = generation.pick_wave.unwrap();
    assert_eq!(wave.delivery_ids().len(), 2);
    let wave_id = *wave.id();

    let rows = f.engine.pick_list(wave_id).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].product_sku, "GAD-1");
    assert_eq!(rows[0].bin_code, "A1");
    assert_eq!(rows[0].total_quantity, dec!(6));
    assert_eq!(rows[0].order_count, 2);

    // Wave transitions never move stock.
    assert!(f.engine.start_picking(wave_id, Utc::now()).unwrap().success);
    assert!(f.engine.complete_picking(wave_id, Utc::now()).unwrap().success);
    assert_eq!(
        f.engine.stock_by_warehouse(f.gadget, f.main).unwrap().quantity,
        dec!(20)
    );

    // Out-of-order transitions are refused.
    assert!(!f.engine.start_picking(wave_id, Utc::now()).unwrap().success);
}

#[test]
fn empty_wave_selection_is_a_structured_failure() {
    let f = fixture();
    let generation = f
        .engine
        .generate_wave(WaveFilter::default(), f.actor, Utc::now())
        .unwrap();
    assert!(!generation.success);
    assert!(generation.pick_wave.is_none());
}

#[test]
fn concurrent_validations_never_overcommit() {
    let f = fixture();
    seed_stock(&f, f.gadget, f.main, dec!(10));

    // Two drafts each wanting the full available stock.
    let first = f
        .engine
        .create_delivery(
            delivery_draft(&f, f.gadget, dec!(10), DocumentStatus::Draft),
            f.actor,
            Utc::now(),
        )
        .unwrap();
    let second = f
        .engine
        .create_delivery(
            delivery_draft(&f, f.gadget, dec!(10), DocumentStatus::Draft),
            f.actor,
            Utc::now(),
        )
        .unwrap();

    let ids = [
        *first.id(),
        *second.id(),
    ];
    let mut handles = Vec::new();
    for id in ids {
        let engine = Arc::clone(&f.engine);
        let actor = f.actor;
        handles.push(thread::spawn(move || {
            engine.validate_document(id, actor, Utc::now()).unwrap()
        }));
    }
    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let successes = outcomes.iter().filter(|o| o.success).count();
    assert_eq!(successes, 1, "exactly one delivery may win: {outcomes:?}");
    let failure = outcomes.iter().find(|o| !o.success).unwrap();
    assert!(
        failure.message.contains("insufficient stock"),
        "{}",
        failure.message
    );
    assert_eq!(
        f.engine.stock_by_warehouse(f.gadget, f.main).unwrap().quantity,
        dec!(0)
    );
}

#[test]
fn approval_policy_gates_completion() {
    let f = fixture();
    seed_stock(&f, f.gadget, f.main, dec!(100));
    f.engine.approval_policies().add(ApprovalPolicy {
        kind: stockmaster_operations::DocumentKind::Delivery,
        warehouse_id: None,
        threshold_total_quantity: Some(dec!(50)),
        is_active: true,
    });

    let doc = f
        .engine
        .create_delivery(
            delivery_draft(&f, f.gadget, dec!(60), DocumentStatus::Ready),
            f.actor,
            Utc::now(),
        )
        .unwrap();
    let id = *doc.id();
    assert!(doc.requires_approval());

    let outcome = f.engine.validate_document(id, f.actor, Utc::now()).unwrap();
    assert!(!outcome.success);
    assert!(outcome.message.contains("approval"), "{}", outcome.message);

    // Operators may not approve.
    let operator = Actor::new(UserId::new(), Role::Operator);
    assert!(!f.engine.approve(id, &operator, "", Utc::now()).unwrap().success);

    let manager = Actor::new(UserId::new(), Role::InventoryManager);
    assert!(f.engine.approve(id, &manager, "checked", Utc::now()).unwrap().success);

    let outcome = f.engine.validate_document(id, f.actor, Utc::now()).unwrap();
    assert!(outcome.success, "{}", outcome.message);
}

#[test]
fn one_bad_line_fails_the_whole_document() {
    let f = fixture();
    seed_stock(&f, f.gadget, f.main, dec!(10));

    let mut lapsed = f.engine.catalog().product(f.widget).unwrap();
    lapsed.deactivate();
    f.engine.catalog().upsert_product(lapsed);
    seed_stock(&f, f.gadget, f.south, dec!(1)); // unrelated noise

    let draft = DeliveryDraft {
        warehouse_id: f.main,
        customer: "ACME Corp".to_string(),
        customer_reference: String::new(),
        shipping_address: String::new(),
        notes: String::new(),
        requested_status: DocumentStatus::Draft,
        lines: vec![
            DeliveryLineDraft {
                product_id: f.gadget,
                bin_id: None,
                quantity: dec!(2),
                unit: UnitOfMeasure::Stock,
            },
            DeliveryLineDraft {
                product_id: f.widget,
                bin_id: None,
                quantity: dec!(1),
                unit: UnitOfMeasure::Stock,
            },
        ],
    };
    let doc = f.engine.create_delivery(draft, f.actor, Utc::now()).unwrap();
    let outcome = f
        .engine
        .validate_document(*doc.id(), f.actor, Utc::now())
        .unwrap();
    assert!(!outcome.success);
    assert!(outcome.message.contains("not active"), "{}", outcome.message);

    // Neither line moved stock.
    assert_eq!(
        f.engine.stock_by_warehouse(f.gadget, f.main).unwrap().quantity,
        dec!(10)
    );
}

#[test]
fn stock_cache_replica_follows_published_entries() {
    let f = fixture();
    let subscription = f.bus.subscribe();
    let cache = StockCache::new();

    seed_stock(&f, f.gadget, f.main, dec!(9));
    let delivery = f
        .engine
        .create_delivery(
            delivery_draft(&f, f.gadget, dec!(4), DocumentStatus::Ready),
            f.actor,
            Utc::now(),
        )
        .unwrap();
    assert!(
        f.engine
            .validate_document(*delivery.id(), f.actor, Utc::now())
            .unwrap()
            .success
    );

    for envelope in subscription.drain() {
        cache.apply_envelope(&envelope).unwrap();
    }

    let key = stockmaster_ledger::StockKey::new(f.gadget, f.main);
    assert_eq!(cache.quantity(key), Some(dec!(5)));
    assert_eq!(
        f.engine.stock_by_warehouse(f.gadget, f.main).unwrap().quantity,
        dec!(5)
    );
}
