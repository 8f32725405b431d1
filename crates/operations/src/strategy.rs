//! Kind-specific commit capabilities.
//!
//! The state machine is shared; what differs between the six document kinds
//! is (a) structural line validation and (b) how lines translate into
//! ledger postings. Each kind implements those two hooks and nothing else.
//! Availability is deliberately NOT checked here — that happens inside
//! [`StockStore::commit`](stockmaster_ledger::StockStore::commit) under the
//! account locks, where the answer cannot race.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use stockmaster_core::{BinId, DomainError, DomainResult, Entity, ProductId, UserId, WarehouseId};
use stockmaster_ledger::{Posting, PostingAmount, StockKey, StockStore, TransactionType};
use stockmaster_products::{Catalog, Product};

use crate::document::{AdjustmentType, Disposition, Document, DocumentBody, DocumentKind};

/// Read-only context handed to commit strategies.
pub struct CommitContext<'a> {
    pub catalog: &'a Catalog,
    pub stock: &'a StockStore,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// The capability interface every document kind implements.
pub trait CommitStrategy: Send + Sync {
    /// Structural validation: active products, positive quantities, bin and
    /// warehouse pairing. Runs before any lock is taken.
    fn validate_lines(&self, doc: &Document, ctx: &CommitContext<'_>) -> DomainResult<()>;

    /// Translate the document's lines into ledger postings. The batch is
    /// committed atomically by the store.
    fn postings(&self, doc: &Document, ctx: &CommitContext<'_>) -> DomainResult<Vec<Posting>>;
}

pub fn strategy_for(kind: DocumentKind) -> &'static dyn CommitStrategy {
    match kind {
        DocumentKind::Receipt => &ReceiptCommit,
        DocumentKind::Delivery => &DeliveryCommit,
        DocumentKind::Transfer => &TransferCommit,
        DocumentKind::Adjustment => &AdjustmentCommit,
        DocumentKind::Return => &ReturnCommit,
        DocumentKind::CycleCount => &CycleCountCommit,
    }
}

fn require_lines(doc: &Document) -> DomainResult<()> {
    if doc.body().line_count() == 0 {
        return Err(DomainError::validation(format!(
            "{} {} has no line items",
            doc.kind().label(),
            doc.number()
        )));
    }
    Ok(())
}

fn require_active_product(ctx: &CommitContext<'_>, product_id: ProductId) -> DomainResult<Product> {
    let product = ctx
        .catalog
        .product(product_id)
        .ok_or_else(|| DomainError::validation(format!("unknown product {product_id}")))?;
    if !product.is_active() {
        return Err(DomainError::validation(format!(
            "product {} is not active",
            product.sku()
        )));
    }
    Ok(product)
}

fn require_positive(quantity: Decimal, product: &Product) -> DomainResult<()> {
    if quantity <= Decimal::ZERO {
        return Err(DomainError::validation(format!(
            "quantity for {} must be positive",
            product.sku()
        )));
    }
    Ok(())
}

fn require_bin_in_warehouse(
    ctx: &CommitContext<'_>,
    bin_id: Option<BinId>,
    warehouse_id: WarehouseId,
) -> DomainResult<()> {
    let Some(bin_id) = bin_id else {
        return Ok(());
    };
    if !ctx.catalog.bin_in_warehouse(bin_id, warehouse_id) {
        let warehouse = ctx
            .catalog
            .warehouse(warehouse_id)
            .map(|w| w.name().to_string())
            .unwrap_or_else(|| warehouse_id.to_string());
        return Err(DomainError::validation(format!(
            "bin does not belong to warehouse {warehouse}"
        )));
    }
    Ok(())
}

fn base_posting(
    product: &Product,
    key: StockKey,
    bin_id: Option<BinId>,
    transaction_type: TransactionType,
    amount: PostingAmount,
    doc: &Document,
    ctx: &CommitContext<'_>,
    reference: String,
) -> Posting {
    Posting {
        key,
        bin_id,
        transaction_type,
        amount,
        releases_reservation: false,
        allow_negative: false,
        document_number: doc.number().to_string(),
        reference,
        created_by: ctx.actor,
        product_label: product.name().to_string(),
    }
}

/// Incoming stock from a supplier: one positive `receipt` entry per line.
pub struct ReceiptCommit;

impl CommitStrategy for ReceiptCommit {
    fn validate_lines(&self, doc: &Document, ctx: &CommitContext<'_>) -> DomainResult<()> {
        require_lines(doc)?;
        let DocumentBody::Receipt(details) = doc.body() else {
            return Err(DomainError::invariant("receipt strategy on non-receipt"));
        };
        for line in &details.lines {
            let product = require_active_product(ctx, line.product_id)?;
            require_positive(line.quantity_received, &product)?;
            require_bin_in_warehouse(ctx, line.bin_id, doc.warehouse_id())?;
        }
        Ok(())
    }

    fn postings(&self, doc: &Document, ctx: &CommitContext<'_>) -> DomainResult<Vec<Posting>> {
        let DocumentBody::Receipt(details) = doc.body() else {
            return Err(DomainError::invariant("receipt strategy on non-receipt"));
        };
        let reference = if details.supplier.is_empty() {
            String::new()
        } else {
            format!("Supplier: {}", details.supplier)
        };
        details
            .lines
            .iter()
            .map(|line| {
                let product = require_active_product(ctx, line.product_id)?;
                Ok(base_posting(
                    &product,
                    StockKey::new(line.product_id, doc.warehouse_id()),
                    line.bin_id,
                    TransactionType::Receipt,
                    PostingAmount::Delta(line.quantity_received),
                    doc,
                    ctx,
                    reference.clone(),
                ))
            })
            .collect()
    }
}

/// Outgoing stock to a customer: one negative `delivery` entry per line,
/// releasing the document's reservation when one is held.
pub struct DeliveryCommit;

impl CommitStrategy for DeliveryCommit {
    fn validate_lines(&self, doc: &Document, ctx: &CommitContext<'_>) -> DomainResult<()> {
        require_lines(doc)?;
        let DocumentBody::Delivery(details) = doc.body() else {
            return Err(DomainError::invariant("delivery strategy on non-delivery"));
        };
        for line in &details.lines {
            let product = require_active_product(ctx, line.product_id)?;
            require_positive(line.quantity, &product)?;
            require_bin_in_warehouse(ctx, line.bin_id, doc.warehouse_id())?;
        }
        Ok(())
    }

    fn postings(&self, doc: &Document, ctx: &CommitContext<'_>) -> DomainResult<Vec<Posting>> {
        let DocumentBody::Delivery(details) = doc.body() else {
            return Err(DomainError::invariant("delivery strategy on non-delivery"));
        };
        let reference = if details.customer.is_empty() {
            String::new()
        } else {
            format!("Customer: {}", details.customer)
        };
        details
            .lines
            .iter()
            .map(|line| {
                let product = require_active_product(ctx, line.product_id)?;
                let mut posting = base_posting(
                    &product,
                    StockKey::new(line.product_id, doc.warehouse_id()),
                    line.bin_id,
                    TransactionType::Delivery,
                    PostingAmount::Delta(-line.quantity),
                    doc,
                    ctx,
                    reference.clone(),
                );
                posting.releases_reservation = doc.is_reserved();
                Ok(posting)
            })
            .collect()
    }
}

/// Stock movement between warehouses: a paired `transfer_out` at the source
/// and `transfer_in` at the destination per line — both or neither.
pub struct TransferCommit;

impl CommitStrategy for TransferCommit {
    fn validate_lines(&self, doc: &Document, ctx: &CommitContext<'_>) -> DomainResult<()> {
        require_lines(doc)?;
        let DocumentBody::Transfer(details) = doc.body() else {
            return Err(DomainError::invariant("transfer strategy on non-transfer"));
        };
        if details.to_warehouse_id == doc.warehouse_id() {
            return Err(DomainError::validation(
                "source and destination warehouses cannot be the same",
            ));
        }
        let destination = ctx
            .catalog
            .warehouse(details.to_warehouse_id)
            .ok_or_else(|| DomainError::validation("unknown destination warehouse"))?;
        if !destination.is_active() {
            return Err(DomainError::validation(format!(
                "destination warehouse {} is not active",
                destination.code()
            )));
        }
        for line in &details.lines {
            let product = require_active_product(ctx, line.product_id)?;
            require_positive(line.quantity, &product)?;
            // The line bin is the destination put-away bin.
            require_bin_in_warehouse(ctx, line.bin_id, details.to_warehouse_id)?;
        }
        Ok(())
    }

    fn postings(&self, doc: &Document, ctx: &CommitContext<'_>) -> DomainResult<Vec<Posting>> {
        let DocumentBody::Transfer(details) = doc.body() else {
            return Err(DomainError::invariant("transfer strategy on non-transfer"));
        };
        let destination_code = ctx
            .catalog
            .warehouse(details.to_warehouse_id)
            .map(|w| w.code().to_string())
            .unwrap_or_else(|| details.to_warehouse_id.to_string());
        let source_code = ctx
            .catalog
            .warehouse(doc.warehouse_id())
            .map(|w| w.code().to_string())
            .unwrap_or_else(|| doc.warehouse_id().to_string());

        let mut postings = Vec::with_capacity(details.lines.len() * 2);
        for line in &details.lines {
            let product = require_active_product(ctx, line.product_id)?;

            let mut out = base_posting(
                &product,
                StockKey::new(line.product_id, doc.warehouse_id()),
                None,
                TransactionType::TransferOut,
                PostingAmount::Delta(-line.quantity),
                doc,
                ctx,
                format!("Transfer to {destination_code}"),
            );
            out.releases_reservation = doc.is_reserved();
            postings.push(out);

            postings.push(base_posting(
                &product,
                StockKey::new(line.product_id, details.to_warehouse_id),
                line.bin_id,
                TransactionType::TransferIn,
                PostingAmount::Delta(line.quantity),
                doc,
                ctx,
                format!("Transfer from {source_code}"),
            ));
        }
        Ok(postings)
    }
}

/// Inventory correction. `increase`/`decrease` post signed deltas; `set`
/// posts an absolute target that the store resolves to a single delta entry
/// against the live balance — the ledger stays delta-only.
pub struct AdjustmentCommit;

impl CommitStrategy for AdjustmentCommit {
    fn validate_lines(&self, doc: &Document, ctx: &CommitContext<'_>) -> DomainResult<()> {
        require_lines(doc)?;
        let DocumentBody::Adjustment(details) = doc.body() else {
            return Err(DomainError::invariant("adjustment strategy on non-adjustment"));
        };
        for line in &details.lines {
            let product = require_active_product(ctx, line.product_id)?;
            match details.adjustment_type {
                AdjustmentType::Increase | AdjustmentType::Decrease => {
                    require_positive(line.adjustment_quantity, &product)?;
                }
                AdjustmentType::Set => {
                    if line.adjustment_quantity < Decimal::ZERO && !details.force {
                        return Err(DomainError::validation(format!(
                            "target quantity for {} cannot be negative",
                            product.sku()
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn postings(&self, doc: &Document, ctx: &CommitContext<'_>) -> DomainResult<Vec<Posting>> {
        let DocumentBody::Adjustment(details) = doc.body() else {
            return Err(DomainError::invariant("adjustment strategy on non-adjustment"));
        };
        details
            .lines
            .iter()
            .map(|line| {
                let product = require_active_product(ctx, line.product_id)?;
                let amount = match details.adjustment_type {
                    AdjustmentType::Increase => PostingAmount::Delta(line.adjustment_quantity),
                    AdjustmentType::Decrease => PostingAmount::Delta(-line.adjustment_quantity),
                    AdjustmentType::Set => PostingAmount::SetTo(line.adjustment_quantity),
                };
                let reference = if line.reason.is_empty() {
                    details.reason.clone()
                } else {
                    line.reason.clone()
                };
                let mut posting = base_posting(
                    &product,
                    StockKey::new(line.product_id, doc.warehouse_id()),
                    None,
                    TransactionType::Adjustment,
                    amount,
                    doc,
                    ctx,
                    reference,
                );
                posting.allow_negative = details.force;
                Ok(posting)
            })
            .collect()
    }
}

/// Customer return. `restock` puts goods back on hand at the routing
/// warehouse (quarantine when configured); `scrap` and `repair` leave stock
/// untouched but still write an auditable `return` row.
pub struct ReturnCommit;

impl ReturnCommit {
    /// Where returned goods land: the active quarantine warehouse when one
    /// exists, otherwise the document's warehouse.
    fn routing_warehouse(doc: &Document, ctx: &CommitContext<'_>) -> WarehouseId {
        ctx.catalog
            .active_quarantine_warehouse()
            .map(|w| *w.id())
            .unwrap_or_else(|| doc.warehouse_id())
    }
}

impl CommitStrategy for ReturnCommit {
    fn validate_lines(&self, doc: &Document, ctx: &CommitContext<'_>) -> DomainResult<()> {
        require_lines(doc)?;
        let DocumentBody::Return(details) = doc.body() else {
            return Err(DomainError::invariant("return strategy on non-return"));
        };
        for line in &details.lines {
            let product = require_active_product(ctx, line.product_id)?;
            require_positive(line.quantity, &product)?;
        }
        Ok(())
    }

    fn postings(&self, doc: &Document, ctx: &CommitContext<'_>) -> DomainResult<Vec<Posting>> {
        let DocumentBody::Return(details) = doc.body() else {
            return Err(DomainError::invariant("return strategy on non-return"));
        };
        let warehouse_id = Self::routing_warehouse(doc, ctx);
        let reference = format!(
            "Disposition: {}; Reason: {}",
            details.disposition, details.reason
        );
        details
            .lines
            .iter()
            .map(|line| {
                let product = require_active_product(ctx, line.product_id)?;
                let delta = match details.disposition {
                    Disposition::Restock => line.quantity,
                    Disposition::Scrap | Disposition::Repair => Decimal::ZERO,
                };
                Ok(base_posting(
                    &product,
                    StockKey::new(line.product_id, warehouse_id),
                    None,
                    TransactionType::Return,
                    PostingAmount::Delta(delta),
                    doc,
                    ctx,
                    reference.clone(),
                ))
            })
            .collect()
    }
}

/// Cycle counts never post directly: completion generates a `set`
/// adjustment that runs through the standard commit path, keeping a single
/// source of truth for stock mutation.
pub struct CycleCountCommit;

impl CommitStrategy for CycleCountCommit {
    fn validate_lines(&self, doc: &Document, ctx: &CommitContext<'_>) -> DomainResult<()> {
        require_lines(doc)?;
        let DocumentBody::CycleCount(details) = doc.body() else {
            return Err(DomainError::invariant("cycle count strategy on non-cycle-count"));
        };
        for line in &details.lines {
            let product = require_active_product(ctx, line.product_id)?;
            if line.counted_quantity < Decimal::ZERO {
                return Err(DomainError::validation(format!(
                    "counted quantity for {} cannot be negative",
                    product.sku()
                )));
            }
        }
        Ok(())
    }

    fn postings(&self, _doc: &Document, _ctx: &CommitContext<'_>) -> DomainResult<Vec<Posting>> {
        Ok(Vec::new())
    }
}
