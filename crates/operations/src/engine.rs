//! The document engine: create, edit, transition, validate, cancel.
//!
//! `validate_document` is the only blocking/transactional operation in the
//! system. Business failures (missing approval, insufficient stock, bad
//! lines) come back as a structured `{success, message}` outcome so callers
//! can render them; only invariant violations and storage faults propagate
//! as hard errors.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use stockmaster_core::{
    DocumentId, DomainError, DomainResult, Entity, ProductId, UserId, WarehouseId, WaveId,
};
use stockmaster_events::{EventBus, EventEnvelope};
use stockmaster_ledger::{
    LedgerFilter, Page, PageOf, StockEvent, StockKey, StockLedgerEntry, StockLevel, StockStore,
};
use stockmaster_products::Catalog;

use crate::approval::{Actor, ApprovalPolicies};
use crate::document::{
    AdjustmentDetails, AdjustmentDraft, AdjustmentLine, AdjustmentLineDraft, AdjustmentType,
    CycleCountDetails, CycleCountDraft, CycleCountLine, CycleCountLineDraft, DeliveryDetails,
    DeliveryDraft, DeliveryLine, DeliveryLineDraft, Document, DocumentBody, DocumentKind,
    LineDrafts, ReceiptDetails, ReceiptDraft, ReceiptLine, ReceiptLineDraft, ReturnDetails,
    ReturnDraft, ReturnLine, ReturnLineDraft, TransferDetails, TransferDraft, TransferLine,
    TransferLineDraft,
};
use crate::events::{
    CycleCountCompleted, DOCUMENT_SUBJECT, DocumentCanceled, DocumentCompleted, OperationsEvent,
    PICK_WAVE_SUBJECT, VarianceLine, WaveGenerated,
};
use crate::numbering::DocumentNumbers;
use crate::pick_wave::{PickListRow, PickWave, WaveFilter, consolidate};
use crate::status::{DocumentStatus, WaveStatus};
use crate::strategy::{CommitContext, strategy_for};

/// Structured validation result: business failures are data, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub success: bool,
    pub message: String,
}

impl ValidationOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Result of `generate_wave`.
#[derive(Debug, Clone)]
pub struct WaveGeneration {
    pub success: bool,
    pub message: String,
    pub pick_wave: Option<PickWave>,
}

impl WaveGeneration {
    fn ok(message: impl Into<String>, wave: PickWave) -> Self {
        Self {
            success: true,
            message: message.into(),
            pick_wave: Some(wave),
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            pick_wave: None,
        }
    }
}

pub struct DocumentEngine<B> {
    catalog: Arc<Catalog>,
    stock: Arc<StockStore>,
    documents: RwLock<HashMap<DocumentId, Document>>,
    waves: RwLock<HashMap<WaveId, PickWave>>,
    numbers: DocumentNumbers,
    policies: ApprovalPolicies,
    bus: B,
    publish_seq: AtomicU64,
}

impl<B> DocumentEngine<B>
where
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(catalog: Arc<Catalog>, stock: Arc<StockStore>, bus: B) -> Self {
        Self {
            catalog,
            stock,
            documents: RwLock::new(HashMap::new()),
            waves: RwLock::new(HashMap::new()),
            numbers: DocumentNumbers::new(),
            policies: ApprovalPolicies::new(),
            bus,
            publish_seq: AtomicU64::new(0),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn stock(&self) -> &StockStore {
        &self.stock
    }

    pub fn approval_policies(&self) -> &ApprovalPolicies {
        &self.policies
    }

    // ----- document creation ------------------------------------------------

    pub fn create_receipt(
        &self,
        draft: ReceiptDraft,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Document> {
        let lines = self.build_receipt_lines(draft.lines)?;
        let body = DocumentBody::Receipt(ReceiptDetails {
            supplier: draft.supplier,
            supplier_reference: draft.supplier_reference,
            lines,
        });
        self.insert_document(
            body,
            draft.warehouse_id,
            draft.notes,
            draft.requested_status,
            actor,
            occurred_at,
        )
    }

    pub fn create_delivery(
        &self,
        draft: DeliveryDraft,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Document> {
        let lines = self.build_delivery_lines(draft.lines)?;
        let body = DocumentBody::Delivery(DeliveryDetails {
            customer: draft.customer,
            customer_reference: draft.customer_reference,
            shipping_address: draft.shipping_address,
            lines,
        });
        self.insert_document(
            body,
            draft.warehouse_id,
            draft.notes,
            draft.requested_status,
            actor,
            occurred_at,
        )
    }

    pub fn create_transfer(
        &self,
        draft: TransferDraft,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Document> {
        if draft.to_warehouse_id == draft.warehouse_id {
            return Err(DomainError::validation(
                "source and destination warehouses cannot be the same",
            ));
        }
        self.catalog
            .warehouse(draft.to_warehouse_id)
            .ok_or_else(|| DomainError::validation("unknown destination warehouse"))?;
        let lines = self.build_transfer_lines(draft.lines)?;
        let body = DocumentBody::Transfer(TransferDetails {
            to_warehouse_id: draft.to_warehouse_id,
            lines,
        });
        self.insert_document(
            body,
            draft.warehouse_id,
            draft.notes,
            draft.requested_status,
            actor,
            occurred_at,
        )
    }

    pub fn create_adjustment(
        &self,
        draft: AdjustmentDraft,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Document> {
        let lines = self.build_adjustment_lines(draft.warehouse_id, draft.force, draft.lines)?;
        let body = DocumentBody::Adjustment(AdjustmentDetails {
            reason: draft.reason,
            adjustment_type: draft.adjustment_type,
            force: draft.force,
            lines,
        });
        self.insert_document(
            body,
            draft.warehouse_id,
            draft.notes,
            draft.requested_status,
            actor,
            occurred_at,
        )
    }

    pub fn create_return(
        &self,
        draft: ReturnDraft,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Document> {
        let lines = self.build_return_lines(draft.lines)?;
        let body = DocumentBody::Return(ReturnDetails {
            delivery_number: draft.delivery_number,
            reason: draft.reason,
            disposition: draft.disposition,
            lines,
        });
        self.insert_document(
            body,
            draft.warehouse_id,
            draft.notes,
            draft.requested_status,
            actor,
            occurred_at,
        )
    }

    pub fn create_cycle_count(
        &self,
        draft: CycleCountDraft,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Document> {
        let lines = self.build_cycle_count_lines(draft.warehouse_id, draft.lines)?;
        let body = DocumentBody::CycleCount(CycleCountDetails {
            scheduled_date: draft.scheduled_date,
            method: draft.method,
            generated_adjustment: None,
            lines,
        });
        self.insert_document(
            body,
            draft.warehouse_id,
            draft.notes,
            draft.requested_status,
            actor,
            occurred_at,
        )
    }

    // ----- document editing -------------------------------------------------

    pub fn set_notes(
        &self,
        id: DocumentId,
        notes: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Document> {
        let mut docs = self.docs_write()?;
        let doc = docs.get_mut(&id).ok_or(DomainError::NotFound)?;
        if !doc.status().can_edit() {
            return Err(DomainError::validation(
                "only draft documents can be edited",
            ));
        }
        doc.set_notes(notes.into(), occurred_at);
        Ok(doc.clone())
    }

    /// Replace a draft document's line items (documents are edited freely
    /// while draft, and only then).
    pub fn replace_lines(
        &self,
        id: DocumentId,
        lines: LineDrafts,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Document> {
        let mut docs = self.docs_write()?;
        let doc = docs.get_mut(&id).ok_or(DomainError::NotFound)?;
        if !doc.status().can_edit() {
            return Err(DomainError::validation(
                "only draft documents can be edited",
            ));
        }
        if lines.kind() != doc.kind() {
            return Err(DomainError::validation(format!(
                "line type does not match {} document",
                doc.kind()
            )));
        }
        let warehouse_id = doc.warehouse_id();
        match (lines, doc.body_mut()) {
            (LineDrafts::Receipt(ls), DocumentBody::Receipt(d)) => {
                d.lines = self.build_receipt_lines(ls)?;
            }
            (LineDrafts::Delivery(ls), DocumentBody::Delivery(d)) => {
                d.lines = self.build_delivery_lines(ls)?;
            }
            (LineDrafts::Transfer(ls), DocumentBody::Transfer(d)) => {
                d.lines = self.build_transfer_lines(ls)?;
            }
            (LineDrafts::Adjustment(ls), DocumentBody::Adjustment(d)) => {
                d.lines = self.build_adjustment_lines(warehouse_id, d.force, ls)?;
            }
            (LineDrafts::Return(ls), DocumentBody::Return(d)) => {
                d.lines = self.build_return_lines(ls)?;
            }
            (LineDrafts::CycleCount(ls), DocumentBody::CycleCount(d)) => {
                d.lines = self.build_cycle_count_lines(warehouse_id, ls)?;
            }
            _ => {
                return Err(DomainError::validation(
                    "line type does not match document kind",
                ));
            }
        }
        doc.touch(occurred_at);
        Ok(doc.clone())
    }

    /// Record counted quantities on a cycle count. Allowed until the task is
    /// terminal; returns how many lines matched.
    pub fn record_counts(
        &self,
        id: DocumentId,
        counts: &[(ProductId, Decimal)],
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<usize> {
        let mut docs = self.docs_write()?;
        let doc = docs.get_mut(&id).ok_or(DomainError::NotFound)?;
        if doc.status().is_terminal() {
            return Err(DomainError::validation(
                "counts can no longer be recorded on a terminal document",
            ));
        }
        let updated = {
            let DocumentBody::CycleCount(details) = doc.body_mut() else {
                return Err(DomainError::validation("document is not a cycle count"));
            };
            let mut updated = 0;
            for (product_id, counted) in counts {
                if *counted < Decimal::ZERO {
                    return Err(DomainError::validation(
                        "counted quantity cannot be negative",
                    ));
                }
                if let Some(line) = details
                    .lines
                    .iter_mut()
                    .find(|l| l.product_id == *product_id)
                {
                    line.counted_quantity = *counted;
                    updated += 1;
                }
            }
            updated
        };
        doc.touch(occurred_at);
        Ok(updated)
    }

    // ----- transitions ------------------------------------------------------

    /// Draft → waiting.
    pub fn submit(&self, id: DocumentId, occurred_at: DateTime<Utc>) -> DomainResult<Document> {
        self.transition(id, DocumentStatus::Waiting, occurred_at)
    }

    /// → ready. Outbound kinds place their reservation on the way.
    pub fn mark_ready(&self, id: DocumentId, occurred_at: DateTime<Utc>) -> DomainResult<Document> {
        self.transition(id, DocumentStatus::Ready, occurred_at)
    }

    fn transition(
        &self,
        id: DocumentId,
        to: DocumentStatus,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Document> {
        let mut docs = self.docs_write()?;
        let doc = docs.get_mut(&id).ok_or(DomainError::NotFound)?;
        self.advance(doc, to, occurred_at)?;
        Ok(doc.clone())
    }

    fn advance(
        &self,
        doc: &mut Document,
        to: DocumentStatus,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if !doc.status().can_transition(to) {
            return Err(DomainError::validation(format!(
                "cannot move {} {} from {} to {}",
                doc.kind(),
                doc.number(),
                doc.status(),
                to
            )));
        }
        // Reservation happens at readiness, not at draft, so drafts never
        // lock stock prematurely.
        if matches!(to, DocumentStatus::Waiting | DocumentStatus::Ready) {
            self.reserve_outbound(doc)?;
        }
        doc.set_status(to, now);
        Ok(())
    }

    fn reserve_outbound(&self, doc: &mut Document) -> DomainResult<()> {
        if doc.is_reserved() {
            return Ok(());
        }
        let demand = doc.outbound_demand();
        if demand.is_empty() {
            return Ok(());
        }
        let mut held: Vec<(StockKey, Decimal)> = Vec::with_capacity(demand.len());
        for (product_id, quantity) in demand {
            let label = self
                .catalog
                .product(product_id)
                .map(|p| p.name().to_string())
                .unwrap_or_else(|| product_id.to_string());
            let key = StockKey::new(product_id, doc.warehouse_id());
            match self.stock.reserve(key, quantity, &label) {
                Ok(()) => held.push((key, quantity)),
                Err(err) => {
                    // Roll back the holds taken so far; the transition fails
                    // as a whole.
                    for (k, q) in held {
                        if let Err(release_err) = self.stock.release(k, q) {
                            tracing::error!(
                                error = %release_err,
                                "failed to roll back reservation"
                            );
                        }
                    }
                    return Err(err);
                }
            }
        }
        doc.set_reserved(true);
        Ok(())
    }

    fn release_outbound(&self, doc: &mut Document) {
        if !doc.is_reserved() {
            return;
        }
        for (product_id, quantity) in doc.outbound_demand() {
            let key = StockKey::new(product_id, doc.warehouse_id());
            if let Err(err) = self.stock.release(key, quantity) {
                tracing::error!(error = %err, "failed to release reservation");
            }
        }
        doc.set_reserved(false);
    }

    // ----- approval ---------------------------------------------------------

    pub fn approve(
        &self,
        id: DocumentId,
        actor: &Actor,
        notes: &str,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<ValidationOutcome> {
        let mut docs = self.docs_write()?;
        let doc = docs.get_mut(&id).ok_or(DomainError::NotFound)?;
        if doc.is_approved() {
            return Ok(ValidationOutcome::fail("document is already approved"));
        }
        if doc.status().is_terminal() {
            return Ok(ValidationOutcome::fail(
                "terminal documents cannot be approved",
            ));
        }
        if !actor.can_approve() {
            return Ok(ValidationOutcome::fail(
                "you are not allowed to approve this document",
            ));
        }
        doc.record_approval(actor.user_id, occurred_at);
        if !notes.is_empty() {
            let merged = if doc.notes().is_empty() {
                format!("Approval note: {notes}")
            } else {
                format!("{}\nApproval note: {notes}", doc.notes())
            };
            doc.set_notes(merged, occurred_at);
        }
        Ok(ValidationOutcome::ok("document approved successfully"))
    }

    // ----- validation (the commit path) -------------------------------------

    /// Validate a document: run its kind's line checks, commit its postings
    /// atomically, transition to done. Exactly-once: a done document fails
    /// with a structured outcome, never a second commit.
    pub fn validate_document(
        &self,
        id: DocumentId,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<ValidationOutcome> {
        let mut docs = self.docs_write()?;
        self.validate_locked(&mut docs, id, actor, occurred_at)
    }

    fn validate_locked(
        &self,
        docs: &mut HashMap<DocumentId, Document>,
        id: DocumentId,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<ValidationOutcome> {
        let doc = docs.get(&id).ok_or(DomainError::NotFound)?;
        let kind = doc.kind();

        match doc.status() {
            DocumentStatus::Done => {
                return Ok(ValidationOutcome::fail(format!(
                    "{} {} is already completed",
                    kind.label(),
                    doc.number()
                )));
            }
            DocumentStatus::Canceled => {
                return Ok(ValidationOutcome::fail(
                    "canceled documents cannot be validated",
                ));
            }
            _ => {}
        }

        if doc.requires_approval() && !doc.is_approved() {
            return Ok(ValidationOutcome::fail(format!(
                "{} requires approval before completion",
                kind.label()
            )));
        }

        let ctx = CommitContext {
            catalog: &self.catalog,
            stock: &self.stock,
            actor,
            occurred_at,
        };
        let strategy = strategy_for(kind);

        if let Err(err) = strategy.validate_lines(doc, &ctx) {
            return self.business_failure(doc.number(), err);
        }

        if kind == DocumentKind::CycleCount {
            return self.complete_cycle_count(docs, id, actor, occurred_at);
        }

        let postings = match strategy.postings(doc, &ctx) {
            Ok(postings) => postings,
            Err(err) => return self.business_failure(doc.number(), err),
        };

        let entries = match self.stock.commit(&postings, occurred_at) {
            Ok(entries) => entries,
            Err(err) => return self.business_failure(doc.number(), err),
        };

        let doc = docs
            .get_mut(&id)
            .ok_or_else(|| DomainError::invariant("document vanished during validation"))?;
        doc.complete(occurred_at);

        self.publish_entries(&entries);
        self.publish_operations_event(
            DOCUMENT_SUBJECT,
            *doc.id().as_uuid(),
            doc.warehouse_id(),
            OperationsEvent::DocumentCompleted(DocumentCompleted {
                document_number: doc.number().to_string(),
                kind,
                warehouse_id: doc.warehouse_id(),
                occurred_at,
            }),
        );
        tracing::info!(
            kind = %kind,
            number = %doc.number(),
            entries = entries.len(),
            "document validated"
        );

        Ok(ValidationOutcome::ok(format!(
            "{} completed successfully",
            kind.label()
        )))
    }

    /// Cycle count completion: compute variances, generate a `set`
    /// adjustment for the differing lines and push it through the standard
    /// validate path — stock mutation has exactly one code path.
    fn complete_cycle_count(
        &self,
        docs: &mut HashMap<DocumentId, Document>,
        id: DocumentId,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<ValidationOutcome> {
        let task = docs.get(&id).ok_or(DomainError::NotFound)?;
        let task_number = task.number().to_string();
        let warehouse_id = task.warehouse_id();
        let created_by = task.created_by();
        let DocumentBody::CycleCount(details) = task.body() else {
            return Err(DomainError::invariant("cycle count body mismatch"));
        };

        let variance_lines: Vec<CycleCountLine> = details
            .lines
            .iter()
            .filter(|l| !l.variance().is_zero())
            .cloned()
            .collect();

        if variance_lines.is_empty() {
            let task = docs
                .get_mut(&id)
                .ok_or_else(|| DomainError::invariant("document vanished during validation"))?;
            task.complete(occurred_at);
            self.publish_operations_event(
                DOCUMENT_SUBJECT,
                *task.id().as_uuid(),
                warehouse_id,
                OperationsEvent::CycleCountCompleted(CycleCountCompleted {
                    document_number: task_number,
                    warehouse_id,
                    generated_adjustment: None,
                    variance_lines: Vec::new(),
                    occurred_at,
                }),
            );
            return Ok(ValidationOutcome::ok(
                "Cycle count completed. No stock differences found.",
            ));
        }

        let mut adjustment_lines = Vec::with_capacity(variance_lines.len());
        for line in &variance_lines {
            let current = self.stock.level(line.product_id, warehouse_id)?.quantity;
            adjustment_lines.push(AdjustmentLine {
                product_id: line.product_id,
                current_quantity: current,
                adjustment_quantity: line.counted_quantity,
                reason: format!("Cycle count variance ({})", line.variance()),
            });
        }

        // The derived adjustment skips approval policies: the count itself
        // already passed its gate.
        let number = self.numbers.next(DocumentKind::Adjustment);
        let adjustment = Document::new(
            DocumentId::new(),
            number.clone(),
            warehouse_id,
            created_by,
            String::new(),
            false,
            DocumentBody::Adjustment(AdjustmentDetails {
                reason: format!("Cycle count {task_number}"),
                adjustment_type: AdjustmentType::Set,
                force: false,
                lines: adjustment_lines,
            }),
            occurred_at,
        );
        let adjustment_id = *adjustment.id();
        docs.insert(adjustment_id, adjustment);

        let outcome = self.validate_locked(docs, adjustment_id, actor, occurred_at)?;
        if !outcome.success {
            // The adjustment stays behind in draft for inspection.
            return Ok(ValidationOutcome::fail(format!(
                "cycle count adjustment failed: {}",
                outcome.message
            )));
        }

        let task = docs
            .get_mut(&id)
            .ok_or_else(|| DomainError::invariant("document vanished during validation"))?;
        if let DocumentBody::CycleCount(details) = task.body_mut() {
            details.generated_adjustment = Some(number.clone());
        }
        task.complete(occurred_at);

        self.publish_operations_event(
            DOCUMENT_SUBJECT,
            *task.id().as_uuid(),
            warehouse_id,
            OperationsEvent::CycleCountCompleted(CycleCountCompleted {
                document_number: task_number,
                warehouse_id,
                generated_adjustment: Some(number),
                variance_lines: variance_lines
                    .iter()
                    .map(|l| VarianceLine {
                        product_id: l.product_id,
                        expected_quantity: l.expected_quantity,
                        counted_quantity: l.counted_quantity,
                        variance: l.variance(),
                    })
                    .collect(),
                occurred_at,
            }),
        );

        Ok(ValidationOutcome::ok("Cycle count completed successfully"))
    }

    /// Map a domain error from the validate path into a structured outcome,
    /// letting only invariant violations escape as hard failures.
    fn business_failure(
        &self,
        document_number: &str,
        err: DomainError,
    ) -> DomainResult<ValidationOutcome> {
        match err {
            DomainError::InvariantViolation(_) => {
                tracing::error!(document = document_number, error = %err, "invariant violation during validation");
                Err(err)
            }
            other => {
                tracing::warn!(document = document_number, error = %other, "validation failed");
                Ok(ValidationOutcome::fail(other.to_string()))
            }
        }
    }

    // ----- cancellation -----------------------------------------------------

    /// Cancel from draft/waiting/ready: releases any held reservation and
    /// never writes the ledger. Terminal.
    pub fn cancel_document(
        &self,
        id: DocumentId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Document> {
        let mut docs = self.docs_write()?;
        let doc = docs.get_mut(&id).ok_or(DomainError::NotFound)?;
        if !doc.status().can_cancel() {
            return Err(DomainError::validation(format!(
                "cannot cancel a {} document",
                doc.status()
            )));
        }
        self.release_outbound(doc);
        doc.set_status(DocumentStatus::Canceled, occurred_at);
        self.publish_operations_event(
            DOCUMENT_SUBJECT,
            *doc.id().as_uuid(),
            doc.warehouse_id(),
            OperationsEvent::DocumentCanceled(DocumentCanceled {
                document_number: doc.number().to_string(),
                kind: doc.kind(),
                warehouse_id: doc.warehouse_id(),
                occurred_at,
            }),
        );
        tracing::info!(kind = %doc.kind(), number = %doc.number(), "document canceled");
        Ok(doc.clone())
    }

    // ----- reads ------------------------------------------------------------

    pub fn document(&self, id: DocumentId) -> Option<Document> {
        self.documents.read().ok()?.get(&id).cloned()
    }

    pub fn documents_of_kind(&self, kind: DocumentKind) -> Vec<Document> {
        self.documents
            .read()
            .map(|docs| {
                docs.values()
                    .filter(|d| d.kind() == kind)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Current quantity / reserved / available for one account.
    pub fn stock_by_warehouse(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> DomainResult<StockLevel> {
        self.stock.level(product_id, warehouse_id)
    }

    /// Paginated immutable ledger entries, newest first.
    pub fn ledger(
        &self,
        filter: &LedgerFilter,
        page: Page,
    ) -> DomainResult<PageOf<StockLedgerEntry>> {
        self.stock.entries(filter, page)
    }

    // ----- pick waves -------------------------------------------------------

    /// Batch ready deliveries matching the filter into a new wave.
    pub fn generate_wave(
        &self,
        filter: WaveFilter,
        created_by: UserId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<WaveGeneration> {
        let docs = self.docs_read()?;
        let selected: Vec<&Document> = docs
            .values()
            .filter(|d| d.kind() == DocumentKind::Delivery && d.status() == DocumentStatus::Ready)
            .filter(|d| filter.warehouse_id.is_none_or(|w| d.warehouse_id() == w))
            .filter(|d| filter.date_from.is_none_or(|t| d.created_at() >= t))
            .filter(|d| filter.date_to.is_none_or(|t| d.created_at() <= t))
            .filter(|d| {
                filter
                    .document_ids
                    .as_ref()
                    .is_none_or(|ids| ids.contains(d.id()))
            })
            .collect();

        if selected.is_empty() {
            return Ok(WaveGeneration::fail("No matching delivery orders found"));
        }

        let mut warehouses: Vec<WarehouseId> =
            selected.iter().map(|d| d.warehouse_id()).collect();
        warehouses.sort_by_key(|w| *w.as_uuid().as_bytes());
        warehouses.dedup();
        if warehouses.len() > 1 {
            return Ok(WaveGeneration::fail(
                "Pick waves cannot span multiple warehouses; filter by a single warehouse",
            ));
        }
        let warehouse_id = warehouses[0];

        let name = filter
            .name
            .unwrap_or_else(|| format!("Wave {}", occurred_at.format("%Y-%m-%d %H:%M")));
        let wave = PickWave::new(
            WaveId::new(),
            name,
            warehouse_id,
            selected.iter().map(|d| *d.id()).collect(),
            created_by,
            occurred_at,
        );
        drop(docs);

        let mut waves = self.waves_write()?;
        waves.insert(*wave.id(), wave.clone());
        self.publish_operations_event(
            PICK_WAVE_SUBJECT,
            *wave.id().as_uuid(),
            warehouse_id,
            OperationsEvent::WaveGenerated(WaveGenerated {
                wave_name: wave.name().to_string(),
                warehouse_id,
                delivery_count: wave.delivery_ids().len(),
                occurred_at,
            }),
        );
        tracing::info!(wave = %wave.name(), deliveries = wave.delivery_ids().len(), "pick wave generated");
        Ok(WaveGeneration::ok("Pick wave generated", wave))
    }

    pub fn pick_wave(&self, id: WaveId) -> Option<PickWave> {
        self.waves.read().ok()?.get(&id).cloned()
    }

    /// Consolidated, bin-sorted pick list for a wave.
    pub fn pick_list(&self, wave_id: WaveId) -> DomainResult<Vec<PickListRow>> {
        let waves = self.waves_read()?;
        let wave = waves.get(&wave_id).ok_or(DomainError::NotFound)?;
        let docs = self.docs_read()?;
        let members: Vec<&Document> = wave
            .delivery_ids()
            .iter()
            .filter_map(|id| docs.get(id))
            .collect();
        Ok(consolidate(&members, &self.catalog))
    }

    pub fn assign_picker(
        &self,
        wave_id: WaveId,
        picker: UserId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<PickWave> {
        let mut waves = self.waves_write()?;
        let wave = waves.get_mut(&wave_id).ok_or(DomainError::NotFound)?;
        if wave.status().is_terminal() {
            return Err(DomainError::validation(
                "cannot assign a picker to a terminal wave",
            ));
        }
        wave.assign_picker(picker, occurred_at);
        Ok(wave.clone())
    }

    pub fn start_picking(
        &self,
        wave_id: WaveId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<ValidationOutcome> {
        self.wave_transition(
            wave_id,
            WaveStatus::Picking,
            occurred_at,
            "Wave must be in planned status to start picking",
            "Picking started successfully",
        )
    }

    pub fn complete_picking(
        &self,
        wave_id: WaveId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<ValidationOutcome> {
        self.wave_transition(
            wave_id,
            WaveStatus::Completed,
            occurred_at,
            "Wave must be in picking status to complete",
            "Picking completed successfully",
        )
    }

    pub fn cancel_wave(
        &self,
        wave_id: WaveId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<ValidationOutcome> {
        self.wave_transition(
            wave_id,
            WaveStatus::Canceled,
            occurred_at,
            "Completed waves cannot be canceled",
            "Wave canceled",
        )
    }

    fn wave_transition(
        &self,
        wave_id: WaveId,
        to: WaveStatus,
        occurred_at: DateTime<Utc>,
        fail_message: &str,
        ok_message: &str,
    ) -> DomainResult<ValidationOutcome> {
        let mut waves = self.waves_write()?;
        let wave = waves.get_mut(&wave_id).ok_or(DomainError::NotFound)?;
        if !wave.status().can_transition(to) {
            return Ok(ValidationOutcome::fail(fail_message));
        }
        wave.set_status(to, occurred_at);
        Ok(ValidationOutcome::ok(ok_message))
    }

    // ----- internals --------------------------------------------------------

    fn insert_document(
        &self,
        body: DocumentBody,
        warehouse_id: WarehouseId,
        notes: String,
        requested_status: DocumentStatus,
        actor: UserId,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Document> {
        let warehouse = self
            .catalog
            .warehouse(warehouse_id)
            .ok_or_else(|| DomainError::validation("unknown warehouse"))?;
        if !warehouse.is_active() {
            return Err(DomainError::validation(format!(
                "warehouse {} is not active",
                warehouse.code()
            )));
        }
        if !matches!(
            requested_status,
            DocumentStatus::Draft | DocumentStatus::Waiting | DocumentStatus::Ready
        ) {
            return Err(DomainError::validation(
                "documents can only be created as draft, waiting or ready",
            ));
        }

        let kind = body.kind();
        let requires_approval =
            self.policies
                .requires_approval(kind, warehouse_id, body.total_quantity());
        let number = self.numbers.next(kind);
        let mut doc = Document::new(
            DocumentId::new(),
            number,
            warehouse_id,
            actor,
            notes,
            requires_approval,
            body,
            occurred_at,
        );
        if requested_status != DocumentStatus::Draft {
            self.advance(&mut doc, requested_status, occurred_at)?;
        }

        let mut docs = self.docs_write()?;
        docs.insert(*doc.id(), doc.clone());
        tracing::info!(
            kind = %kind,
            number = %doc.number(),
            status = %doc.status(),
            "document created"
        );
        Ok(doc)
    }

    fn require_known_product(
        &self,
        product_id: ProductId,
    ) -> DomainResult<stockmaster_products::Product> {
        self.catalog
            .product(product_id)
            .ok_or_else(|| DomainError::validation(format!("unknown product {product_id}")))
    }

    fn build_receipt_lines(
        &self,
        drafts: Vec<ReceiptLineDraft>,
    ) -> DomainResult<Vec<ReceiptLine>> {
        drafts
            .into_iter()
            .map(|d| {
                let product = self.require_known_product(d.product_id)?;
                if d.quantity_ordered < Decimal::ZERO || d.quantity_received < Decimal::ZERO {
                    return Err(DomainError::validation(
                        "receipt quantities cannot be negative",
                    ));
                }
                Ok(ReceiptLine {
                    product_id: d.product_id,
                    bin_id: d.bin_id,
                    quantity_ordered: product.stock_quantity(d.quantity_ordered, d.unit),
                    quantity_received: product.stock_quantity(d.quantity_received, d.unit),
                    unit_price: d.unit_price,
                })
            })
            .collect()
    }

    fn build_delivery_lines(
        &self,
        drafts: Vec<DeliveryLineDraft>,
    ) -> DomainResult<Vec<DeliveryLine>> {
        drafts
            .into_iter()
            .map(|d| {
                let product = self.require_known_product(d.product_id)?;
                if d.quantity <= Decimal::ZERO {
                    return Err(DomainError::validation(format!(
                        "quantity for {} must be positive",
                        product.sku()
                    )));
                }
                Ok(DeliveryLine {
                    product_id: d.product_id,
                    bin_id: d.bin_id,
                    quantity: product.stock_quantity(d.quantity, d.unit),
                })
            })
            .collect()
    }

    fn build_transfer_lines(
        &self,
        drafts: Vec<TransferLineDraft>,
    ) -> DomainResult<Vec<TransferLine>> {
        drafts
            .into_iter()
            .map(|d| {
                let product = self.require_known_product(d.product_id)?;
                if d.quantity <= Decimal::ZERO {
                    return Err(DomainError::validation(format!(
                        "quantity for {} must be positive",
                        product.sku()
                    )));
                }
                Ok(TransferLine {
                    product_id: d.product_id,
                    bin_id: d.bin_id,
                    quantity: product.stock_quantity(d.quantity, d.unit),
                })
            })
            .collect()
    }

    fn build_adjustment_lines(
        &self,
        warehouse_id: WarehouseId,
        force: bool,
        drafts: Vec<AdjustmentLineDraft>,
    ) -> DomainResult<Vec<AdjustmentLine>> {
        drafts
            .into_iter()
            .map(|d| {
                self.require_known_product(d.product_id)?;
                if d.adjustment_quantity < Decimal::ZERO && !force {
                    return Err(DomainError::validation(
                        "adjustment quantity cannot be negative",
                    ));
                }
                let current = self.stock.level(d.product_id, warehouse_id)?.quantity;
                Ok(AdjustmentLine {
                    product_id: d.product_id,
                    current_quantity: current,
                    adjustment_quantity: d.adjustment_quantity,
                    reason: d.reason,
                })
            })
            .collect()
    }

    fn build_return_lines(&self, drafts: Vec<ReturnLineDraft>) -> DomainResult<Vec<ReturnLine>> {
        drafts
            .into_iter()
            .map(|d| {
                let product = self.require_known_product(d.product_id)?;
                if d.quantity <= Decimal::ZERO {
                    return Err(DomainError::validation(format!(
                        "quantity for {} must be positive",
                        product.sku()
                    )));
                }
                Ok(ReturnLine {
                    product_id: d.product_id,
                    quantity: d.quantity,
                    reason_code: d.reason_code,
                })
            })
            .collect()
    }

    fn build_cycle_count_lines(
        &self,
        warehouse_id: WarehouseId,
        drafts: Vec<CycleCountLineDraft>,
    ) -> DomainResult<Vec<CycleCountLine>> {
        drafts
            .into_iter()
            .map(|d| {
                self.require_known_product(d.product_id)?;
                let expected = match d.expected_quantity {
                    Some(expected) => {
                        if expected < Decimal::ZERO {
                            return Err(DomainError::validation(
                                "expected quantity cannot be negative",
                            ));
                        }
                        expected
                    }
                    None => self.stock.level(d.product_id, warehouse_id)?.quantity,
                };
                Ok(CycleCountLine {
                    product_id: d.product_id,
                    expected_quantity: expected,
                    counted_quantity: Decimal::ZERO,
                })
            })
            .collect()
    }

    // ----- event publication ------------------------------------------------

    fn publish_envelope(&self, envelope: EventEnvelope<JsonValue>) {
        if let Err(err) = self.bus.publish(envelope) {
            // The ledger already holds the facts; distribution is best-effort.
            tracing::warn!(error = ?err, "event publication failed");
        }
    }

    fn publish_entries(&self, entries: &[StockLedgerEntry]) {
        for entry in entries {
            match StockEvent::envelope(entry) {
                Ok(envelope) => self.publish_envelope(envelope),
                Err(err) => tracing::error!(error = %err, "failed to build stock event envelope"),
            }
        }
    }

    fn publish_operations_event(
        &self,
        subject_type: &str,
        subject_id: Uuid,
        warehouse_id: WarehouseId,
        event: OperationsEvent,
    ) {
        let sequence = self.publish_seq.fetch_add(1, Ordering::Relaxed) + 1;
        match serde_json::to_value(&event) {
            Ok(payload) => self.publish_envelope(EventEnvelope::new(
                Uuid::now_v7(),
                warehouse_id,
                subject_type,
                subject_id,
                sequence,
                payload,
            )),
            Err(err) => tracing::error!(error = %err, "failed to serialize operations event"),
        }
    }

    fn docs_write(
        &self,
    ) -> DomainResult<RwLockWriteGuard<'_, HashMap<DocumentId, Document>>> {
        self.documents
            .write()
            .map_err(|_| DomainError::invariant("document store lock poisoned"))
    }

    fn docs_read(&self) -> DomainResult<RwLockReadGuard<'_, HashMap<DocumentId, Document>>> {
        self.documents
            .read()
            .map_err(|_| DomainError::invariant("document store lock poisoned"))
    }

    fn waves_write(&self) -> DomainResult<RwLockWriteGuard<'_, HashMap<WaveId, PickWave>>> {
        self.waves
            .write()
            .map_err(|_| DomainError::invariant("pick wave store lock poisoned"))
    }

    fn waves_read(&self) -> DomainResult<RwLockReadGuard<'_, HashMap<WaveId, PickWave>>> {
        self.waves
            .read()
            .map_err(|_| DomainError::invariant("pick wave store lock poisoned"))
    }
}
