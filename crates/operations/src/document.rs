use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockmaster_core::{BinId, DocumentId, Entity, ProductId, UnitOfMeasure, UserId, WarehouseId};

use crate::status::DocumentStatus;

/// The six operational document kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Receipt,
    Delivery,
    Transfer,
    Adjustment,
    Return,
    CycleCount,
}

impl DocumentKind {
    /// Document-number prefix.
    pub fn prefix(self) -> &'static str {
        match self {
            DocumentKind::Receipt => "REC",
            DocumentKind::Delivery => "DEL",
            DocumentKind::Transfer => "TRF",
            DocumentKind::Adjustment => "ADJ",
            DocumentKind::Return => "RET",
            DocumentKind::CycleCount => "CC",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DocumentKind::Receipt => "Receipt",
            DocumentKind::Delivery => "Delivery",
            DocumentKind::Transfer => "Transfer",
            DocumentKind::Adjustment => "Adjustment",
            DocumentKind::Return => "Return",
            DocumentKind::CycleCount => "Cycle count",
        }
    }
}

impl core::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            DocumentKind::Receipt => "receipt",
            DocumentKind::Delivery => "delivery",
            DocumentKind::Transfer => "transfer",
            DocumentKind::Adjustment => "adjustment",
            DocumentKind::Return => "return",
            DocumentKind::CycleCount => "cycle_count",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentType {
    Increase,
    Decrease,
    Set,
}

/// What happens to returned goods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Restock,
    Scrap,
    Repair,
}

impl core::fmt::Display for Disposition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Disposition::Restock => "restock",
            Disposition::Scrap => "scrap",
            Disposition::Repair => "repair",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountMethod {
    Full,
    Partial,
    Abc,
}

// Stored line items. All quantities are in stock units — conversion from
// purchase units happened once, when the draft was accepted.

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    pub product_id: ProductId,
    pub bin_id: Option<BinId>,
    pub quantity_ordered: Decimal,
    pub quantity_received: Decimal,
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryLine {
    pub product_id: ProductId,
    pub bin_id: Option<BinId>,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferLine {
    pub product_id: ProductId,
    /// Destination bin in the target warehouse.
    pub bin_id: Option<BinId>,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentLine {
    pub product_id: ProductId,
    /// On-hand quantity snapshotted when the line was drafted (traceability
    /// for `set` adjustments; the committed delta is computed against the
    /// live balance).
    pub current_quantity: Decimal,
    pub adjustment_quantity: Decimal,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnLine {
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub reason_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleCountLine {
    pub product_id: ProductId,
    pub expected_quantity: Decimal,
    pub counted_quantity: Decimal,
}

impl CycleCountLine {
    pub fn variance(&self) -> Decimal {
        self.counted_quantity - self.expected_quantity
    }
}

// Kind-specific document bodies.

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptDetails {
    pub supplier: String,
    pub supplier_reference: String,
    pub lines: Vec<ReceiptLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryDetails {
    pub customer: String,
    pub customer_reference: String,
    pub shipping_address: String,
    pub lines: Vec<DeliveryLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferDetails {
    pub to_warehouse_id: WarehouseId,
    pub lines: Vec<TransferLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentDetails {
    pub reason: String,
    pub adjustment_type: AdjustmentType,
    /// Administrative override: allow the adjustment to force any value,
    /// including below zero.
    pub force: bool,
    pub lines: Vec<AdjustmentLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnDetails {
    /// Document number of the originating delivery, when known.
    pub delivery_number: Option<String>,
    pub reason: String,
    pub disposition: Disposition,
    pub lines: Vec<ReturnLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleCountDetails {
    pub scheduled_date: Option<NaiveDate>,
    pub method: CountMethod,
    /// Document number of the adjustment generated on completion.
    pub generated_adjustment: Option<String>,
    pub lines: Vec<CycleCountLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentBody {
    Receipt(ReceiptDetails),
    Delivery(DeliveryDetails),
    Transfer(TransferDetails),
    Adjustment(AdjustmentDetails),
    Return(ReturnDetails),
    CycleCount(CycleCountDetails),
}

impl DocumentBody {
    pub fn kind(&self) -> DocumentKind {
        match self {
            DocumentBody::Receipt(_) => DocumentKind::Receipt,
            DocumentBody::Delivery(_) => DocumentKind::Delivery,
            DocumentBody::Transfer(_) => DocumentKind::Transfer,
            DocumentBody::Adjustment(_) => DocumentKind::Adjustment,
            DocumentBody::Return(_) => DocumentKind::Return,
            DocumentBody::CycleCount(_) => DocumentKind::CycleCount,
        }
    }

    pub fn line_count(&self) -> usize {
        match self {
            DocumentBody::Receipt(d) => d.lines.len(),
            DocumentBody::Delivery(d) => d.lines.len(),
            DocumentBody::Transfer(d) => d.lines.len(),
            DocumentBody::Adjustment(d) => d.lines.len(),
            DocumentBody::Return(d) => d.lines.len(),
            DocumentBody::CycleCount(d) => d.lines.len(),
        }
    }

    /// Total line quantity, used by approval thresholds. Cycle counts weigh
    /// in with their absolute variance (the part that would move stock).
    pub fn total_quantity(&self) -> Decimal {
        match self {
            DocumentBody::Receipt(d) => d.lines.iter().map(|l| l.quantity_received).sum(),
            DocumentBody::Delivery(d) => d.lines.iter().map(|l| l.quantity).sum(),
            DocumentBody::Transfer(d) => d.lines.iter().map(|l| l.quantity).sum(),
            DocumentBody::Adjustment(d) => d.lines.iter().map(|l| l.adjustment_quantity).sum(),
            DocumentBody::Return(d) => d.lines.iter().map(|l| l.quantity).sum(),
            DocumentBody::CycleCount(d) => d.lines.iter().map(|l| l.variance().abs()).sum(),
        }
    }
}

/// One operational document.
///
/// Construction and every mutation go through the engine; other crates get
/// read access only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    id: DocumentId,
    number: String,
    status: DocumentStatus,
    warehouse_id: WarehouseId,
    created_by: UserId,
    notes: String,
    requires_approval: bool,
    approved_by: Option<UserId>,
    approved_at: Option<DateTime<Utc>>,
    /// Outbound demand is currently held against available stock.
    reserved: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    body: DocumentBody,
}

impl Document {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: DocumentId,
        number: String,
        warehouse_id: WarehouseId,
        created_by: UserId,
        notes: String,
        requires_approval: bool,
        body: DocumentBody,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            number,
            status: DocumentStatus::Draft,
            warehouse_id,
            created_by,
            notes,
            requires_approval,
            approved_by: None,
            approved_at: None,
            reserved: false,
            created_at,
            updated_at: created_at,
            completed_at: None,
            body,
        }
    }

    pub fn number(&self) -> &str {
        &self.number
    }

    pub fn status(&self) -> DocumentStatus {
        self.status
    }

    pub fn kind(&self) -> DocumentKind {
        self.body.kind()
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn created_by(&self) -> UserId {
        self.created_by
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn requires_approval(&self) -> bool {
        self.requires_approval
    }

    pub fn is_approved(&self) -> bool {
        self.approved_by.is_some() && self.approved_at.is_some()
    }

    pub fn approved_by(&self) -> Option<UserId> {
        self.approved_by
    }

    pub fn is_reserved(&self) -> bool {
        self.reserved
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn body(&self) -> &DocumentBody {
        &self.body
    }

    /// Stock this document would take from its source warehouse, per line.
    /// Empty for inbound and neutral kinds.
    pub fn outbound_demand(&self) -> Vec<(ProductId, Decimal)> {
        match &self.body {
            DocumentBody::Delivery(d) => {
                d.lines.iter().map(|l| (l.product_id, l.quantity)).collect()
            }
            DocumentBody::Transfer(d) => {
                d.lines.iter().map(|l| (l.product_id, l.quantity)).collect()
            }
            _ => Vec::new(),
        }
    }

    pub(crate) fn set_status(&mut self, to: DocumentStatus, now: DateTime<Utc>) {
        self.status = to;
        self.updated_at = now;
    }

    pub(crate) fn complete(&mut self, now: DateTime<Utc>) {
        self.status = DocumentStatus::Done;
        self.completed_at = Some(now);
        self.reserved = false;
        self.updated_at = now;
    }

    pub(crate) fn record_approval(&mut self, approver: UserId, at: DateTime<Utc>) {
        self.approved_by = Some(approver);
        self.approved_at = Some(at);
        self.updated_at = at;
    }

    pub(crate) fn set_reserved(&mut self, reserved: bool) {
        self.reserved = reserved;
    }

    pub(crate) fn set_notes(&mut self, notes: String, now: DateTime<Utc>) {
        self.notes = notes;
        self.updated_at = now;
    }

    pub(crate) fn body_mut(&mut self) -> &mut DocumentBody {
        &mut self.body
    }

    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }
}

impl Entity for Document {
    type Id = DocumentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

// Draft inputs. Quantities may be expressed in stock or purchase units
// (where the original line models carried a unit column); the engine
// converts them exactly once while building the stored lines.

#[derive(Debug, Clone)]
pub struct ReceiptDraft {
    pub warehouse_id: WarehouseId,
    pub supplier: String,
    pub supplier_reference: String,
    pub notes: String,
    pub requested_status: DocumentStatus,
    pub lines: Vec<ReceiptLineDraft>,
}

#[derive(Debug, Clone)]
pub struct ReceiptLineDraft {
    pub product_id: ProductId,
    pub bin_id: Option<BinId>,
    pub quantity_ordered: Decimal,
    pub quantity_received: Decimal,
    pub unit: UnitOfMeasure,
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Clone)]
pub struct DeliveryDraft {
    pub warehouse_id: WarehouseId,
    pub customer: String,
    pub customer_reference: String,
    pub shipping_address: String,
    pub notes: String,
    pub requested_status: DocumentStatus,
    pub lines: Vec<DeliveryLineDraft>,
}

#[derive(Debug, Clone)]
pub struct DeliveryLineDraft {
    pub product_id: ProductId,
    pub bin_id: Option<BinId>,
    pub quantity: Decimal,
    pub unit: UnitOfMeasure,
}

#[derive(Debug, Clone)]
pub struct TransferDraft {
    pub warehouse_id: WarehouseId,
    pub to_warehouse_id: WarehouseId,
    pub notes: String,
    pub requested_status: DocumentStatus,
    pub lines: Vec<TransferLineDraft>,
}

#[derive(Debug, Clone)]
pub struct TransferLineDraft {
    pub product_id: ProductId,
    pub bin_id: Option<BinId>,
    pub quantity: Decimal,
    pub unit: UnitOfMeasure,
}

#[derive(Debug, Clone)]
pub struct AdjustmentDraft {
    pub warehouse_id: WarehouseId,
    pub reason: String,
    pub adjustment_type: AdjustmentType,
    pub force: bool,
    pub notes: String,
    pub requested_status: DocumentStatus,
    pub lines: Vec<AdjustmentLineDraft>,
}

#[derive(Debug, Clone)]
pub struct AdjustmentLineDraft {
    pub product_id: ProductId,
    /// Stock units; adjustments are always entered in the counting unit.
    pub adjustment_quantity: Decimal,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct ReturnDraft {
    pub warehouse_id: WarehouseId,
    pub delivery_number: Option<String>,
    pub reason: String,
    pub disposition: Disposition,
    pub notes: String,
    pub requested_status: DocumentStatus,
    pub lines: Vec<ReturnLineDraft>,
}

#[derive(Debug, Clone)]
pub struct ReturnLineDraft {
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub reason_code: String,
}

#[derive(Debug, Clone)]
pub struct CycleCountDraft {
    pub warehouse_id: WarehouseId,
    pub scheduled_date: Option<NaiveDate>,
    pub method: CountMethod,
    pub notes: String,
    pub requested_status: DocumentStatus,
    pub lines: Vec<CycleCountLineDraft>,
}

#[derive(Debug, Clone)]
pub struct CycleCountLineDraft {
    pub product_id: ProductId,
    /// `None` snapshots the current on-hand quantity as the expectation.
    pub expected_quantity: Option<Decimal>,
}

/// Replacement lines for a draft document, per kind.
#[derive(Debug, Clone)]
pub enum LineDrafts {
    Receipt(Vec<ReceiptLineDraft>),
    Delivery(Vec<DeliveryLineDraft>),
    Transfer(Vec<TransferLineDraft>),
    Adjustment(Vec<AdjustmentLineDraft>),
    Return(Vec<ReturnLineDraft>),
    CycleCount(Vec<CycleCountLineDraft>),
}

impl LineDrafts {
    pub fn kind(&self) -> DocumentKind {
        match self {
            LineDrafts::Receipt(_) => DocumentKind::Receipt,
            LineDrafts::Delivery(_) => DocumentKind::Delivery,
            LineDrafts::Transfer(_) => DocumentKind::Transfer,
            LineDrafts::Adjustment(_) => DocumentKind::Adjustment,
            LineDrafts::Return(_) => DocumentKind::Return,
            LineDrafts::CycleCount(_) => DocumentKind::CycleCount,
        }
    }
}
