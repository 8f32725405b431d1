//! Operational documents: the state machine and commit engine every stock
//! mutation passes through.
//!
//! Six document kinds (receipt, delivery, transfer, adjustment, return,
//! cycle count) share one status lifecycle and one validation path; what
//! differs per kind is captured by a small commit capability
//! ([`strategy::CommitStrategy`]). Pick waves batch ready deliveries for
//! consolidated picking and never touch the ledger themselves.

pub mod approval;
pub mod document;
pub mod engine;
pub mod events;
pub mod numbering;
pub mod pick_wave;
pub mod status;
pub mod strategy;

pub use approval::{Actor, ApprovalPolicies, ApprovalPolicy, Role};
pub use document::{
    AdjustmentDetails, AdjustmentDraft, AdjustmentLine, AdjustmentLineDraft, AdjustmentType,
    CountMethod, CycleCountDetails, CycleCountDraft, CycleCountLine, CycleCountLineDraft,
    DeliveryDetails, DeliveryDraft, DeliveryLine, DeliveryLineDraft, Disposition, Document,
    DocumentBody, DocumentKind, LineDrafts, ReceiptDetails, ReceiptDraft, ReceiptLine,
    ReceiptLineDraft, ReturnDetails, ReturnDraft, ReturnLine, ReturnLineDraft, TransferDetails,
    TransferDraft, TransferLine, TransferLineDraft,
};
pub use engine::{DocumentEngine, ValidationOutcome, WaveGeneration};
pub use events::{DOCUMENT_SUBJECT, OperationsEvent, PICK_WAVE_SUBJECT};
pub use numbering::DocumentNumbers;
pub use pick_wave::{PickListRow, PickWave, WaveFilter, consolidate};
pub use status::{DocumentStatus, WaveStatus};
pub use strategy::{CommitContext, CommitStrategy, strategy_for};
