use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockmaster_core::{ProductId, WarehouseId};

use stockmaster_events::Event;

use crate::document::DocumentKind;

/// Envelope subject type for document lifecycle events.
pub const DOCUMENT_SUBJECT: &str = "operations.document";

/// Envelope subject type for pick wave lifecycle events.
pub const PICK_WAVE_SUBJECT: &str = "operations.pick_wave";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentCompleted {
    pub document_number: String,
    pub kind: DocumentKind,
    pub warehouse_id: WarehouseId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentCanceled {
    pub document_number: String,
    pub kind: DocumentKind,
    pub warehouse_id: WarehouseId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VarianceLine {
    pub product_id: ProductId,
    pub expected_quantity: Decimal,
    pub counted_quantity: Decimal,
    pub variance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleCountCompleted {
    pub document_number: String,
    pub warehouse_id: WarehouseId,
    /// Document number of the generated adjustment, when stock differed.
    pub generated_adjustment: Option<String>,
    pub variance_lines: Vec<VarianceLine>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveGenerated {
    pub wave_name: String,
    pub warehouse_id: WarehouseId,
    pub delivery_count: usize,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationsEvent {
    DocumentCompleted(DocumentCompleted),
    DocumentCanceled(DocumentCanceled),
    CycleCountCompleted(CycleCountCompleted),
    WaveGenerated(WaveGenerated),
}

impl Event for OperationsEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OperationsEvent::DocumentCompleted(_) => "operations.document.completed",
            OperationsEvent::DocumentCanceled(_) => "operations.document.canceled",
            OperationsEvent::CycleCountCompleted(_) => "operations.cycle_count.completed",
            OperationsEvent::WaveGenerated(_) => "operations.pick_wave.generated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OperationsEvent::DocumentCompleted(e) => e.occurred_at,
            OperationsEvent::DocumentCanceled(e) => e.occurred_at,
            OperationsEvent::CycleCountCompleted(e) => e.occurred_at,
            OperationsEvent::WaveGenerated(e) => e.occurred_at,
        }
    }
}
