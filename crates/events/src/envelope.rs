use serde::{Deserialize, Serialize};
use uuid::Uuid;

use stockmaster_core::WarehouseId;

/// Envelope for a published event, carrying warehouse scope + subject
/// metadata.
///
/// Notes:
/// - **Warehouse scoping**: every envelope names the warehouse whose stock
///   it concerns; consumers use it to partition their read models.
/// - `subject_type`/`subject_id` identify what the event is about (a stock
///   account, a document, a pick wave).
/// - `sequence_number` is monotonically increasing per subject, so
///   consumers can drop duplicates and replays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    warehouse_id: WarehouseId,

    subject_type: String,
    subject_id: Uuid,

    /// Monotonically increasing position in the subject's stream.
    sequence_number: u64,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        warehouse_id: WarehouseId,
        subject_type: impl Into<String>,
        subject_id: Uuid,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            warehouse_id,
            subject_type: subject_type.into(),
            subject_id,
            sequence_number,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn subject_type(&self) -> &str {
        &self.subject_type
    }

    pub fn subject_id(&self) -> Uuid {
        self.subject_id
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}
