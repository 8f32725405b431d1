use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use stockmaster_core::{DomainError, DomainResult};
use stockmaster_events::{Event, EventEnvelope};

use crate::entry::StockLedgerEntry;

/// Envelope subject type for stock account streams.
pub const STOCK_SUBJECT: &str = "stock.account";

/// Event: a ledger entry was committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecorded {
    pub entry: StockLedgerEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockEvent {
    EntryRecorded(EntryRecorded),
}

impl Event for StockEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StockEvent::EntryRecorded(_) => "stock.ledger.entry_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StockEvent::EntryRecorded(e) => e.entry.created_at,
        }
    }
}

impl StockEvent {
    /// Wrap a committed entry for publication.
    ///
    /// The subject is the stock account: warehouse scope plus the product as
    /// subject id, with the entry's per-account sequence number — consumers
    /// use it to drop duplicates.
    pub fn envelope(entry: &StockLedgerEntry) -> DomainResult<EventEnvelope<JsonValue>> {
        let payload = serde_json::to_value(StockEvent::EntryRecorded(EntryRecorded {
            entry: entry.clone(),
        }))
        .map_err(|e| DomainError::invariant(format!("event payload serialization failed: {e}")))?;

        Ok(EventEnvelope::new(
            Uuid::now_v7(),
            entry.warehouse_id,
            STOCK_SUBJECT,
            *entry.product_id.as_uuid(),
            entry.sequence_number,
            payload,
        ))
    }
}
