//! Read-replica stock quantity cache.
//!
//! The UI used to read "current stock" out of page-level caches that nobody
//! owned. This is the replacement: a short-lived replica fed from the event
//! bus, idempotent against duplicate or replayed envelopes, and explicitly
//! invalidatable. It is NEVER a source of truth — availability checks go to
//! the [`StockStore`](crate::store::StockStore).

use std::collections::HashMap;
use std::sync::RwLock;

use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use thiserror::Error;

use stockmaster_events::EventEnvelope;

use crate::entry::StockKey;
use crate::events::{STOCK_SUBJECT, StockEvent};

#[derive(Debug, Error)]
pub enum StockCacheError {
    #[error("failed to deserialize stock event: {0}")]
    Deserialize(String),

    #[error("envelope scope does not match entry: {0}")]
    ScopeMismatch(String),
}

#[derive(Debug, Default)]
pub struct StockCache {
    quantities: RwLock<HashMap<StockKey, Decimal>>,
    cursors: RwLock<HashMap<StockKey, u64>>,
}

impl StockCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached quantity for an account, if the cache has seen it.
    pub fn quantity(&self, key: StockKey) -> Option<Decimal> {
        self.quantities.read().ok()?.get(&key).copied()
    }

    /// Drop one account from the cache; the next read misses and the caller
    /// goes back to the store.
    pub fn invalidate(&self, key: StockKey) {
        if let Ok(mut map) = self.quantities.write() {
            map.remove(&key);
        }
    }

    /// Apply a published envelope.
    ///
    /// - Envelopes for other subject types are ignored.
    /// - Duplicates and replays (sequence ≤ cursor) are ignored — delivery
    ///   is at-least-once.
    /// - Scope mismatches between envelope and payload are rejected: they
    ///   mean a buggy publisher, and silently applying them would corrupt
    ///   the replica.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), StockCacheError> {
        if envelope.subject_type() != STOCK_SUBJECT {
            return Ok(());
        }

        let event: StockEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| StockCacheError::Deserialize(e.to_string()))?;
        let StockEvent::EntryRecorded(recorded) = event;
        let entry = recorded.entry;

        if entry.warehouse_id != envelope.warehouse_id() {
            return Err(StockCacheError::ScopeMismatch(
                "entry warehouse does not match envelope warehouse".to_string(),
            ));
        }
        if *entry.product_id.as_uuid() != envelope.subject_id() {
            return Err(StockCacheError::ScopeMismatch(
                "entry product does not match envelope subject".to_string(),
            ));
        }

        let key = entry.key();
        let seq = envelope.sequence_number();

        let mut cursors = match self.cursors.write() {
            Ok(c) => c,
            Err(_) => return Ok(()),
        };
        let last = *cursors.get(&key).unwrap_or(&0);
        if seq <= last {
            // Duplicate or replay; safe to ignore — balance_after is
            // absolute, so later entries fully supersede earlier ones.
            return Ok(());
        }

        if let Ok(mut quantities) = self.quantities.write() {
            quantities.insert(key, entry.balance_after);
        }
        cursors.insert(key, seq);
        Ok(())
    }
}
