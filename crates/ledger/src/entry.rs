use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockmaster_core::{BinId, EntryId, ProductId, UserId, ValueObject, WarehouseId};

/// What kind of stock movement a ledger entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Receipt,
    Delivery,
    TransferOut,
    TransferIn,
    Adjustment,
    Return,
}

impl core::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            TransactionType::Receipt => "receipt",
            TransactionType::Delivery => "delivery",
            TransactionType::TransferOut => "transfer_out",
            TransactionType::TransferIn => "transfer_in",
            TransactionType::Adjustment => "adjustment",
            TransactionType::Return => "return",
        };
        f.write_str(s)
    }
}

/// The serialization point of the whole system: one stock account exists per
/// (product, warehouse) pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockKey {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
}

impl StockKey {
    pub fn new(product_id: ProductId, warehouse_id: WarehouseId) -> Self {
        Self {
            product_id,
            warehouse_id,
        }
    }

    /// Fixed global ordering used whenever multiple accounts must be locked
    /// together (warehouse first, then product, by uuid bytes).
    pub fn lock_order(&self) -> ([u8; 16], [u8; 16]) {
        (
            *self.warehouse_id.as_uuid().as_bytes(),
            *self.product_id.as_uuid().as_bytes(),
        )
    }
}

/// Immutable fact: one stock quantity change.
///
/// `balance_after` is the running balance of the (product, warehouse)
/// account through this entry; `sequence_number` is the entry's position in
/// that account. Neither may ever be rewritten — the audit trail depends on
/// it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLedgerEntry {
    pub entry_id: EntryId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub bin_id: Option<BinId>,
    pub transaction_type: TransactionType,
    /// Signed delta, in stock units.
    pub quantity: Decimal,
    pub balance_after: Decimal,
    pub document_number: String,
    pub reference: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    /// Monotonically increasing position in the account's entry stream.
    pub sequence_number: u64,
}

impl StockLedgerEntry {
    pub fn key(&self) -> StockKey {
        StockKey::new(self.product_id, self.warehouse_id)
    }
}

/// Current state of one stock account, derived from the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
    pub quantity: Decimal,
    pub reserved_quantity: Decimal,
    pub available_quantity: Decimal,
}

impl StockLevel {
    pub fn new(quantity: Decimal, reserved_quantity: Decimal) -> Self {
        Self {
            quantity,
            reserved_quantity,
            available_quantity: quantity - reserved_quantity,
        }
    }

    pub fn empty() -> Self {
        Self::new(Decimal::ZERO, Decimal::ZERO)
    }
}

impl ValueObject for StockLevel {}

/// Ledger query filter (all criteria are conjunctive).
#[derive(Debug, Clone, Default)]
pub struct LedgerFilter {
    pub product_id: Option<ProductId>,
    pub warehouse_id: Option<WarehouseId>,
    pub transaction_type: Option<TransactionType>,
    pub document_number: Option<String>,
}

impl LedgerFilter {
    pub fn matches(&self, entry: &StockLedgerEntry) -> bool {
        if self.product_id.is_some_and(|p| entry.product_id != p) {
            return false;
        }
        if self.warehouse_id.is_some_and(|w| entry.warehouse_id != w) {
            return false;
        }
        if self
            .transaction_type
            .is_some_and(|t| entry.transaction_type != t)
        {
            return false;
        }
        if self
            .document_number
            .as_ref()
            .is_some_and(|doc| entry.document_number != *doc)
        {
            return false;
        }
        true
    }
}

/// Offset/limit pagination window.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// One page of results plus the total match count.
#[derive(Debug, Clone)]
pub struct PageOf<T> {
    pub items: Vec<T>,
    pub total: usize,
}
