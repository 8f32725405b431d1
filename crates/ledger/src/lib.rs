//! Stock ledger and projection.
//!
//! The ledger is the source of truth for quantities: an append-only log of
//! signed deltas per (product, warehouse), each entry carrying the running
//! balance at the time it was written. The projection (quantity / reserved /
//! available) lives next to the log under the same per-account lock, so a
//! reservation release and the matching ledger append are never observably
//! separated.

pub mod cache;
pub mod entry;
pub mod events;
pub mod store;

pub use cache::{StockCache, StockCacheError};
pub use entry::{
    LedgerFilter, Page, PageOf, StockKey, StockLedgerEntry, StockLevel, TransactionType,
};
pub use events::{EntryRecorded, STOCK_SUBJECT, StockEvent};
pub use store::{Posting, PostingAmount, StockStore};
