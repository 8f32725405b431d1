//! In-memory stock store: append-only ledger + projection per account.
//!
//! Every (product, warehouse) account sits behind its own mutex — the
//! single-writer discipline that keeps the check-then-act sequence of a
//! document commit atomic. Cross-account operations (transfers) lock all
//! involved accounts in one fixed global order, so they cannot deadlock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, TryLockError};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use stockmaster_core::{
    BinId, DomainError, DomainResult, EntryId, ProductId, QUANTITY_SCALE, UserId, WarehouseId,
};

use crate::entry::{LedgerFilter, Page, PageOf, StockKey, StockLedgerEntry, StockLevel, TransactionType};

/// How a posting's quantity is expressed.
///
/// `SetTo` exists for `set`-type adjustments: the target is resolved to a
/// delta against the live balance *under the account lock*, so the ledger
/// stays delta-only and the snapshot cannot race with concurrent commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostingAmount {
    /// Signed delta in stock units.
    Delta(Decimal),
    /// Absolute target balance; resolved to a delta at commit time.
    SetTo(Decimal),
}

/// One planned ledger write, produced by a document commit strategy.
#[derive(Debug, Clone)]
pub struct Posting {
    pub key: StockKey,
    pub bin_id: Option<BinId>,
    pub transaction_type: TransactionType,
    pub amount: PostingAmount,
    /// The document holds a reservation covering this posting; commit must
    /// release it in the same atomic step as the append.
    pub releases_reservation: bool,
    /// Administrative override: permit the balance to go negative
    /// (adjustments may force any value).
    pub allow_negative: bool,
    pub document_number: String,
    pub reference: String,
    pub created_by: UserId,
    /// Display label used in insufficient-stock errors.
    pub product_label: String,
}

#[derive(Debug, Default)]
struct StockAccount {
    entries: Vec<StockLedgerEntry>,
    reserved: Decimal,
}

impl StockAccount {
    fn quantity(&self) -> Decimal {
        self.entries
            .last()
            .map(|e| e.balance_after)
            .unwrap_or(Decimal::ZERO)
    }

    fn available(&self) -> Decimal {
        self.quantity() - self.reserved
    }

    fn level(&self) -> StockLevel {
        StockLevel::new(self.quantity(), self.reserved)
    }
}

type AccountHandle = Arc<Mutex<StockAccount>>;

/// Bounded lock acquisition: after this many rounds the commit surfaces a
/// retryable conflict instead of blocking indefinitely.
const MAX_LOCK_ATTEMPTS: u32 = 5;

/// Authoritative stock store.
#[derive(Debug, Default)]
pub struct StockStore {
    accounts: RwLock<HashMap<StockKey, AccountHandle>>,
}

impl StockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn existing_handle(&self, key: StockKey) -> DomainResult<Option<AccountHandle>> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| DomainError::invariant("stock account map lock poisoned"))?;
        Ok(accounts.get(&key).cloned())
    }

    fn handle(&self, key: StockKey) -> DomainResult<AccountHandle> {
        if let Some(handle) = self.existing_handle(key)? {
            return Ok(handle);
        }
        let mut accounts = self
            .accounts
            .write()
            .map_err(|_| DomainError::invariant("stock account map lock poisoned"))?;
        Ok(accounts.entry(key).or_default().clone())
    }

    fn lock<'a>(handle: &'a AccountHandle) -> DomainResult<MutexGuard<'a, StockAccount>> {
        handle
            .lock()
            .map_err(|_| DomainError::invariant("stock account lock poisoned"))
    }

    /// Snapshot of one account's quantity / reserved / available.
    pub fn level(&self, product_id: ProductId, warehouse_id: WarehouseId) -> DomainResult<StockLevel> {
        match self.existing_handle(StockKey::new(product_id, warehouse_id))? {
            Some(handle) => Ok(Self::lock(&handle)?.level()),
            None => Ok(StockLevel::empty()),
        }
    }

    /// Place a hold on available stock for a not-yet-committed outbound
    /// document. Fails when the hold would exceed what is available.
    pub fn reserve(&self, key: StockKey, quantity: Decimal, product_label: &str) -> DomainResult<()> {
        if quantity <= Decimal::ZERO {
            return Err(DomainError::validation(
                "reservation quantity must be positive",
            ));
        }
        let handle = self.handle(key)?;
        let mut account = Self::lock(&handle)?;
        let available = account.available();
        if available < quantity {
            return Err(DomainError::insufficient_stock(
                product_label,
                quantity,
                available,
            ));
        }
        account.reserved += quantity;
        Ok(())
    }

    /// Release a previously placed hold (document canceled).
    ///
    /// Releasing more than is held means the reservation bookkeeping has
    /// diverged from the documents — an invariant violation, not a user
    /// error.
    pub fn release(&self, key: StockKey, quantity: Decimal) -> DomainResult<()> {
        if quantity <= Decimal::ZERO {
            return Err(DomainError::validation("release quantity must be positive"));
        }
        let handle = self.handle(key)?;
        let mut account = Self::lock(&handle)?;
        if quantity > account.reserved {
            tracing::error!(
                product = %key.product_id,
                warehouse = %key.warehouse_id,
                %quantity,
                reserved = %account.reserved,
                "attempted to release more stock than is reserved"
            );
            return Err(DomainError::invariant(
                "attempted to release more stock than is reserved",
            ));
        }
        account.reserved -= quantity;
        Ok(())
    }

    /// Atomically apply a batch of postings.
    ///
    /// All involved accounts are locked (fixed global order, bounded
    /// try-lock retries), every posting is validated against the locked
    /// state, and only then are entries appended. A failing posting fails
    /// the whole batch with nothing written.
    pub fn commit(
        &self,
        postings: &[Posting],
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Vec<StockLedgerEntry>> {
        if postings.is_empty() {
            return Ok(Vec::new());
        }

        // Unique keys in the fixed global lock order.
        let mut keys: Vec<StockKey> = postings.iter().map(|p| p.key).collect();
        keys.sort_by_key(StockKey::lock_order);
        keys.dedup();

        let handles: Vec<(StockKey, AccountHandle)> = keys
            .iter()
            .map(|k| Ok((*k, self.handle(*k)?)))
            .collect::<DomainResult<_>>()?;

        let mut guards: Vec<MutexGuard<'_, StockAccount>> = Vec::with_capacity(handles.len());
        let mut attempt = 0u32;
        loop {
            let mut acquired_all = true;
            for (_, handle) in &handles {
                match handle.try_lock() {
                    Ok(guard) => guards.push(guard),
                    Err(TryLockError::WouldBlock) => {
                        acquired_all = false;
                        break;
                    }
                    Err(TryLockError::Poisoned(_)) => {
                        return Err(DomainError::invariant("stock account lock poisoned"));
                    }
                }
            }
            if acquired_all {
                break;
            }
            guards.clear();
            attempt += 1;
            if attempt >= MAX_LOCK_ATTEMPTS {
                return Err(DomainError::conflict(
                    "stock accounts are busy, please try again",
                ));
            }
            thread::sleep(Duration::from_millis(u64::from(attempt)));
        }

        let index: HashMap<StockKey, usize> = handles
            .iter()
            .enumerate()
            .map(|(i, (k, _))| (*k, i))
            .collect();

        // Validation pass: resolve amounts and project balances. Nothing is
        // written until every posting has checked out.
        let mut projected_qty: Vec<Decimal> = guards.iter().map(|g| g.quantity()).collect();
        let mut projected_reserved: Vec<Decimal> = guards.iter().map(|g| g.reserved).collect();
        let mut resolved: Vec<Option<Decimal>> = Vec::with_capacity(postings.len());

        for posting in postings {
            let i = index[&posting.key];
            let delta = match posting.amount {
                PostingAmount::Delta(d) => d.round_dp(QUANTITY_SCALE),
                PostingAmount::SetTo(target) => {
                    (target - projected_qty[i]).round_dp(QUANTITY_SCALE)
                }
            };

            // A `set` that lands on the current balance records nothing:
            // the ledger logs changes, not confirmations.
            if delta.is_zero() && matches!(posting.amount, PostingAmount::SetTo(_)) {
                resolved.push(None);
                continue;
            }

            if posting.releases_reservation {
                let held = delta.abs();
                if projected_reserved[i] < held {
                    return Err(DomainError::invariant(format!(
                        "posting for {} releases {held} but only {} is reserved",
                        posting.key.product_id, projected_reserved[i]
                    )));
                }
                projected_reserved[i] -= held;
            } else if delta < Decimal::ZERO && !posting.allow_negative {
                let available = projected_qty[i] - projected_reserved[i];
                if available < -delta {
                    return Err(DomainError::insufficient_stock(
                        &posting.product_label,
                        -delta,
                        available,
                    ));
                }
            }

            let new_balance = projected_qty[i] + delta;
            if new_balance < Decimal::ZERO && !posting.allow_negative {
                return Err(DomainError::insufficient_stock(
                    &posting.product_label,
                    -delta,
                    projected_qty[i],
                ));
            }

            projected_qty[i] = new_balance;
            resolved.push(Some(delta));
        }

        // Apply pass: every posting validated, so this cannot fail.
        let mut committed = Vec::with_capacity(postings.len());
        for (posting, delta) in postings.iter().zip(resolved) {
            let Some(delta) = delta else { continue };
            let i = index[&posting.key];
            let account = &mut guards[i];

            let balance_after = account.quantity() + delta;
            let sequence_number = account.entries.len() as u64 + 1;
            let entry = StockLedgerEntry {
                entry_id: EntryId::new(),
                product_id: posting.key.product_id,
                warehouse_id: posting.key.warehouse_id,
                bin_id: posting.bin_id,
                transaction_type: posting.transaction_type,
                quantity: delta,
                balance_after,
                document_number: posting.document_number.clone(),
                reference: posting.reference.clone(),
                created_by: posting.created_by,
                created_at: occurred_at,
                sequence_number,
            };

            if posting.releases_reservation {
                account.reserved -= delta.abs();
            }

            tracing::debug!(
                product = %entry.product_id,
                warehouse = %entry.warehouse_id,
                transaction = %entry.transaction_type,
                quantity = %entry.quantity,
                balance_after = %entry.balance_after,
                document = %entry.document_number,
                "ledger entry appended"
            );

            account.entries.push(entry.clone());
            committed.push(entry);
        }

        Ok(committed)
    }

    /// Paginated, filtered ledger query; newest entries first.
    pub fn entries(&self, filter: &LedgerFilter, page: Page) -> DomainResult<PageOf<StockLedgerEntry>> {
        let accounts = self
            .accounts
            .read()
            .map_err(|_| DomainError::invariant("stock account map lock poisoned"))?;

        let mut rows: Vec<StockLedgerEntry> = Vec::new();
        for (key, handle) in accounts.iter() {
            if filter.product_id.is_some_and(|p| key.product_id != p) {
                continue;
            }
            if filter.warehouse_id.is_some_and(|w| key.warehouse_id != w) {
                continue;
            }
            let account = Self::lock(handle)?;
            rows.extend(account.entries.iter().filter(|e| filter.matches(e)).cloned());
        }

        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.sequence_number.cmp(&a.sequence_number))
        });

        let total = rows.len();
        let items = rows.into_iter().skip(page.offset).take(page.limit).collect();
        Ok(PageOf { items, total })
    }

    /// Read-only balance reconstruction for audit / history views.
    ///
    /// Sums entry deltas up to and including `as_of`; with a bin given, only
    /// entries against that bin contribute (bins carry no running balance of
    /// their own).
    pub fn balance_as_of(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        bin_id: Option<BinId>,
        as_of: DateTime<Utc>,
    ) -> DomainResult<Decimal> {
        let Some(handle) = self.existing_handle(StockKey::new(product_id, warehouse_id))? else {
            return Ok(Decimal::ZERO);
        };
        let account = Self::lock(&handle)?;
        Ok(account
            .entries
            .iter()
            .filter(|e| e.created_at <= as_of)
            .filter(|e| bin_id.is_none() || e.bin_id == bin_id)
            .map(|e| e.quantity)
            .sum())
    }

    /// Recompute the running sum for one account and compare it against
    /// every recorded `balance_after`. A mismatch means the audit trail has
    /// been corrupted — fatal, logged, never swallowed.
    pub fn check_integrity(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> DomainResult<()> {
        let Some(handle) = self.existing_handle(StockKey::new(product_id, warehouse_id))? else {
            return Ok(());
        };
        let account = Self::lock(&handle)?;
        let mut running = Decimal::ZERO;
        for entry in &account.entries {
            running += entry.quantity;
            if entry.balance_after != running {
                tracing::error!(
                    product = %product_id,
                    warehouse = %warehouse_id,
                    sequence = entry.sequence_number,
                    recorded = %entry.balance_after,
                    computed = %running,
                    "ledger running-sum mismatch"
                );
                return Err(DomainError::invariant(format!(
                    "ledger sum mismatch for {product_id}/{warehouse_id} at sequence {}: computed {running}, recorded {}",
                    entry.sequence_number, entry.balance_after
                )));
            }
        }
        Ok(())
    }
}
