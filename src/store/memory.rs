//! In-process ledger store.
//!
//! Each account row carries its own async mutex standing in for an exclusive
//! row lock, and each idempotency key gets an index entry guarded the same way,
//! so a second writer of a pending key waits for the first to commit or roll
//! back. Writes are staged in [`MemoryTransaction`] and applied under the
//! commit latch, which keeps readers from observing half of a commit.

use std::{
    collections::HashMap,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::config::LedgerConfig;
use crate::domain::{
    Account, AccountId, Constraint, ConsumptionRecord, Energy, IdempotencyKey, LedgerStore,
    LedgerTransaction, NewConsumption, RecordId, StoreError,
};

struct AccountRow {
    lock: Arc<Mutex<()>>,
    energy: AtomicU64,
}

/// Unique index entry for one idempotency key. Holds the committed record id, if any.
type KeySlot = Arc<Mutex<Option<RecordId>>>;

#[derive(Default)]
struct Tables {
    accounts: RwLock<HashMap<AccountId, Arc<AccountRow>>>,
    consumption_keys: parking_lot::Mutex<HashMap<IdempotencyKey, KeySlot>>,
    consumptions: RwLock<Vec<ConsumptionRecord>>,
    next_record_id: AtomicU64,
    commit_latch: RwLock<()>,
}

impl Tables {
    /// Drops the index entry for a key nobody committed, once no other writer holds or awaits it.
    fn forget_pending_key(&self, key: &IdempotencyKey) {
        let mut keys = self.consumption_keys.lock();
        let vacant = keys.get(key).is_some_and(|slot| {
            Arc::strong_count(slot) == 1 && slot.try_lock().is_ok_and(|held| held.is_none())
        });
        if vacant {
            keys.remove(key);
        }
    }
}

#[derive(Clone)]
pub struct InMemoryLedger {
    tables: Arc<Tables>,
    lock_timeout: Duration,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

impl InMemoryLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            tables: Arc::new(Tables::default()),
            lock_timeout: config.lock_timeout,
        }
    }

    pub fn open_account(&self, id: AccountId, energy: Energy) -> Result<Account, StoreError> {
        let mut accounts = self.tables.accounts.write();
        if accounts.contains_key(&id) {
            return Err(StoreError::UniqueViolation {
                constraint: Constraint::AccountPrimaryKey,
            });
        }
        accounts.insert(
            id,
            Arc::new(AccountRow {
                lock: Arc::new(Mutex::new(())),
                energy: AtomicU64::new(energy.units()),
            }),
        );
        Ok(Account::new(id, energy))
    }

    /// Committed balance. Never blocks on row locks and never feeds a decision.
    pub fn balance(&self, id: AccountId) -> Option<Energy> {
        let _latch = self.tables.commit_latch.read();
        self.tables
            .accounts
            .read()
            .get(&id)
            .map(|row| Energy(row.energy.load(Ordering::Acquire)))
    }

    pub fn accounts(&self) -> Vec<Account> {
        let _latch = self.tables.commit_latch.read();
        let mut accounts: Vec<Account> = self
            .tables
            .accounts
            .read()
            .iter()
            .map(|(id, row)| Account::new(*id, Energy(row.energy.load(Ordering::Acquire))))
            .collect();
        accounts.sort_by_key(|a| a.id);
        accounts
    }

    /// Every account with its committed balance and number of consumption records.
    pub fn summary(&self) -> Vec<(Account, usize)> {
        let _latch = self.tables.commit_latch.read();
        let mut counts: HashMap<AccountId, usize> = HashMap::new();
        for record in self.tables.consumptions.read().iter() {
            *counts.entry(record.account_id).or_default() += 1;
        }
        let mut summary: Vec<(Account, usize)> = self
            .tables
            .accounts
            .read()
            .iter()
            .map(|(id, row)| {
                (
                    Account::new(*id, Energy(row.energy.load(Ordering::Acquire))),
                    counts.get(id).copied().unwrap_or(0),
                )
            })
            .collect();
        summary.sort_by_key(|(account, _)| account.id);
        summary
    }

    pub fn consumptions_for(&self, id: AccountId) -> Vec<ConsumptionRecord> {
        let _latch = self.tables.commit_latch.read();
        self.tables
            .consumptions
            .read()
            .iter()
            .filter(|r| r.account_id == id)
            .cloned()
            .collect()
    }

    pub fn consumption_count(&self) -> usize {
        let _latch = self.tables.commit_latch.read();
        self.tables.consumptions.read().len()
    }

    /// The committed record for `key`, for adapters that look up what a replayed
    /// request did the first time.
    pub fn record_by_key(&self, key: &IdempotencyKey) -> Option<ConsumptionRecord> {
        let _latch = self.tables.commit_latch.read();
        self.tables
            .consumptions
            .read()
            .iter()
            .find(|r| &r.idempotency_key == key)
            .cloned()
    }
}

impl LedgerStore for InMemoryLedger {
    type Tx = MemoryTransaction;

    fn begin(&self) -> impl Future<Output = Result<Self::Tx, StoreError>> + Send {
        let tx = MemoryTransaction {
            tables: Arc::clone(&self.tables),
            lock_timeout: self.lock_timeout,
            locked: HashMap::new(),
            staged: Vec::new(),
            finished: false,
        };
        async move { Ok(tx) }
    }
}

struct LockedRow {
    row: Arc<AccountRow>,
    pending: Option<Energy>,
    _guard: OwnedMutexGuard<()>,
}

impl LockedRow {
    fn current(&self) -> Energy {
        self.pending
            .unwrap_or_else(|| Energy(self.row.energy.load(Ordering::Acquire)))
    }
}

struct StagedRecord {
    record: ConsumptionRecord,
    slot: OwnedMutexGuard<Option<RecordId>>,
}

pub struct MemoryTransaction {
    tables: Arc<Tables>,
    lock_timeout: Duration,
    locked: HashMap<AccountId, LockedRow>,
    staged: Vec<StagedRecord>,
    finished: bool,
}

impl MemoryTransaction {
    fn lock_timeout_error(&self, resource: String) -> StoreError {
        StoreError::LockTimeout {
            resource,
            waited_ms: self.lock_timeout.as_millis() as u64,
        }
    }

    fn has_work(&self) -> bool {
        !self.locked.is_empty() || !self.staged.is_empty()
    }
}

impl LedgerTransaction for MemoryTransaction {
    fn lock_account(
        &mut self,
        account_id: AccountId,
    ) -> impl Future<Output = Result<Energy, StoreError>> + Send {
        async move {
            if let Some(locked) = self.locked.get(&account_id) {
                return Ok(locked.current());
            }

            let row = self
                .tables
                .accounts
                .read()
                .get(&account_id)
                .cloned()
                .ok_or(StoreError::AccountNotFound(account_id))?;

            let wait = Arc::clone(&row.lock).lock_owned();
            let guard = tokio::time::timeout(self.lock_timeout, wait)
                .await
                .map_err(|_| self.lock_timeout_error(format!("account {}", account_id)))?;

            // Read only once the lock is ours, so the previous holder's commit is visible.
            let energy = Energy(row.energy.load(Ordering::Acquire));
            self.locked.insert(
                account_id,
                LockedRow {
                    row,
                    pending: None,
                    _guard: guard,
                },
            );
            Ok(energy)
        }
    }

    fn decrement_balance(
        &mut self,
        account_id: AccountId,
        amount: Energy,
    ) -> impl Future<Output = Result<Energy, StoreError>> + Send {
        async move {
            let locked = self
                .locked
                .get_mut(&account_id)
                .ok_or(StoreError::LockNotHeld(account_id))?;

            let balance = locked.current();
            let updated = balance
                .checked_sub(amount)
                .ok_or(StoreError::CheckViolation {
                    constraint: Constraint::NonNegativeBalance,
                    balance,
                    amount,
                })?;
            locked.pending = Some(updated);
            Ok(updated)
        }
    }

    fn insert_consumption(
        &mut self,
        new: NewConsumption,
    ) -> impl Future<Output = Result<ConsumptionRecord, StoreError>> + Send {
        async move {
            if !self.tables.accounts.read().contains_key(&new.account_id) {
                return Err(StoreError::AccountNotFound(new.account_id));
            }
            if self
                .staged
                .iter()
                .any(|s| s.record.idempotency_key == new.idempotency_key)
            {
                return Err(StoreError::UniqueViolation {
                    constraint: Constraint::ConsumptionKey,
                });
            }

            let slot = Arc::clone(
                self.tables
                    .consumption_keys
                    .lock()
                    .entry(new.idempotency_key.clone())
                    .or_insert_with(|| Arc::new(Mutex::new(None))),
            );

            // A pending writer of the same key holds the slot until it commits or rolls back.
            let waited = tokio::time::timeout(self.lock_timeout, slot.lock_owned()).await;
            let slot = match waited {
                Ok(slot) => slot,
                Err(_) => {
                    self.tables.forget_pending_key(&new.idempotency_key);
                    return Err(
                        self.lock_timeout_error(format!("idempotency key {}", new.idempotency_key))
                    );
                }
            };

            if slot.is_some() {
                return Err(StoreError::UniqueViolation {
                    constraint: Constraint::ConsumptionKey,
                });
            }

            let record = ConsumptionRecord {
                id: self.tables.next_record_id.fetch_add(1, Ordering::Relaxed) + 1,
                account_id: new.account_id,
                amount: new.amount,
                idempotency_key: new.idempotency_key,
                created_at: Utc::now(),
            };
            self.staged.push(StagedRecord {
                record: record.clone(),
                slot,
            });
            Ok(record)
        }
    }

    fn commit(mut self) -> impl Future<Output = Result<(), StoreError>> + Send {
        let locked = std::mem::take(&mut self.locked);
        let staged = std::mem::take(&mut self.staged);
        let tables = Arc::clone(&self.tables);
        self.finished = true;

        async move {
            {
                let _latch = tables.commit_latch.write();
                for row in locked.values() {
                    if let Some(energy) = row.pending {
                        row.row.energy.store(energy.units(), Ordering::Release);
                    }
                }
                let mut records = tables.consumptions.write();
                for mut staged in staged {
                    *staged.slot = Some(staged.record.id);
                    records.push(staged.record);
                }
            }
            // Row locks are released only after every write above is visible.
            drop(locked);
            Ok(())
        }
    }

    fn rollback(mut self) -> impl Future<Output = ()> + Send {
        if self.has_work() {
            tracing::trace!(
                accounts = self.locked.len(),
                records = self.staged.len(),
                "rolling back ledger transaction"
            );
        }
        self.finished = true;
        drop(self);
        async {}
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if !self.finished && self.has_work() {
            tracing::trace!(
                accounts = self.locked.len(),
                records = self.staged.len(),
                "ledger transaction dropped before commit, discarding staged writes"
            );
        }
        for StagedRecord { record, slot } in std::mem::take(&mut self.staged) {
            drop(slot);
            self.tables.forget_pending_key(&record.idempotency_key);
        }
    }
}
