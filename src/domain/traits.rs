use std::future::Future;

use futures::Stream;

use crate::domain::{
    Account, AccountId, ConsumeOutcome, ConsumptionRecord, Energy, Error, NewConsumption,
    RawConsumeRequest, StoreError,
};

pub trait RequestStream {
    type ReqStream: Stream<Item = Result<RawConsumeRequest, Error>> + Send + Unpin + 'static;
    fn stream(&mut self) -> Self::ReqStream;
}

pub trait DeadLetterQueue {
    fn report(&self, error: &Error);
}

pub trait OutcomeReporter {
    fn report(&mut self, request: &RawConsumeRequest, outcome: &ConsumeOutcome);

    /// Emits the closing summary: each account with its committed balance and record count.
    fn flush(&mut self, accounts: &[(Account, usize)]);
}

/// Entry point into durable ledger state. Every balance read that feeds a
/// decision and every write goes through a [`LedgerTransaction`].
pub trait LedgerStore: Send + Sync {
    type Tx: LedgerTransaction;

    fn begin(&self) -> impl Future<Output = Result<Self::Tx, StoreError>> + Send;
}

/// One atomic unit of work. Staged writes become visible only on `commit`;
/// `rollback`, or dropping the transaction, discards them and releases every lock.
pub trait LedgerTransaction: Send {
    /// Blocks until the exclusive row lock is held (or the wait times out),
    /// then returns the committed balance as of acquisition.
    fn lock_account(
        &mut self,
        account_id: AccountId,
    ) -> impl Future<Output = Result<Energy, StoreError>> + Send;

    /// Subtracts `amount` from the stored balance. Requires the row lock and
    /// fails with a check violation rather than going below zero.
    fn decrement_balance(
        &mut self,
        account_id: AccountId,
        amount: Energy,
    ) -> impl Future<Output = Result<Energy, StoreError>> + Send;

    /// Fails with [`StoreError::UniqueViolation`] when the key is already taken.
    fn insert_consumption(
        &mut self,
        new: NewConsumption,
    ) -> impl Future<Output = Result<ConsumptionRecord, StoreError>> + Send;

    fn commit(self) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn rollback(self) -> impl Future<Output = ()> + Send;
}
