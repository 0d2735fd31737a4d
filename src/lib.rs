//! Exactly-once energy consumption against a durable per-account balance.
//!
//! The crate exposes:
//! - [`EnergyCoordinator`]: runs one consume request as a single unit of work
//!   (row lock, balance check, conditional decrement, audit record, commit).
//! - [`LedgerStore`] / [`LedgerTransaction`]: the storage seam, with
//!   [`InMemoryLedger`] as the in-process implementation.
//! - [`translator`]: maps storage failures and outcomes onto caller-facing categories.
//! - [`Engine`]: the batch driver used by the CLI adapter.

pub mod config;
pub mod coordinator;
pub mod dlq;
pub mod domain;
pub mod engine;
pub mod ingestion;
pub mod output;
pub mod store;
pub mod translator;

pub use config::LedgerConfig;
pub use coordinator::EnergyCoordinator;
pub use domain::{
    Account, AccountId, ConsumeOutcome, ConsumeRequest, ConsumptionReceipt, ConsumptionRecord,
    Energy, Error, IdempotencyKey, LedgerStore, LedgerTransaction, NewConsumption, StoreError,
    ValidationReason,
};
pub use engine::Engine;
pub use store::InMemoryLedger;
pub use translator::{OutcomeClass, classify};
