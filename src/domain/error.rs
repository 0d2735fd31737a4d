use crate::domain::{AccountId, Energy};

/// Adapter-level failures: reading inputs, parsing rows, loading config.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    IO(#[from] std::io::Error),

    #[error("Ingestion failed with: {0}")]
    Ingestion(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Why a request was refused before (or, for unknown accounts, instead of) any write.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationReason {
    #[error("amount must be a positive integer")]
    NonPositiveAmount,

    #[error("idempotency key must not be empty")]
    EmptyIdempotencyKey,

    #[error("idempotency key is {len} bytes, limit is {max}")]
    IdempotencyKeyTooLong { len: usize, max: usize },

    #[error("account {0} not found")]
    UnknownAccount(AccountId),
}

/// Named integrity constraints enforced by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// Unique index on the consumption record idempotency key.
    ConsumptionKey,
    /// Primary key on accounts.
    AccountPrimaryKey,
    /// `energy >= 0` on accounts.
    NonNegativeBalance,
}

impl core::fmt::Display for Constraint {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Constraint::ConsumptionKey => "consumption_idempotency_key_unique",
            Constraint::AccountPrimaryKey => "account_pkey",
            Constraint::NonNegativeBalance => "account_energy_non_negative",
        };
        f.write_str(name)
    }
}

/// Failures reported by a ledger store. They never leave the coordinator untranslated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint {constraint} violated")]
    UniqueViolation { constraint: Constraint },

    #[error("check constraint {constraint} violated: balance {balance}, decrement {amount}")]
    CheckViolation {
        constraint: Constraint,
        balance: Energy,
        amount: Energy,
    },

    #[error("account {0} not found")]
    AccountNotFound(AccountId),

    #[error("timed out after {waited_ms}ms waiting for lock on {resource}")]
    LockTimeout { resource: String, waited_ms: u64 },

    #[error("row lock on account {0} is not held by this transaction")]
    LockNotHeld(AccountId),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// True for the signal the idempotency guard relies on.
    pub fn is_unique_violation_on(&self, expected: Constraint) -> bool {
        matches!(self, StoreError::UniqueViolation { constraint } if *constraint == expected)
    }
}
