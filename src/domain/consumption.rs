use chrono::{DateTime, Utc};

use crate::domain::{AccountId, Energy, IdempotencyKey};

pub type RecordId = u64;

/// A consumption event staged for insertion. The store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConsumption {
    pub account_id: AccountId,
    pub amount: Energy,
    pub idempotency_key: IdempotencyKey,
}

/// Committed, immutable audit row. At most one exists per idempotency key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumptionRecord {
    pub id: RecordId,
    pub account_id: AccountId,
    pub amount: Energy,
    pub idempotency_key: IdempotencyKey,
    pub created_at: DateTime<Utc>,
}

impl core::fmt::Display for ConsumptionRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Consumption {} - account={},amount={},key={}",
            self.id, self.account_id, self.amount, self.idempotency_key
        )
    }
}
