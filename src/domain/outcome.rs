use crate::domain::{AccountId, Energy, IdempotencyKey, RecordId, ValidationReason};

/// What a committed consume produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumptionReceipt {
    pub record_id: RecordId,
    pub account_id: AccountId,
    pub amount_consumed: Energy,
    pub remaining_energy: Energy,
}

/// Closed set of results of a single consume call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    Success(ConsumptionReceipt),
    InsufficientEnergy {
        account_id: AccountId,
        requested: Energy,
        available: Energy,
    },
    /// The key already has a committed record; nothing was changed by this call.
    IdempotencyReplay { idempotency_key: IdempotencyKey },
    ValidationError { reason: ValidationReason },
    TransientFailure { reason: String },
}

impl ConsumeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ConsumeOutcome::Success(_))
    }

    pub fn receipt(&self) -> Option<&ConsumptionReceipt> {
        match self {
            ConsumeOutcome::Success(receipt) => Some(receipt),
            _ => None,
        }
    }
}

impl From<ValidationReason> for ConsumeOutcome {
    fn from(reason: ValidationReason) -> Self {
        ConsumeOutcome::ValidationError { reason }
    }
}

impl core::fmt::Display for ConsumeOutcome {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConsumeOutcome::Success(r) => write!(
                f,
                "consumed {} from account {}, remaining {} (record {})",
                r.amount_consumed, r.account_id, r.remaining_energy, r.record_id
            ),
            ConsumeOutcome::InsufficientEnergy {
                account_id,
                requested,
                available,
            } => write!(
                f,
                "Account {}: requested {}, available {}",
                account_id, requested, available
            ),
            ConsumeOutcome::IdempotencyReplay { .. } => f.write_str("Request already processed."),
            ConsumeOutcome::ValidationError { reason } => write!(f, "{}", reason),
            ConsumeOutcome::TransientFailure { reason } => write!(f, "{}", reason),
        }
    }
}
