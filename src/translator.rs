//! Maps storage failures onto the closed consume outcome set, and outcomes onto
//! the categories an adapter needs to pick a response.

use crate::domain::{ConsumeOutcome, ConsumeRequest, Constraint, StoreError, ValidationReason};

/// How a caller should treat an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeClass {
    /// Energy was consumed by this call.
    Applied,
    /// The request had already been processed; not an error.
    AlreadyProcessed,
    /// The input must change before a retry can succeed.
    CallerError,
    /// Retry with identical input, including the same idempotency key.
    Retryable,
}

impl OutcomeClass {
    pub fn is_retryable(&self) -> bool {
        matches!(self, OutcomeClass::Retryable)
    }
}

pub fn classify(outcome: &ConsumeOutcome) -> OutcomeClass {
    match outcome {
        ConsumeOutcome::Success(_) => OutcomeClass::Applied,
        ConsumeOutcome::IdempotencyReplay { .. } => OutcomeClass::AlreadyProcessed,
        ConsumeOutcome::ValidationError { .. } | ConsumeOutcome::InsufficientEnergy { .. } => {
            OutcomeClass::CallerError
        }
        ConsumeOutcome::TransientFailure { .. } => OutcomeClass::Retryable,
    }
}

/// Translates a store failure raised while processing `request`.
pub fn translate(request: &ConsumeRequest, error: StoreError) -> ConsumeOutcome {
    match error {
        StoreError::UniqueViolation {
            constraint: Constraint::ConsumptionKey,
        } => ConsumeOutcome::IdempotencyReplay {
            idempotency_key: request.idempotency_key().clone(),
        },
        StoreError::AccountNotFound(account_id) => ConsumeOutcome::ValidationError {
            reason: ValidationReason::UnknownAccount(account_id),
        },
        StoreError::CheckViolation {
            constraint: Constraint::NonNegativeBalance,
            balance,
            amount,
        } => ConsumeOutcome::InsufficientEnergy {
            account_id: request.account_id(),
            requested: amount,
            available: balance,
        },
        other => ConsumeOutcome::TransientFailure {
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConsumptionReceipt, Energy, IdempotencyKey};

    fn request() -> ConsumeRequest {
        ConsumeRequest::new(1, Energy(60), "k1").unwrap()
    }

    #[test]
    fn key_violation_is_a_replay() {
        let outcome = translate(
            &request(),
            StoreError::UniqueViolation {
                constraint: Constraint::ConsumptionKey,
            },
        );
        assert_eq!(
            outcome,
            ConsumeOutcome::IdempotencyReplay {
                idempotency_key: IdempotencyKey::parse("k1").unwrap()
            }
        );
        assert_eq!(classify(&outcome), OutcomeClass::AlreadyProcessed);
        assert!(!classify(&outcome).is_retryable());
    }

    #[test]
    fn other_unique_violations_are_not_replays() {
        let outcome = translate(
            &request(),
            StoreError::UniqueViolation {
                constraint: Constraint::AccountPrimaryKey,
            },
        );
        assert!(matches!(outcome, ConsumeOutcome::TransientFailure { .. }));
    }

    #[test]
    fn check_violation_is_insufficient_energy() {
        let outcome = translate(
            &request(),
            StoreError::CheckViolation {
                constraint: Constraint::NonNegativeBalance,
                balance: Energy(40),
                amount: Energy(60),
            },
        );
        assert_eq!(
            outcome,
            ConsumeOutcome::InsufficientEnergy {
                account_id: 1,
                requested: Energy(60),
                available: Energy(40),
            }
        );
        assert_eq!(classify(&outcome), OutcomeClass::CallerError);
    }

    #[test]
    fn missing_account_is_a_validation_error() {
        let outcome = translate(&request(), StoreError::AccountNotFound(1));
        assert_eq!(
            outcome,
            ConsumeOutcome::ValidationError {
                reason: ValidationReason::UnknownAccount(1)
            }
        );
    }

    #[test]
    fn lock_timeout_is_retryable() {
        let outcome = translate(
            &request(),
            StoreError::LockTimeout {
                resource: "account 1".to_string(),
                waited_ms: 5,
            },
        );
        assert_eq!(classify(&outcome), OutcomeClass::Retryable);
        assert!(classify(&outcome).is_retryable());
    }

    #[test]
    fn success_is_applied() {
        let outcome = ConsumeOutcome::Success(ConsumptionReceipt {
            record_id: 1,
            account_id: 1,
            amount_consumed: Energy(60),
            remaining_energy: Energy(40),
        });
        assert_eq!(classify(&outcome), OutcomeClass::Applied);
    }
}
