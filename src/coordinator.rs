use crate::domain::{
    AccountId, ConsumeOutcome, ConsumeRequest, ConsumptionReceipt, Energy, LedgerStore,
    LedgerTransaction, NewConsumption, StoreError,
};
use crate::translator::translate;

/// Runs each consume request as one unit of work against a [`LedgerStore`]:
/// lock the account row, record the consumption, check the balance,
/// decrement, commit.
///
/// The coordinator holds no balance state of its own. Replays are detected
/// only through the store's unique constraint on the idempotency key, at
/// insert time, inside the same unit of work as the decrement.
#[derive(Debug)]
pub struct EnergyCoordinator<S>
where
    S: LedgerStore,
{
    store: S,
}

impl<S> EnergyCoordinator<S>
where
    S: LedgerStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validates primitive inputs, then consumes. Invalid input never reaches the store.
    pub async fn consume_raw(
        &self,
        account_id: AccountId,
        amount: Energy,
        idempotency_key: impl Into<String>,
    ) -> ConsumeOutcome {
        match ConsumeRequest::new(account_id, amount, idempotency_key) {
            Ok(request) => self.consume(request).await,
            Err(reason) => {
                tracing::debug!(account_id, %amount, %reason, "rejected consume request");
                reason.into()
            }
        }
    }

    pub async fn consume(&self, request: ConsumeRequest) -> ConsumeOutcome {
        let outcome = match self.run(&request).await {
            Ok(outcome) => outcome,
            Err(error) => translate(&request, error),
        };
        log_outcome(&request, &outcome);
        outcome
    }

    async fn run(&self, request: &ConsumeRequest) -> Result<ConsumeOutcome, StoreError> {
        let mut tx = self.store.begin().await?;

        match Self::apply(&mut tx, request).await {
            Ok(outcome @ ConsumeOutcome::Success(_)) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Ok(rejected) => {
                tx.rollback().await;
                Ok(rejected)
            }
            Err(error) => {
                tx.rollback().await;
                Err(error)
            }
        }
    }

    /// Stages the consume inside `tx`. Only a `Success` result may be committed.
    async fn apply(
        tx: &mut S::Tx,
        request: &ConsumeRequest,
    ) -> Result<ConsumeOutcome, StoreError> {
        let account_id = request.account_id();
        let amount = request.amount();

        let available = tx.lock_account(account_id).await?;

        // The unique key is the replay witness. Inserting before the balance
        // check lets a replay report as one even when the balance has since
        // dropped below the amount; any rejection below rolls the row back.
        let record = tx
            .insert_consumption(NewConsumption {
                account_id,
                amount,
                idempotency_key: request.idempotency_key().clone(),
            })
            .await?;

        if available < amount {
            return Ok(ConsumeOutcome::InsufficientEnergy {
                account_id,
                requested: amount,
                available,
            });
        }

        // Applied by the store against its own value, not against `available`.
        let remaining = tx.decrement_balance(account_id, amount).await?;

        Ok(ConsumeOutcome::Success(ConsumptionReceipt {
            record_id: record.id,
            account_id,
            amount_consumed: amount,
            remaining_energy: remaining,
        }))
    }
}

fn log_outcome(request: &ConsumeRequest, outcome: &ConsumeOutcome) {
    let account_id = request.account_id();
    let key = request.idempotency_key().as_str();

    match outcome {
        ConsumeOutcome::Success(receipt) => tracing::debug!(
            account_id,
            idempotency_key = key,
            consumed = %receipt.amount_consumed,
            remaining = %receipt.remaining_energy,
            record_id = receipt.record_id,
            "energy consumed"
        ),
        ConsumeOutcome::InsufficientEnergy {
            requested,
            available,
            ..
        } => tracing::warn!(
            account_id,
            %requested,
            %available,
            "insufficient energy"
        ),
        ConsumeOutcome::IdempotencyReplay { .. } => {
            tracing::info!(account_id, idempotency_key = key, "idempotency replay")
        }
        ConsumeOutcome::ValidationError { reason } => {
            tracing::info!(account_id, idempotency_key = key, %reason, "consume request refused")
        }
        ConsumeOutcome::TransientFailure { reason } => tracing::warn!(
            account_id,
            idempotency_key = key,
            reason = reason.as_str(),
            "consume aborted, safe to retry"
        ),
    }
}
