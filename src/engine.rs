use crate::coordinator::EnergyCoordinator;
use crate::translator::classify;
use crate::domain::{
    Account, Error,
    traits::{DeadLetterQueue, LedgerStore, OutcomeReporter, RequestStream},
};

use futures::StreamExt;

/// Drives a stream of consume requests through the coordinator, in order.
#[derive(Debug)]
pub struct Engine<I, S, O, D>
where
    I: RequestStream,
    S: LedgerStore,
    O: OutcomeReporter,
    D: DeadLetterQueue,
{
    ingestion: I,
    coordinator: EnergyCoordinator<S>,
    reporter: O,
    dlq: D,
}

impl<I, S, O, D> Engine<I, S, O, D>
where
    I: RequestStream,
    S: LedgerStore,
    O: OutcomeReporter,
    D: DeadLetterQueue,
{
    pub fn new(ingestion: I, store: S, reporter: O, dlq: D) -> Self {
        Self {
            ingestion,
            coordinator: EnergyCoordinator::new(store),
            reporter,
            dlq,
        }
    }

    pub fn store(&self) -> &S {
        self.coordinator.store()
    }

    pub async fn process(&mut self) -> Result<usize, Error> {
        let mut res = self.ingestion.stream();
        let mut processed = 0;

        while let Some(row) = res.next().await {
            match row {
                Ok(request) => {
                    let outcome = self
                        .coordinator
                        .consume_raw(
                            request.account_id,
                            request.amount,
                            request.idempotency_key.clone(),
                        )
                        .await;
                    if classify(&outcome).is_retryable() {
                        tracing::warn!(
                            account_id = request.account_id,
                            idempotency_key = request.idempotency_key.as_str(),
                            "request not applied, resubmit with the same idempotency key"
                        );
                    }
                    self.reporter.report(&request, &outcome);
                    processed += 1;
                }
                Err(e) => self.dlq.report(&e),
            }
        }

        Ok(processed)
    }

    pub fn flush(&mut self, accounts: &[(Account, usize)]) {
        self.reporter.flush(accounts);
    }
}
