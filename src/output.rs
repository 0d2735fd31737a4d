use std::io::Write;

use crate::domain::{Account, ConsumeOutcome, OutcomeReporter, RawConsumeRequest};
use crate::translator::{OutcomeClass, classify};

pub const OUTCOME_HEADER: &str = "account,amount,idempotency_key,outcome,detail";
pub const SUMMARY_HEADER: &str = "account,energy,consumptions";

/// Label for each outcome as rendered by the CLI.
pub fn outcome_label(outcome: &ConsumeOutcome) -> &'static str {
    match classify(outcome) {
        OutcomeClass::Applied => "success",
        OutcomeClass::AlreadyProcessed => "already_processed",
        OutcomeClass::Retryable => "transient_failure",
        OutcomeClass::CallerError => match outcome {
            ConsumeOutcome::InsufficientEnergy { .. } => "insufficient_energy",
            _ => "validation_error",
        },
    }
}

fn outcome_detail(outcome: &ConsumeOutcome) -> String {
    match outcome {
        ConsumeOutcome::Success(receipt) => format!("remaining={}", receipt.remaining_energy),
        ConsumeOutcome::InsufficientEnergy { available, .. } => format!("available={}", available),
        other => other.to_string(),
    }
}

/// Writes one CSV line per processed request, then the account summary.
pub struct CsvOutput<W: Write> {
    writer: csv::Writer<W>,
    header_written: bool,
}

impl CsvOutput<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> CsvOutput<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: csv::WriterBuilder::new()
                .has_headers(false)
                .flexible(true)
                .from_writer(writer),
            header_written: false,
        }
    }

    pub fn into_inner(self) -> Option<W> {
        self.writer.into_inner().ok()
    }

    fn write_line(&mut self, fields: &[&str]) {
        if let Err(e) = self.writer.write_record(fields) {
            tracing::error!(error = %e, "failed to write output line");
        }
    }

    fn header(&mut self, header: &str) {
        let fields: Vec<&str> = header.split(',').collect();
        self.write_line(&fields);
    }
}

impl<W: Write> OutcomeReporter for CsvOutput<W> {
    fn report(&mut self, request: &RawConsumeRequest, outcome: &ConsumeOutcome) {
        if !self.header_written {
            self.header(OUTCOME_HEADER);
            self.header_written = true;
        }
        let account = request.account_id.to_string();
        let amount = request.amount.to_string();
        let detail = outcome_detail(outcome);
        self.write_line(&[
            &account,
            &amount,
            &request.idempotency_key,
            outcome_label(outcome),
            &detail,
        ]);
    }

    fn flush(&mut self, accounts: &[(Account, usize)]) {
        self.header(SUMMARY_HEADER);
        for (account, consumptions) in accounts {
            let id = account.id.to_string();
            let energy = account.energy.to_string();
            let count = consumptions.to_string();
            self.write_line(&[&id, &energy, &count]);
        }
        if let Err(e) = self.writer.flush() {
            tracing::error!(error = %e, "failed to flush output");
        }
    }
}
