use std::{env, fs::File, path::Path};

use energy_ledger::{
    Engine, Error, InMemoryLedger, LedgerConfig, dlq::StdErrDLQ, ingestion, output::CsvOutput,
};

#[tokio::main] // using Tokio runtime for async
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let mut args = env::args().skip(1);
    let (accounts_path, requests_path) = match (args.next(), args.next()) {
        (Some(accounts), Some(requests)) => (accounts, requests),
        _ => {
            return Err(Box::new(Error::Ingestion(
                "usage: energy_ledger <accounts.csv> <requests.csv>".to_string(),
            )) as Box<dyn std::error::Error>);
        }
    };

    let config = LedgerConfig::from_env()?;
    let ledger = InMemoryLedger::new(config);

    let accounts = ingestion::load_accounts(File::open(Path::new(&accounts_path))?)?;
    for account in accounts {
        ledger.open_account(account.id, account.energy)?;
    }
    tracing::info!(accounts = ledger.accounts().len(), "accounts provisioned");

    let requests = ingestion::CsvReader::new(File::open(Path::new(&requests_path))?)?;

    // Initialize engine with injected components
    let mut engine = Engine::new(requests, ledger, CsvOutput::stdout(), StdErrDLQ::default());

    let processed = engine.process().await?;
    tracing::info!(processed, "requests processed");

    let summary = engine.store().summary();
    engine.flush(&summary);

    Ok(())
}
