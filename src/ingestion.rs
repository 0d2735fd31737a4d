use std::io::Read;
use std::pin::Pin;

use futures::stream::{self, Stream};
use serde::Deserialize;

use crate::domain::traits::RequestStream;
use crate::domain::{Account, AccountId, Energy, Error, RawConsumeRequest};

pub struct CsvReader<R: Read> {
    reader: Option<csv::Reader<R>>,
}

impl<R: Read> CsvReader<R> {
    pub fn new(reader: R) -> Result<Self, Error> {
        Ok(Self {
            reader: Some(csv_reader(reader)),
        })
    }
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader)
}

/// Internal shape used only for CSV deserialization.
#[derive(Debug, Deserialize)]
struct RequestRow {
    account: AccountId,
    amount: Energy,
    idempotency_key: Option<String>,
}

impl From<RequestRow> for RawConsumeRequest {
    fn from(row: RequestRow) -> Self {
        // A blank key is still handed on so the coordinator can refuse it.
        RawConsumeRequest {
            account_id: row.account,
            amount: row.amount,
            idempotency_key: row.idempotency_key.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AccountRow {
    account: AccountId,
    energy: Energy,
}

/// Reads `account,energy` rows. Any malformed row fails the whole load.
pub fn load_accounts<R: Read>(reader: R) -> Result<Vec<Account>, Error> {
    csv_reader(reader)
        .into_deserialize::<AccountRow>()
        .map(|row| {
            row.map(|row| Account::new(row.account, row.energy))
                .map_err(|e| Error::Ingestion(format!("CSV deserialization error: {}", e)))
        })
        .collect()
}

impl<R: Read + Send + 'static> RequestStream for CsvReader<R> {
    type ReqStream = Pin<Box<dyn Stream<Item = Result<RawConsumeRequest, Error>> + Send>>;

    fn stream(&mut self) -> Self::ReqStream {
        // Take ownership of the reader so the iterator we build owns all data and is 'static.
        let reader = match self.reader.take() {
            Some(r) => r,
            None => {
                return Box::pin(stream::iter(Vec::<Result<RawConsumeRequest, Error>>::new()));
            }
        };

        let iter = reader
            .into_deserialize::<RequestRow>()
            .map(|row_res| match row_res {
                Ok(row) => Ok(RawConsumeRequest::from(row)),
                Err(e) => Err(Error::Ingestion(format!(
                    "CSV deserialization error: {}",
                    e
                ))),
            });

        Box::pin(stream::iter(iter))
    }
}
