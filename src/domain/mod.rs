pub mod account;
pub mod consumption;
pub mod energy;
pub mod error;
pub mod outcome;
pub mod request;
pub mod traits;

pub use account::{Account, AccountId};
pub use consumption::{ConsumptionRecord, NewConsumption, RecordId};
pub use energy::Energy;
pub use error::{Constraint, Error, StoreError, ValidationReason};
pub use outcome::{ConsumeOutcome, ConsumptionReceipt};
pub use request::{ConsumeRequest, IdempotencyKey, MAX_IDEMPOTENCY_KEY_LEN, RawConsumeRequest};
pub use traits::{DeadLetterQueue, LedgerStore, LedgerTransaction, OutcomeReporter, RequestStream};
