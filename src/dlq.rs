use crate::domain::{DeadLetterQueue, Error};

/// Reports input rows that never became a consume request.
#[derive(Default, Debug)]
pub struct StdErrDLQ {}

impl DeadLetterQueue for StdErrDLQ {
    fn report(&self, error: &Error) {
        tracing::warn!(%error, "dead-lettered input row");
        eprintln!("DLQ Report - Error: {}", error);
    }
}
