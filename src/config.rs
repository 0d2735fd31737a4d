use std::{env, time::Duration};

use crate::domain::Error;

pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;
pub const LOCK_TIMEOUT_ENV: &str = "ENERGY_LOCK_TIMEOUT_MS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Upper bound on waiting for a row lock or a pending idempotency key.
    pub lock_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MS),
        }
    }
}

impl LedgerConfig {
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Self::default();

        if let Some(raw) = lookup(LOCK_TIMEOUT_ENV) {
            let ms: u64 = raw.trim().parse().map_err(|_| {
                Error::Config(format!(
                    "{} must be a whole number of milliseconds, got {:?}",
                    LOCK_TIMEOUT_ENV, raw
                ))
            })?;
            if ms == 0 {
                return Err(Error::Config(format!(
                    "{} must be greater than zero",
                    LOCK_TIMEOUT_ENV
                )));
            }
            config.lock_timeout = Duration::from_millis(ms);
        }

        Ok(config)
    }
}
