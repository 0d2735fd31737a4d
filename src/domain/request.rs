use crate::domain::{AccountId, Energy, ValidationReason};

/// Upper bound on idempotency key length, in characters.
pub const MAX_IDEMPOTENCY_KEY_LEN: usize = 100;

/// Client-supplied token identifying one logical consume request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn parse(raw: impl Into<String>) -> Result<Self, ValidationReason> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(ValidationReason::EmptyIdempotencyKey);
        }
        let len = raw.chars().count();
        if len > MAX_IDEMPOTENCY_KEY_LEN {
            return Err(ValidationReason::IdempotencyKeyTooLong {
                len,
                max: MAX_IDEMPOTENCY_KEY_LEN,
            });
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated request to consume `amount` from `account_id`.
///
/// Construction is the only place where amount and key are checked, so a
/// `ConsumeRequest` that exists is always well-formed. Whether the account
/// exists is only known once its row is locked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumeRequest {
    account_id: AccountId,
    amount: Energy,
    idempotency_key: IdempotencyKey,
}

impl ConsumeRequest {
    pub fn new(
        account_id: AccountId,
        amount: Energy,
        idempotency_key: impl Into<String>,
    ) -> Result<Self, ValidationReason> {
        if amount.is_zero() {
            return Err(ValidationReason::NonPositiveAmount);
        }
        let idempotency_key = IdempotencyKey::parse(idempotency_key)?;

        Ok(Self {
            account_id,
            amount,
            idempotency_key,
        })
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn amount(&self) -> Energy {
        self.amount
    }

    pub fn idempotency_key(&self) -> &IdempotencyKey {
        &self.idempotency_key
    }
}

impl core::fmt::Display for ConsumeRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "consume,account={},amount={},key={}",
            self.account_id, self.amount, self.idempotency_key
        )
    }
}

/// Request fields as read by an adapter, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawConsumeRequest {
    pub account_id: AccountId,
    pub amount: Energy,
    pub idempotency_key: String,
}
