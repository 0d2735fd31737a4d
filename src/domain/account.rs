use crate::domain::Energy;

pub type AccountId = u64;

/// Committed view of an account row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub energy: Energy, // never negative once committed
}

impl Account {
    pub fn new(id: AccountId, energy: Energy) -> Self {
        Self { id, energy }
    }
}

impl core::fmt::Display for Account {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Account {} - Energy: {}", self.id, self.energy)
    }
}
