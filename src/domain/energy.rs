use serde::{Deserialize, Deserializer};

/// Whole units of energy. Balances and consumed amounts are never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Energy(pub u64);

impl Energy {
    pub const ZERO: Energy = Energy(0);

    pub fn units(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// `None` when the result would drop below zero.
    pub fn checked_sub(self, rhs: Energy) -> Option<Energy> {
        self.0.checked_sub(rhs.0).map(Energy)
    }

    /// Parses a non-negative integer amount. Signs, fractions and blanks are rejected.
    pub fn from_str_units(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        s.parse::<u64>().ok().map(Energy)
    }
}

impl core::fmt::Display for Energy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<'de> Deserialize<'de> for Energy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Energy::from_str_units(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("Invalid energy amount: {}", s)))
    }
}
