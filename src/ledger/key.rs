use crate::core::currency::CurrencyCode;
use crate::core::pair::{CanonicalPair, PairId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Key of a per-pair, per-currency position (close-out and collateral).
///
/// Carries the full canonical pair so a freshly created position can bind
/// its sides; equality is equivalent to equality of `(pair id, currency)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PositionKey {
    pub pair: CanonicalPair,
    pub currency: CurrencyCode,
}

impl PositionKey {
    pub fn new(pair: CanonicalPair, currency: CurrencyCode) -> Self {
        Self { pair, currency }
    }

    pub fn pair_id(&self) -> PairId {
        self.pair.id()
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pair.id(), self.currency)
    }
}

/// Key of a calendar time slot: a position further partitioned by date.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub pair: CanonicalPair,
    pub currency: CurrencyCode,
    pub date: NaiveDate,
}

impl SlotKey {
    pub fn new(pair: CanonicalPair, currency: CurrencyCode, date: NaiveDate) -> Self {
        Self {
            pair,
            currency,
            date,
        }
    }

    pub fn pair_id(&self) -> PairId {
        self.pair.id()
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.pair.id(), self.currency, self.date)
    }
}
