//! Position algebra, independent of storage.
//!
//! - **net** — signed net balance between the two canonical sides
//! - **gross** — four independent settled/unsettled buckets

pub mod gross;
pub mod net;

use crate::core::amount::Amount;
use crate::core::error::{Result, SettlementError};

pub(crate) fn credit(field: &'static str, balance: Amount, added: Amount) -> Result<Amount> {
    balance
        .checked_add(added)
        .ok_or(SettlementError::ArithmeticOverflow {
            field,
            balance,
            added,
        })
}

pub(crate) fn debit(field: &'static str, balance: Amount, requested: Amount) -> Result<Amount> {
    balance
        .checked_sub(requested)
        .ok_or(SettlementError::ArithmeticUnderflow {
            field,
            available: balance,
            requested,
        })
}
