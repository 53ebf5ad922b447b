use crate::core::amount::Amount;
use crate::core::pair::PairId;
use crate::core::party::PartyId;
use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SettlementError>;

/// Failures reported by a position repository.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("failed to load {key}: {reason}")]
    Load { key: String, reason: String },
    #[error("failed to save {key}: {reason}")]
    Save { key: String, reason: String },
}

/// Errors surfaced by the settlement ledgers.
///
/// Integrity errors (`MissingPosition`, `ArithmeticUnderflow`) indicate a
/// missing or reordered upstream event. They are never masked: the stored
/// position is left exactly as it was before the failing operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    #[error("no position stored for {key}")]
    MissingPosition { key: String },

    #[error("{field} underflow: {available} available, {requested} requested")]
    ArithmeticUnderflow {
        field: &'static str,
        available: Amount,
        requested: Amount,
    },

    #[error("{field} overflow: {balance} + {added}")]
    ArithmeticOverflow {
        field: &'static str,
        balance: Amount,
        added: Amount,
    },

    #[error("bilateral pair requires two distinct parties, got {party} on both sides")]
    CanonicalizationTie { party: PartyId },

    #[error("amount must be non-negative, got {0}")]
    NegativeAmount(Decimal),

    #[error("party {party} is not the expected side of pair {pair}")]
    PartyNotInPair { party: PartyId, pair: PairId },

    #[error("payment mismatch on {key}: net payment is {expected}, got {actual}")]
    PaymentMismatch {
        key: String,
        expected: Amount,
        actual: Amount,
    },

    #[error("time slot {key} has no verified payment")]
    NotVerified { key: String },

    #[error("proof mismatch on {key}: recorded {recorded}, got {given}")]
    ProofMismatch {
        key: String,
        recorded: String,
        given: String,
    },

    #[error("time slot {key} is already settled")]
    AlreadySettled { key: String },

    #[error("time slot {key} has a verified payment awaiting settlement")]
    PendingSettlement { key: String },

    #[error("time slot {key} nets to zero; there is no payment to verify")]
    NothingToVerify { key: String },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl SettlementError {
    /// True for errors that point at a broken or reordered event stream
    /// rather than at a malformed event.
    pub fn is_integrity_error(&self) -> bool {
        matches!(
            self,
            SettlementError::MissingPosition { .. } | SettlementError::ArithmeticUnderflow { .. }
        )
    }
}
