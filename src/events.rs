//! Typed event parameters consumed by the ledgers.
//!
//! Decoding raw chain logs happens upstream; by the time an event reaches
//! this crate its parties, currency and amounts are already typed. Parties
//! are given in whatever order the originating call used.

use crate::core::amount::Amount;
use crate::core::currency::CurrencyCode;
use crate::core::party::PartyId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A payment registered on, or removed from, a calendar time slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSlotEvent {
    pub party0: PartyId,
    pub party1: PartyId,
    pub currency: CurrencyCode,
    /// Amount paid by `party0`.
    pub payment0: Amount,
    /// Amount paid by `party1`.
    pub payment1: Amount,
    pub date: NaiveDate,
}

/// The net payer of a time slot submits proof of payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentVerification {
    pub verifier: PartyId,
    pub counterparty: PartyId,
    pub currency: CurrencyCode,
    pub date: NaiveDate,
    pub amount: Amount,
    pub proof: String,
    pub timestamp: DateTime<Utc>,
}

/// The receiving side confirms a verified payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSettlement {
    pub confirmer: PartyId,
    pub counterparty: PartyId,
    pub currency: CurrencyCode,
    pub date: NaiveDate,
    pub proof: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseOutAdjustment {
    pub party0: PartyId,
    pub party1: PartyId,
    pub currency: CurrencyCode,
    pub payment0: Amount,
    pub payment1: Amount,
    pub is_increase: bool,
}

/// Collateral used, released or settled between two parties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralMovement {
    pub party_a: PartyId,
    pub party_b: PartyId,
    pub currency: CurrencyCode,
    /// Amount attributed to `party_a`.
    pub amount0: Amount,
    /// Amount attributed to `party_b`.
    pub amount1: Amount,
    /// Which bucket to touch for use/release. Ignored by settle.
    #[serde(default)]
    pub settled: bool,
}

/// Present-value update of settled collateral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralRevaluation {
    pub party_a: PartyId,
    pub party_b: PartyId,
    pub currency: CurrencyCode,
    pub previous0: Amount,
    pub previous1: Amount,
    pub current0: Amount,
    pub current1: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SettlementEvent {
    PaymentRegistered(PaymentSlotEvent),
    PaymentRemoved(PaymentSlotEvent),
    PaymentVerified(PaymentVerification),
    PaymentSettled(PaymentSettlement),
    CloseOutPaymentAdjusted(CloseOutAdjustment),
    CollateralUsed(CollateralMovement),
    CollateralReleased(CollateralMovement),
    CollateralSettled(CollateralMovement),
    CollateralMarkedToMarket(CollateralRevaluation),
}

impl SettlementEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SettlementEvent::PaymentRegistered(_) => "payment_registered",
            SettlementEvent::PaymentRemoved(_) => "payment_removed",
            SettlementEvent::PaymentVerified(_) => "payment_verified",
            SettlementEvent::PaymentSettled(_) => "payment_settled",
            SettlementEvent::CloseOutPaymentAdjusted(_) => "close_out_payment_adjusted",
            SettlementEvent::CollateralUsed(_) => "collateral_used",
            SettlementEvent::CollateralReleased(_) => "collateral_released",
            SettlementEvent::CollateralSettled(_) => "collateral_settled",
            SettlementEvent::CollateralMarkedToMarket(_) => "collateral_marked_to_market",
        }
    }
}

/// Origin of an event in the source chain. Events are processed in
/// ascending order of this position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventPosition {
    pub block: u64,
    pub tx_index: u32,
    pub log_index: u32,
}

impl fmt::Display for EventPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.block, self.tx_index, self.log_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub position: EventPosition,
    pub event: SettlementEvent,
}
