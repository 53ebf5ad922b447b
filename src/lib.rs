//! # bilateral-settlement
//!
//! Bilateral net settlement engine for two-party obligations.
//!
//! Every pair of counterparties is reduced to a canonical, order-independent
//! identity. Payments are netted incrementally per pair and currency (and,
//! for time slots, per calendar day), while collateral is tracked gross as
//! settled and unsettled amounts per side.
//!
//! ## Architecture
//!
//! - **core** — Parties, currencies, amounts, canonical pairs, errors
//! - **accumulator** — Net and gross balance algebra
//! - **ledger** — Time-slot, close-out and collateral ledgers over a repository
//! - **events** — Typed event parameters and their origin positions
//! - **engine** — Routes events to ledgers and keeps per-currency totals
//! - **config** — Engine settings loaded from JSON
//! - **simulation** — Seeded random event streams

pub mod accumulator;
pub mod config;
pub mod core;
pub mod engine;
pub mod events;
pub mod ledger;
pub mod simulation;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::accumulator::gross::GrossBalance;
    pub use crate::accumulator::net::{NetBalance, NettingStrategy};
    pub use crate::config::EngineConfig;
    pub use crate::core::amount::Amount;
    pub use crate::core::currency::CurrencyCode;
    pub use crate::core::error::{Result, SettlementError};
    pub use crate::core::pair::{CanonicalPair, PairId, Side};
    pub use crate::core::party::PartyId;
    pub use crate::engine::{Applied, LedgerKind, ReplayError, SettlementEngine};
    pub use crate::events::{EventEnvelope, EventPosition, SettlementEvent};
}
