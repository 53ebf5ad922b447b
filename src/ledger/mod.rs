//! Ledger adapters binding the accumulators to stored positions.
//!
//! - **payment_slot** — net payments per pair, currency and calendar day
//! - **close_out** — net close-out payments per pair and currency
//! - **collateral** — gross settled/unsettled collateral per pair and currency
//! - **aggregate** — per-currency totals over a net ledger
//! - **repository** — load/create/save contract and an in-memory store

pub mod aggregate;
pub mod close_out;
pub mod collateral;
pub mod key;
pub mod payment_slot;
pub mod repository;
