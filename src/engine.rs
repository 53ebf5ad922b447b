//! Routes typed events to the ledger that owns them.
//!
//! The engine processes one event at a time through `&mut self`: load,
//! mutate and save complete before the next event is looked at. It does not
//! reorder, deduplicate or retry; the caller delivers events in origin order.

use crate::config::EngineConfig;
use crate::core::currency::CurrencyCode;
use crate::core::error::{Result, SettlementError};
use crate::core::pair::CanonicalPair;
use crate::core::party::PartyId;
use crate::events::{EventEnvelope, EventPosition, SettlementEvent};
use crate::ledger::aggregate::CurrencyAggregates;
use crate::ledger::close_out::{CloseOutLedger, CloseOutPosition};
use crate::ledger::collateral::{CollateralPosition, CollateralPositionLedger};
use crate::ledger::key::{PositionKey, SlotKey};
use crate::ledger::payment_slot::{PaymentSlotLedger, TimeSlot};
use crate::ledger::repository::{InMemoryRepository, Repository};
use chrono::NaiveDate;
use log::{error, info, warn};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    PaymentSlot,
    CloseOut,
    Collateral,
}

/// What an applied event touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub ledger: LedgerKind,
    /// Display form of the position key, e.g. `0x…/USDC/2024-01-31`.
    pub key: String,
    /// A new position was created by this event.
    pub created: bool,
}

/// A replayed event failed; nothing after it was applied.
#[derive(Debug, Error)]
#[error("event {event} at {position} failed: {source}")]
pub struct ReplayError {
    pub position: EventPosition,
    pub event: &'static str,
    #[source]
    pub source: SettlementError,
}

pub struct SettlementEngine<
    S = InMemoryRepository<TimeSlot>,
    C = InMemoryRepository<CloseOutPosition>,
    G = InMemoryRepository<CollateralPosition>,
> {
    slots: PaymentSlotLedger<S>,
    close_outs: CloseOutLedger<C>,
    collateral: CollateralPositionLedger<G>,
    slot_totals: CurrencyAggregates,
    close_out_totals: CurrencyAggregates,
}

impl SettlementEngine {
    pub fn in_memory(config: &EngineConfig) -> Self {
        Self::new(
            config,
            InMemoryRepository::new(),
            InMemoryRepository::new(),
            InMemoryRepository::new(),
        )
    }
}

impl<S, C, G> SettlementEngine<S, C, G>
where
    S: Repository<TimeSlot>,
    C: Repository<CloseOutPosition>,
    G: Repository<CollateralPosition>,
{
    pub fn new(config: &EngineConfig, slots: S, close_outs: C, collateral: G) -> Self {
        info!(
            "settlement engine started (close-out strategy: {:?})",
            config.close_out_strategy
        );
        Self {
            slots: PaymentSlotLedger::new(slots),
            close_outs: CloseOutLedger::new(close_outs, config.close_out_strategy),
            collateral: CollateralPositionLedger::new(collateral),
            slot_totals: CurrencyAggregates::new(),
            close_out_totals: CurrencyAggregates::new(),
        }
    }

    /// Applies one event. The position and the per-currency totals are
    /// updated together: the totals are checked before the position is
    /// saved, so a failing event changes neither.
    pub fn apply(&mut self, event: &SettlementEvent) -> Result<Applied> {
        let (ledger, created) = match event {
            SettlementEvent::PaymentRegistered(e) => {
                let totals = &self.slot_totals;
                let change = self
                    .slots
                    .register_with(e, |change| totals.check(&e.currency, change))?;
                self.slot_totals.apply(&e.currency, &change)?;
                (LedgerKind::PaymentSlot, change.created)
            }
            SettlementEvent::PaymentRemoved(e) => {
                let totals = &self.slot_totals;
                let change = self
                    .slots
                    .remove_with(e, |change| totals.check(&e.currency, change))?;
                self.slot_totals.apply(&e.currency, &change)?;
                (LedgerKind::PaymentSlot, false)
            }
            SettlementEvent::PaymentVerified(e) => {
                self.slots.verify_payment(e)?;
                (LedgerKind::PaymentSlot, false)
            }
            SettlementEvent::PaymentSettled(e) => {
                self.slots.confirm_settlement(e)?;
                (LedgerKind::PaymentSlot, false)
            }
            SettlementEvent::CloseOutPaymentAdjusted(e) => {
                let totals = &self.close_out_totals;
                let change = self
                    .close_outs
                    .adjust_with(e, |change| totals.check(&e.currency, change))?;
                self.close_out_totals.apply(&e.currency, &change)?;
                (LedgerKind::CloseOut, change.created)
            }
            SettlementEvent::CollateralUsed(e) => {
                let change = self.collateral.use_collateral(e)?;
                (LedgerKind::Collateral, change.created)
            }
            SettlementEvent::CollateralReleased(e) => {
                self.collateral.release(e)?;
                (LedgerKind::Collateral, false)
            }
            SettlementEvent::CollateralSettled(e) => {
                self.collateral.settle(e)?;
                (LedgerKind::Collateral, false)
            }
            SettlementEvent::CollateralMarkedToMarket(e) => {
                self.collateral.mark_to_market(e)?;
                (LedgerKind::Collateral, false)
            }
        };
        Ok(Applied {
            ledger,
            key: key_of(event)?,
            created,
        })
    }

    /// Applies envelopes in the order given, stopping at the first failure.
    /// Returns the number of events applied.
    pub fn replay<'a, I>(&mut self, envelopes: I) -> std::result::Result<usize, ReplayError>
    where
        I: IntoIterator<Item = &'a EventEnvelope>,
    {
        let mut applied = 0;
        let mut last: Option<EventPosition> = None;
        for envelope in envelopes {
            if let Some(prev) = last {
                if envelope.position <= prev {
                    warn!(
                        "event at {} delivered after {}; applying in delivery order",
                        envelope.position, prev
                    );
                }
            }
            last = Some(envelope.position);

            self.apply(&envelope.event).map_err(|source| {
                error!(
                    "event {} at {} failed: {}",
                    envelope.event.name(),
                    envelope.position,
                    source
                );
                ReplayError {
                    position: envelope.position,
                    event: envelope.event.name(),
                    source,
                }
            })?;
            applied += 1;
        }
        Ok(applied)
    }

    pub fn slots(&self) -> &PaymentSlotLedger<S> {
        &self.slots
    }

    pub fn close_outs(&self) -> &CloseOutLedger<C> {
        &self.close_outs
    }

    pub fn collateral(&self) -> &CollateralPositionLedger<G> {
        &self.collateral
    }

    /// Per-currency totals over all time slots.
    pub fn slot_totals(&self) -> &CurrencyAggregates {
        &self.slot_totals
    }

    /// Per-currency totals over all close-out positions.
    pub fn close_out_totals(&self) -> &CurrencyAggregates {
        &self.close_out_totals
    }
}

fn position_key(a: &PartyId, b: &PartyId, currency: &CurrencyCode) -> Result<String> {
    Ok(PositionKey::new(CanonicalPair::new(a, b)?, currency.clone()).to_string())
}

fn slot_key(a: &PartyId, b: &PartyId, currency: &CurrencyCode, date: NaiveDate) -> Result<String> {
    Ok(SlotKey::new(CanonicalPair::new(a, b)?, currency.clone(), date).to_string())
}

fn key_of(event: &SettlementEvent) -> Result<String> {
    match event {
        SettlementEvent::PaymentRegistered(e) | SettlementEvent::PaymentRemoved(e) => {
            slot_key(&e.party0, &e.party1, &e.currency, e.date)
        }
        SettlementEvent::PaymentVerified(e) => {
            slot_key(&e.verifier, &e.counterparty, &e.currency, e.date)
        }
        SettlementEvent::PaymentSettled(e) => {
            slot_key(&e.confirmer, &e.counterparty, &e.currency, e.date)
        }
        SettlementEvent::CloseOutPaymentAdjusted(e) => {
            position_key(&e.party0, &e.party1, &e.currency)
        }
        SettlementEvent::CollateralUsed(e)
        | SettlementEvent::CollateralReleased(e)
        | SettlementEvent::CollateralSettled(e) => position_key(&e.party_a, &e.party_b, &e.currency),
        SettlementEvent::CollateralMarkedToMarket(e) => {
            position_key(&e.party_a, &e.party_b, &e.currency)
        }
    }
}
