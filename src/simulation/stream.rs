//! Random event streams for replay testing and benchmarks.
//!
//! The generator keeps a shadow copy of every position it touches, so each
//! removal, decrease, release, settlement or revaluation only consumes what
//! earlier events put there. A generated stream replays without error
//! through an engine using the totals-based close-out strategy.

use crate::accumulator::gross::GrossBalance;
use crate::accumulator::net::{NetBalance, NettingStrategy};
use crate::core::amount::Amount;
use crate::core::currency::CurrencyCode;
use crate::core::pair::{align, CanonicalPair, Side};
use crate::core::party::PartyId;
use crate::events::{
    CloseOutAdjustment, CollateralMovement, CollateralRevaluation, EventEnvelope, EventPosition,
    PaymentSettlement, PaymentSlotEvent, PaymentVerification, SettlementEvent,
};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use log::{debug, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use std::collections::BTreeMap;

/// Shape of a generated event stream.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Number of distinct counterparty pairs.
    pub pair_count: usize,
    pub event_count: usize,
    pub currencies: Vec<CurrencyCode>,
    /// Smallest generated payment or collateral amount, in whole units.
    pub min_amount: u64,
    pub max_amount: u64,
    /// Payments are spread over this many days from `start_date`.
    pub slot_days: u32,
    pub start_date: NaiveDate,
    /// Fixed seed for a reproducible stream; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            pair_count: 8,
            event_count: 200,
            currencies: vec![CurrencyCode::new("USD"), CurrencyCode::new("ETH")],
            min_amount: 1,
            max_amount: 1_000,
            slot_days: 5,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
            seed: None,
        }
    }
}

/// Events per block in generated positions.
const EVENTS_PER_BLOCK: usize = 8;

#[derive(Debug, Clone, Copy)]
enum Kind {
    Register,
    Remove,
    Verify,
    Confirm,
    IncreaseCloseOut,
    DecreaseCloseOut,
    UseCollateral,
    ReleaseCollateral,
    SettleCollateral,
    Revalue,
}

const WEIGHTS: [(Kind, u32); 10] = [
    (Kind::Register, 6),
    (Kind::Remove, 2),
    (Kind::Verify, 1),
    (Kind::Confirm, 1),
    (Kind::IncreaseCloseOut, 4),
    (Kind::DecreaseCloseOut, 2),
    (Kind::UseCollateral, 3),
    (Kind::ReleaseCollateral, 1),
    (Kind::SettleCollateral, 1),
    (Kind::Revalue, 1),
];

enum Stage {
    Open,
    Verified {
        proof: String,
        verifier: PartyId,
        counterparty: PartyId,
    },
    Settled,
}

/// Shadow of a net position: its balance plus the entries still outstanding,
/// in canonical side order.
struct NetTrack {
    balance: NetBalance,
    entries: Vec<(Amount, Amount)>,
}

impl NetTrack {
    fn new() -> Self {
        Self {
            balance: NetBalance::new(),
            entries: Vec::new(),
        }
    }
}

struct SlotTrack {
    net: NetTrack,
    stage: Stage,
}

type SlotIndex = (usize, usize, NaiveDate);
type PositionIndex = (usize, usize);

struct Generator<'a> {
    config: &'a StreamConfig,
    rng: StdRng,
    pairs: Vec<CanonicalPair>,
    slots: BTreeMap<SlotIndex, SlotTrack>,
    close_outs: BTreeMap<PositionIndex, NetTrack>,
    collateral: BTreeMap<PositionIndex, GrossBalance>,
}

/// Generates a valid, position-ordered event stream.
///
/// Returns an empty stream when the config has no pairs or no currencies.
pub fn generate_event_stream(config: &StreamConfig) -> Vec<EventEnvelope> {
    if config.pair_count == 0 || config.currencies.is_empty() {
        warn!("stream config has no pairs or no currencies; nothing generated");
        return Vec::new();
    }

    let rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut generator = Generator::new(config, rng);

    let events: Vec<EventEnvelope> = (0..config.event_count)
        .map(|i| EventEnvelope {
            position: EventPosition {
                block: 1 + (i / EVENTS_PER_BLOCK) as u64,
                tx_index: (i % EVENTS_PER_BLOCK) as u32,
                log_index: 0,
            },
            event: generator.next_event(),
        })
        .collect();

    debug!(
        "generated {} events over {} pairs and {} currencies",
        events.len(),
        generator.pairs.len(),
        config.currencies.len()
    );
    events
}

impl<'a> Generator<'a> {
    fn new(config: &'a StreamConfig, mut rng: StdRng) -> Self {
        let parties: Vec<PartyId> = (0..=config.pair_count)
            .map(|_| PartyId::new(format!("0x{:040x}", rng.gen::<u128>())))
            .collect();
        let pairs = parties
            .windows(2)
            .filter_map(|w| CanonicalPair::new(&w[0], &w[1]).ok())
            .collect();

        Self {
            config,
            rng,
            pairs,
            slots: BTreeMap::new(),
            close_outs: BTreeMap::new(),
            collateral: BTreeMap::new(),
        }
    }

    fn next_event(&mut self) -> SettlementEvent {
        let kind = self.pick_kind();
        let event = match kind {
            Kind::Register => self.register(),
            Kind::Remove => self.remove(),
            Kind::Verify => self.verify(),
            Kind::Confirm => self.confirm(),
            Kind::IncreaseCloseOut => None,
            Kind::DecreaseCloseOut => self.decrease_close_out(),
            Kind::UseCollateral => Some(self.use_collateral()),
            Kind::ReleaseCollateral => self.release_collateral(),
            Kind::SettleCollateral => self.settle_collateral(),
            Kind::Revalue => self.revalue(),
        };
        // Increasing a close-out position is always possible.
        event.unwrap_or_else(|| self.increase_close_out())
    }

    fn pick_kind(&mut self) -> Kind {
        let total: u32 = WEIGHTS.iter().map(|(_, w)| w).sum();
        let mut roll = self.rng.gen_range(0..total);
        for (kind, weight) in WEIGHTS {
            if roll < weight {
                return kind;
            }
            roll -= weight;
        }
        Kind::IncreaseCloseOut
    }

    fn amount(&mut self) -> Amount {
        let lo = self.config.min_amount.min(self.config.max_amount);
        let hi = self.config.min_amount.max(self.config.max_amount);
        Amount::from(self.rng.gen_range(lo..=hi))
    }

    /// One or both sides pay.
    fn amounts(&mut self) -> (Amount, Amount) {
        match self.rng.gen_range(0..3) {
            0 => (self.amount(), Amount::ZERO),
            1 => (Amount::ZERO, self.amount()),
            _ => (self.amount(), self.amount()),
        }
    }

    /// A random share of `available`, never more.
    fn portion(&mut self, available: Amount) -> Amount {
        let units = available.value().trunc().to_u64().unwrap_or(0);
        Amount::from(self.rng.gen_range(0..=units))
    }

    fn pick<K: Copy>(&mut self, candidates: Vec<K>) -> Option<K> {
        if candidates.is_empty() {
            return None;
        }
        Some(candidates[self.rng.gen_range(0..candidates.len())])
    }

    fn position_index(&mut self) -> PositionIndex {
        (
            self.rng.gen_range(0..self.pairs.len()),
            self.rng.gen_range(0..self.config.currencies.len()),
        )
    }

    /// Parties of a pair in a random caller order, with the flip flag.
    fn caller_order(&mut self, pair: usize) -> (PartyId, PartyId, bool) {
        let swap = self.rng.gen_bool(0.5);
        let pair = &self.pairs[pair];
        let (a, b) = align(swap, pair.side0().clone(), pair.side1().clone());
        (a, b, swap)
    }

    fn timestamp(&mut self, date: NaiveDate) -> DateTime<Utc> {
        let start = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
        start + Duration::minutes(self.rng.gen_range(0..24 * 60))
    }

    fn slot_event(
        &mut self,
        (pair, currency, date): SlotIndex,
        amount0: Amount,
        amount1: Amount,
    ) -> PaymentSlotEvent {
        let (party0, party1, swap) = self.caller_order(pair);
        let (payment0, payment1) = align(swap, amount0, amount1);
        PaymentSlotEvent {
            party0,
            party1,
            currency: self.config.currencies[currency].clone(),
            payment0,
            payment1,
            date,
        }
    }

    fn register(&mut self) -> Option<SettlementEvent> {
        let (pair, currency) = self.position_index();
        let offset = self.rng.gen_range(0..self.config.slot_days.max(1));
        let date = self.config.start_date + Duration::days(i64::from(offset));
        let (amount0, amount1) = self.amounts();

        let slot = self.slots.entry((pair, currency, date)).or_insert_with(|| SlotTrack {
            net: NetTrack::new(),
            stage: Stage::Open,
        });
        if !matches!(slot.stage, Stage::Open) {
            return None;
        }
        NettingStrategy::TotalsBased
            .increase(&mut slot.net.balance, amount0, amount1)
            .ok()?;
        slot.net.entries.push((amount0, amount1));

        let event = self.slot_event((pair, currency, date), amount0, amount1);
        Some(SettlementEvent::PaymentRegistered(event))
    }

    fn remove(&mut self) -> Option<SettlementEvent> {
        let candidates = self
            .slots
            .iter()
            .filter(|(_, s)| matches!(s.stage, Stage::Open) && !s.net.entries.is_empty())
            .map(|(k, _)| *k)
            .collect();
        let index = self.pick(candidates)?;

        let entry = self.rng.gen_range(0..self.slots[&index].net.entries.len());
        let slot = self.slots.get_mut(&index)?;
        let (amount0, amount1) = slot.net.entries.swap_remove(entry);
        NettingStrategy::TotalsBased
            .decrease(&mut slot.net.balance, amount0, amount1)
            .ok()?;

        let event = self.slot_event(index, amount0, amount1);
        Some(SettlementEvent::PaymentRemoved(event))
    }

    fn verify(&mut self) -> Option<SettlementEvent> {
        let candidates = self
            .slots
            .iter()
            .filter(|(_, s)| matches!(s.stage, Stage::Open) && !s.net.balance.net_payment().is_zero())
            .map(|(k, _)| *k)
            .collect();
        let index @ (pair, currency, date) = self.pick(candidates)?;

        let proof = format!("0x{:032x}{:032x}", self.rng.gen::<u128>(), self.rng.gen::<u128>());
        let timestamp = self.timestamp(date);
        let slot = self.slots.get_mut(&index)?;
        let payer = slot.net.balance.payer();
        let verifier = self.pairs[pair].party(payer).clone();
        let counterparty = self.pairs[pair].party(payer.other()).clone();
        let amount = slot.net.balance.net_payment();
        slot.stage = Stage::Verified {
            proof: proof.clone(),
            verifier: verifier.clone(),
            counterparty: counterparty.clone(),
        };

        Some(SettlementEvent::PaymentVerified(PaymentVerification {
            verifier,
            counterparty,
            currency: self.config.currencies[currency].clone(),
            date,
            amount,
            proof,
            timestamp,
        }))
    }

    fn confirm(&mut self) -> Option<SettlementEvent> {
        let candidates = self
            .slots
            .iter()
            .filter(|(_, s)| matches!(s.stage, Stage::Verified { .. }))
            .map(|(k, _)| *k)
            .collect();
        let index @ (_, currency, date) = self.pick(candidates)?;

        let timestamp = self.timestamp(date);
        let slot = self.slots.get_mut(&index)?;
        let Stage::Verified {
            proof,
            verifier,
            counterparty,
        } = std::mem::replace(&mut slot.stage, Stage::Settled)
        else {
            return None;
        };

        Some(SettlementEvent::PaymentSettled(PaymentSettlement {
            confirmer: counterparty,
            counterparty: verifier,
            currency: self.config.currencies[currency].clone(),
            date,
            proof,
            timestamp,
        }))
    }

    fn close_out_event(
        &mut self,
        (pair, currency): PositionIndex,
        amount0: Amount,
        amount1: Amount,
        is_increase: bool,
    ) -> SettlementEvent {
        let (party0, party1, swap) = self.caller_order(pair);
        let (payment0, payment1) = align(swap, amount0, amount1);
        SettlementEvent::CloseOutPaymentAdjusted(CloseOutAdjustment {
            party0,
            party1,
            currency: self.config.currencies[currency].clone(),
            payment0,
            payment1,
            is_increase,
        })
    }

    fn increase_close_out(&mut self) -> SettlementEvent {
        let index = self.position_index();
        let (amount0, amount1) = self.amounts();
        let track = self.close_outs.entry(index).or_insert_with(NetTrack::new);
        if NettingStrategy::TotalsBased
            .increase(&mut track.balance, amount0, amount1)
            .is_ok()
        {
            track.entries.push((amount0, amount1));
        }
        self.close_out_event(index, amount0, amount1, true)
    }

    fn decrease_close_out(&mut self) -> Option<SettlementEvent> {
        let candidates = self
            .close_outs
            .iter()
            .filter(|(_, t)| !t.entries.is_empty())
            .map(|(k, _)| *k)
            .collect();
        let index = self.pick(candidates)?;

        let entry = self.rng.gen_range(0..self.close_outs[&index].entries.len());
        let track = self.close_outs.get_mut(&index)?;
        let (amount0, amount1) = track.entries.swap_remove(entry);
        NettingStrategy::TotalsBased
            .decrease(&mut track.balance, amount0, amount1)
            .ok()?;
        Some(self.close_out_event(index, amount0, amount1, false))
    }

    fn movement(
        &mut self,
        (pair, currency): PositionIndex,
        amount0: Amount,
        amount1: Amount,
        settled: bool,
    ) -> CollateralMovement {
        let (party_a, party_b, swap) = self.caller_order(pair);
        let (amount0, amount1) = align(swap, amount0, amount1);
        CollateralMovement {
            party_a,
            party_b,
            currency: self.config.currencies[currency].clone(),
            amount0,
            amount1,
            settled,
        }
    }

    fn use_collateral(&mut self) -> SettlementEvent {
        let index = self.position_index();
        let (amount0, amount1) = self.amounts();
        let settled = self.rng.gen_bool(0.5);
        let balance = self.collateral.entry(index).or_default();
        for (side, amount) in [(Side::Zero, amount0), (Side::One, amount1)] {
            if balance.use_collateral(side, amount, settled).is_err() {
                warn!("shadow collateral overflow on {:?}", index);
            }
        }
        SettlementEvent::CollateralUsed(self.movement(index, amount0, amount1, settled))
    }

    fn release_collateral(&mut self) -> Option<SettlementEvent> {
        let candidates = self
            .collateral
            .iter()
            .filter(|(_, b)| !b.is_empty())
            .map(|(k, _)| *k)
            .collect();
        let index = self.pick(candidates)?;

        let settled = self.rng.gen_bool(0.5);
        let balance = self.collateral[&index];
        let bucket = |side| {
            if settled {
                balance.settled(side)
            } else {
                balance.unsettled(side)
            }
        };
        let amount0 = self.portion(bucket(Side::Zero));
        let amount1 = self.portion(bucket(Side::One));

        let balance = self.collateral.get_mut(&index)?;
        balance.release(Side::Zero, amount0, settled).ok()?;
        balance.release(Side::One, amount1, settled).ok()?;
        Some(SettlementEvent::CollateralReleased(
            self.movement(index, amount0, amount1, settled),
        ))
    }

    fn settle_collateral(&mut self) -> Option<SettlementEvent> {
        let candidates = self
            .collateral
            .iter()
            .filter(|(_, b)| !b.unsettled(Side::Zero).is_zero() || !b.unsettled(Side::One).is_zero())
            .map(|(k, _)| *k)
            .collect();
        let index = self.pick(candidates)?;

        let balance = self.collateral[&index];
        let amount0 = self.portion(balance.unsettled(Side::Zero));
        let amount1 = self.portion(balance.unsettled(Side::One));

        let balance = self.collateral.get_mut(&index)?;
        balance.settle(Side::Zero, amount0).ok()?;
        balance.settle(Side::One, amount1).ok()?;
        Some(SettlementEvent::CollateralSettled(
            self.movement(index, amount0, amount1, false),
        ))
    }

    fn revalue(&mut self) -> Option<SettlementEvent> {
        let candidates = self
            .collateral
            .iter()
            .filter(|(_, b)| !b.settled(Side::Zero).is_zero() || !b.settled(Side::One).is_zero())
            .map(|(k, _)| *k)
            .collect();
        let index @ (pair, currency) = self.pick(candidates)?;

        let balance = self.collateral[&index];
        let previous0 = balance.settled(Side::Zero);
        let previous1 = balance.settled(Side::One);
        // A zero present value leaves that side untouched.
        let mut current = || {
            if self.rng.gen_bool(0.2) {
                Amount::ZERO
            } else {
                self.amount()
            }
        };
        let current0 = current();
        let current1 = current();

        let balance = self.collateral.get_mut(&index)?;
        balance.mark_to_market(Side::Zero, previous0, current0).ok()?;
        balance.mark_to_market(Side::One, previous1, current1).ok()?;

        let (party_a, party_b, swap) = self.caller_order(pair);
        let (previous0, previous1) = align(swap, previous0, previous1);
        let (current0, current1) = align(swap, current0, current1);
        Some(SettlementEvent::CollateralMarkedToMarket(CollateralRevaluation {
            party_a,
            party_b,
            currency: self.config.currencies[currency].clone(),
            previous0,
            previous1,
            current0,
            current1,
        }))
    }
}
