use crate::accumulator::net::{NetBalance, NettingStrategy};
use crate::core::currency::CurrencyCode;
use crate::core::error::Result;
use crate::core::pair::{align, CanonicalPair};
use crate::core::party::PartyId;
use crate::events::CloseOutAdjustment;
use crate::ledger::aggregate::NetChange;
use crate::ledger::key::PositionKey;
use crate::ledger::repository::{load_existing, load_or_create, Position, Repository};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Close-out netting exposure of one pair in one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseOutPosition {
    key: PositionKey,
    balance: NetBalance,
}

impl CloseOutPosition {
    pub fn balance(&self) -> &NetBalance {
        &self.balance
    }

    pub fn pair(&self) -> &CanonicalPair {
        &self.key.pair
    }

    /// Canonical side 0, bound when the position was created.
    pub fn address0(&self) -> &PartyId {
        self.key.pair.side0()
    }

    pub fn address1(&self) -> &PartyId {
        self.key.pair.side1()
    }
}

impl Position for CloseOutPosition {
    type Key = PositionKey;

    fn zeroed(key: PositionKey) -> Self {
        Self {
            key,
            balance: NetBalance::new(),
        }
    }

    fn key(&self) -> &PositionKey {
        &self.key
    }
}

/// Net close-out payments per `(pair, currency)`.
///
/// The netting algebra is configurable. `TotalsBased` is the default;
/// `DeltaOnly` is only sound when every decrease undoes the matching
/// increase with no other increase on the same key in between.
#[derive(Debug)]
pub struct CloseOutLedger<R> {
    repo: R,
    strategy: NettingStrategy,
}

impl<R: Repository<CloseOutPosition>> CloseOutLedger<R> {
    pub fn new(repo: R, strategy: NettingStrategy) -> Self {
        Self { repo, strategy }
    }

    pub fn strategy(&self) -> NettingStrategy {
        self.strategy
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Applies a close-out adjustment. An increase creates the position on
    /// first use; a decrease requires it to exist.
    pub fn adjust(&mut self, event: &CloseOutAdjustment) -> Result<NetChange> {
        self.adjust_with(event, |_| Ok(()))
    }

    /// Like [`adjust`](Self::adjust), running `check` on the change before
    /// it is saved. An error from `check` leaves the position untouched.
    pub fn adjust_with<F>(&mut self, event: &CloseOutAdjustment, check: F) -> Result<NetChange>
    where
        F: FnOnce(&NetChange) -> Result<()>,
    {
        let (pair, flipped) = CanonicalPair::orient(&event.party0, &event.party1)?;
        let (delta0, delta1) = align(flipped, event.payment0, event.payment1);
        let key = PositionKey::new(pair, event.currency.clone());

        let (mut position, created) = if event.is_increase {
            let fetched = load_or_create::<CloseOutPosition, _>(&mut self.repo, &key)?;
            let created = fetched.was_created();
            (fetched.into_inner(), created)
        } else {
            (load_existing::<CloseOutPosition, _>(&self.repo, &key)?, false)
        };

        let before = position.balance;
        let outcome = if event.is_increase {
            self.strategy.increase(&mut position.balance, delta0, delta1)
        } else {
            self.strategy.decrease(&mut position.balance, delta0, delta1)
        };
        if let Err(err) = outcome {
            warn!("close-out adjustment rejected on {}: {}", key, err);
            return Err(err);
        }
        let change = NetChange {
            before,
            after: position.balance,
            created,
        };
        check(&change)?;

        self.repo.save(&position)?;
        if created {
            info!("close-out position created for {} ({})", key, key.pair);
        }
        debug!(
            "close-out {} {} ({}, {}): net {} flipped {}",
            key,
            if event.is_increase { "increase" } else { "decrease" },
            delta0,
            delta1,
            position.balance.net_payment(),
            position.balance.flipped()
        );
        Ok(change)
    }

    /// Looks up the position for a pair given in either order.
    pub fn position(
        &self,
        party0: &PartyId,
        party1: &PartyId,
        currency: &CurrencyCode,
    ) -> Result<Option<CloseOutPosition>> {
        let key = PositionKey::new(CanonicalPair::new(party0, party1)?, currency.clone());
        Ok(self.repo.load(&key)?)
    }
}
