use crate::accumulator::gross::GrossBalance;
use crate::core::amount::Amount;
use crate::core::currency::CurrencyCode;
use crate::core::error::Result;
use crate::core::pair::{align, CanonicalPair, Side};
use crate::core::party::PartyId;
use crate::events::{CollateralMovement, CollateralRevaluation};
use crate::ledger::key::PositionKey;
use crate::ledger::repository::{load_existing, load_or_create, Position, Repository};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Collateral held between one pair in one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralPosition {
    key: PositionKey,
    balance: GrossBalance,
}

impl CollateralPosition {
    pub fn balance(&self) -> &GrossBalance {
        &self.balance
    }

    pub fn pair(&self) -> &CanonicalPair {
        &self.key.pair
    }

    /// Settled collateral attributed to `party`, if it belongs to the pair.
    pub fn settled_for(&self, party: &PartyId) -> Option<Amount> {
        self.key.pair.side_of(party).map(|side| self.balance.settled(side))
    }

    pub fn unsettled_for(&self, party: &PartyId) -> Option<Amount> {
        self.key
            .pair
            .side_of(party)
            .map(|side| self.balance.unsettled(side))
    }
}

impl Position for CollateralPosition {
    type Key = PositionKey;

    fn zeroed(key: PositionKey) -> Self {
        Self {
            key,
            balance: GrossBalance::new(),
        }
    }

    fn key(&self) -> &PositionKey {
        &self.key
    }
}

/// Before/after view of one collateral position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrossChange {
    pub before: GrossBalance,
    pub after: GrossBalance,
    pub created: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Movement {
    Use,
    Release,
    Settle,
}

impl Movement {
    fn name(self) -> &'static str {
        match self {
            Movement::Use => "use",
            Movement::Release => "release",
            Movement::Settle => "settle",
        }
    }
}

/// Gross collateral ledger keyed by `(pair, currency)`.
///
/// Each event carries one amount per party; both are applied to the
/// canonical sides as a single unit, so a failure on either side leaves the
/// stored position untouched.
#[derive(Debug)]
pub struct CollateralPositionLedger<R> {
    repo: R,
}

impl<R: Repository<CollateralPosition>> CollateralPositionLedger<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    pub fn use_collateral(&mut self, event: &CollateralMovement) -> Result<GrossChange> {
        self.apply(event, Movement::Use)
    }

    pub fn release(&mut self, event: &CollateralMovement) -> Result<GrossChange> {
        self.apply(event, Movement::Release)
    }

    pub fn settle(&mut self, event: &CollateralMovement) -> Result<GrossChange> {
        self.apply(event, Movement::Settle)
    }

    fn apply(&mut self, event: &CollateralMovement, movement: Movement) -> Result<GrossChange> {
        let (pair, flipped) = CanonicalPair::orient(&event.party_a, &event.party_b)?;
        let (amount0, amount1) = align(flipped, event.amount0, event.amount1);
        let key = PositionKey::new(pair, event.currency.clone());

        let (mut position, created) = match movement {
            Movement::Use => {
                let fetched = load_or_create::<CollateralPosition, _>(&mut self.repo, &key)?;
                let created = fetched.was_created();
                (fetched.into_inner(), created)
            }
            Movement::Release | Movement::Settle => {
                (load_existing::<CollateralPosition, _>(&self.repo, &key)?, false)
            }
        };

        let before = position.balance;
        for (side, amount) in [(Side::Zero, amount0), (Side::One, amount1)] {
            let outcome = match movement {
                Movement::Use => position.balance.use_collateral(side, amount, event.settled),
                Movement::Release => position.balance.release(side, amount, event.settled),
                Movement::Settle => position.balance.settle(side, amount),
            };
            if let Err(err) = outcome {
                warn!("collateral {} rejected on {}: {}", movement.name(), key, err);
                return Err(err);
            }
        }

        self.repo.save(&position)?;
        if created {
            info!("collateral position created for {} ({})", key, key.pair);
        }
        debug!(
            "collateral {} on {} ({}, {}) settled={}",
            movement.name(),
            key,
            amount0,
            amount1,
            event.settled
        );
        Ok(GrossChange {
            before,
            after: position.balance,
            created,
        })
    }

    /// Revalues settled collateral on both sides; a zero current value
    /// leaves that side as it is.
    pub fn mark_to_market(&mut self, event: &CollateralRevaluation) -> Result<GrossChange> {
        let (pair, flipped) = CanonicalPair::orient(&event.party_a, &event.party_b)?;
        let (previous0, previous1) = align(flipped, event.previous0, event.previous1);
        let (current0, current1) = align(flipped, event.current0, event.current1);
        let key = PositionKey::new(pair, event.currency.clone());

        let mut position = load_existing::<CollateralPosition, _>(&self.repo, &key)?;
        let before = position.balance;
        for (side, previous, current) in [
            (Side::Zero, previous0, current0),
            (Side::One, previous1, current1),
        ] {
            match position.balance.mark_to_market(side, previous, current) {
                Ok(true) => {}
                Ok(false) => debug!("mark-to-market skipped {} of {}: zero value", side, key),
                Err(err) => {
                    warn!("mark-to-market rejected on {}: {}", key, err);
                    return Err(err);
                }
            }
        }

        self.repo.save(&position)?;
        debug!(
            "collateral on {} marked to market: settled {} / {}",
            key,
            position.balance.settled(Side::Zero),
            position.balance.settled(Side::One)
        );
        Ok(GrossChange {
            before,
            after: position.balance,
            created: false,
        })
    }

    /// Looks up the position for a pair given in either order.
    pub fn position(
        &self,
        party_a: &PartyId,
        party_b: &PartyId,
        currency: &CurrencyCode,
    ) -> Result<Option<CollateralPosition>> {
        let key = PositionKey::new(CanonicalPair::new(party_a, party_b)?, currency.clone());
        Ok(self.repo.load(&key)?)
    }
}
