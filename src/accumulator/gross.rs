use crate::accumulator::{credit, debit};
use crate::core::amount::Amount;
use crate::core::error::Result;
use crate::core::pair::Side;
use serde::{Deserialize, Serialize};

/// Gross collateral bookkeeping for a pair: settled and unsettled amounts
/// kept independently for each canonical side.
///
/// No netting happens here; each side's buckets move only through
/// [`use_collateral`](Self::use_collateral), [`release`](Self::release),
/// [`settle`](Self::settle) and [`mark_to_market`](Self::mark_to_market).
/// A failing call leaves every bucket unchanged.
///
/// # Examples
///
/// ```
/// use bilateral_settlement::accumulator::gross::GrossBalance;
/// use bilateral_settlement::core::amount::Amount;
/// use bilateral_settlement::core::pair::Side;
///
/// let mut balance = GrossBalance::new();
/// balance.use_collateral(Side::Zero, Amount::from(50), false).unwrap();
/// balance.settle(Side::Zero, Amount::from(50)).unwrap();
/// assert_eq!(balance.settled(Side::Zero), Amount::from(50));
/// assert!(balance.settle(Side::Zero, Amount::from(1)).is_err());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrossBalance {
    settled0: Amount,
    settled1: Amount,
    unsettled0: Amount,
    unsettled1: Amount,
}

impl GrossBalance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settled(&self, side: Side) -> Amount {
        match side {
            Side::Zero => self.settled0,
            Side::One => self.settled1,
        }
    }

    pub fn unsettled(&self, side: Side) -> Amount {
        match side {
            Side::Zero => self.unsettled0,
            Side::One => self.unsettled1,
        }
    }

    fn bucket_mut(&mut self, side: Side, settled: bool) -> (&'static str, &mut Amount) {
        match (side, settled) {
            (Side::Zero, true) => ("settled0", &mut self.settled0),
            (Side::One, true) => ("settled1", &mut self.settled1),
            (Side::Zero, false) => ("unsettled0", &mut self.unsettled0),
            (Side::One, false) => ("unsettled1", &mut self.unsettled1),
        }
    }

    pub fn use_collateral(&mut self, side: Side, amount: Amount, settled: bool) -> Result<()> {
        let (field, bucket) = self.bucket_mut(side, settled);
        *bucket = credit(field, *bucket, amount)?;
        Ok(())
    }

    pub fn release(&mut self, side: Side, amount: Amount, settled: bool) -> Result<()> {
        let (field, bucket) = self.bucket_mut(side, settled);
        *bucket = debit(field, *bucket, amount)?;
        Ok(())
    }

    /// Moves `amount` from the side's unsettled bucket to its settled bucket.
    pub fn settle(&mut self, side: Side, amount: Amount) -> Result<()> {
        let (unsettled_field, unsettled) = self.bucket_mut(side, false);
        let remaining = debit(unsettled_field, *unsettled, amount)?;
        let (settled_field, settled) = self.bucket_mut(side, true);
        let confirmed = credit(settled_field, *settled, amount)?;

        *self.bucket_mut(side, false).1 = remaining;
        *self.bucket_mut(side, true).1 = confirmed;
        Ok(())
    }

    /// Revalues the side's settled bucket from `previous` to `current`.
    ///
    /// A zero `current` value is ignored. Returns whether the bucket changed.
    pub fn mark_to_market(&mut self, side: Side, previous: Amount, current: Amount) -> Result<bool> {
        if current.is_zero() {
            return Ok(false);
        }
        let (field, bucket) = self.bucket_mut(side, true);
        let raised = credit(field, *bucket, current)?;
        *bucket = debit(field, raised, previous)?;
        Ok(true)
    }

    pub fn is_empty(&self) -> bool {
        [self.settled0, self.settled1, self.unsettled0, self.unsettled1]
            .iter()
            .all(Amount::is_zero)
    }
}
