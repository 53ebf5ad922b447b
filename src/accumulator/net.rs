use crate::accumulator::{credit, debit};
use crate::core::amount::Amount;
use crate::core::error::{Result, SettlementError};
use crate::core::pair::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Signed net exposure between the two canonical sides of a pair.
///
/// `net_payment` is the absolute difference between the sides and `flipped`
/// tells which side is ahead: `false` means side 0 has paid (or owes) at
/// least as much as side 1.
///
/// Under [`NettingStrategy::TotalsBased`] the totals are maintained and the
/// invariant `net_payment == |total0 - total1|`, `flipped == total1 > total0`
/// holds after every operation. Under [`NettingStrategy::DeltaOnly`] the
/// totals stay at zero and only `(net_payment, flipped)` is tracked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetBalance {
    total0: Amount,
    total1: Amount,
    net_payment: Amount,
    flipped: bool,
}

impl NetBalance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total0(&self) -> Amount {
        self.total0
    }

    pub fn total1(&self) -> Amount {
        self.total1
    }

    pub fn total(&self, side: Side) -> Amount {
        match side {
            Side::Zero => self.total0,
            Side::One => self.total1,
        }
    }

    pub fn net_payment(&self) -> Amount {
        self.net_payment
    }

    pub fn flipped(&self) -> bool {
        self.flipped
    }

    /// The side that owes the net payment.
    pub fn payer(&self) -> Side {
        if self.flipped {
            Side::One
        } else {
            Side::Zero
        }
    }

    /// Net from side 0's perspective: positive when side 0 is ahead.
    pub fn signed_net(&self) -> Decimal {
        if self.flipped {
            -self.net_payment.value()
        } else {
            self.net_payment.value()
        }
    }

    /// Checks the totals invariant. Only meaningful for totals-based balances.
    pub fn is_consistent(&self) -> bool {
        self.net_payment == self.total0.abs_diff(self.total1)
            && self.flipped == (self.total1 > self.total0)
    }

    fn set_totals(&mut self, total0: Amount, total1: Amount) {
        self.total0 = total0;
        self.total1 = total1;
        self.net_payment = total0.abs_diff(total1);
        self.flipped = total1 > total0;
    }
}

/// How a [`NetBalance`] absorbs increases and decreases.
///
/// `TotalsBased` is exact and is the default for every ledger. `DeltaOnly`
/// reproduces the algebra used where only `(net_payment, flipped)` is stored.
/// Its decrease is only guaranteed to match `TotalsBased` when the decreased
/// pair undoes the immediately preceding increase on a balance that was not
/// flipped and does not cancel the balance to exactly zero (that case toggles
/// `flipped`). Interleaved increases on the same key make the two diverge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NettingStrategy {
    #[default]
    TotalsBased,
    DeltaOnly,
}

impl NettingStrategy {
    pub fn keeps_totals(self) -> bool {
        matches!(self, NettingStrategy::TotalsBased)
    }

    /// Adds `delta0` to side 0 and `delta1` to side 1.
    ///
    /// # Examples
    ///
    /// ```
    /// use bilateral_settlement::accumulator::net::{NetBalance, NettingStrategy};
    /// use bilateral_settlement::core::amount::Amount;
    ///
    /// let mut balance = NetBalance::new();
    /// let strategy = NettingStrategy::TotalsBased;
    /// strategy.increase(&mut balance, Amount::from(100), Amount::from(40)).unwrap();
    /// assert_eq!(balance.net_payment(), Amount::from(60));
    /// assert!(!balance.flipped());
    ///
    /// strategy.increase(&mut balance, Amount::ZERO, Amount::from(80)).unwrap();
    /// assert_eq!(balance.net_payment(), Amount::from(20));
    /// assert!(balance.flipped());
    /// ```
    pub fn increase(self, balance: &mut NetBalance, delta0: Amount, delta1: Amount) -> Result<()> {
        match self {
            NettingStrategy::TotalsBased => {
                let total0 = credit("total0", balance.total0, delta0)?;
                let total1 = credit("total1", balance.total1, delta1)?;
                balance.set_totals(total0, total1);
            }
            NettingStrategy::DeltaOnly => {
                let shift = delta0.value() - delta1.value();
                let signed = balance.signed_net().checked_add(shift).ok_or_else(|| {
                    SettlementError::ArithmeticOverflow {
                        field: "net_payment",
                        balance: balance.net_payment,
                        added: delta0.abs_diff(delta1),
                    }
                })?;
                balance.net_payment = Amount::new(signed.abs())?;
                balance.flipped = signed.is_sign_negative() && !signed.is_zero();
            }
        }
        Ok(())
    }

    /// Removes `delta0` from side 0 and `delta1` from side 1.
    pub fn decrease(self, balance: &mut NetBalance, delta0: Amount, delta1: Amount) -> Result<()> {
        match self {
            NettingStrategy::TotalsBased => {
                let total0 = debit("total0", balance.total0, delta0)?;
                let total1 = debit("total1", balance.total1, delta1)?;
                balance.set_totals(total0, total1);
            }
            NettingStrategy::DeltaOnly => {
                let delta = delta0.abs_diff(delta1);
                // Does not consult the current flip state.
                let subtraction = delta0 >= delta1;
                let net = balance.net_payment;

                if subtraction && delta >= net {
                    balance.net_payment = debit("net_payment", delta, net)?;
                    balance.flipped = !balance.flipped;
                } else if subtraction {
                    balance.net_payment = debit("net_payment", net, delta)?;
                } else {
                    balance.net_payment = credit("net_payment", net, delta)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amt(v: u64) -> Amount {
        Amount::from(v)
    }

    #[test]
    fn test_worked_example() {
        let mut b = NetBalance::new();
        let s = NettingStrategy::TotalsBased;
        s.increase(&mut b, amt(100), amt(40)).unwrap();
        assert_eq!((b.total0(), b.total1()), (amt(100), amt(40)));
        assert_eq!(b.net_payment(), amt(60));
        assert!(!b.flipped());
        assert_eq!(b.payer(), Side::Zero);

        s.increase(&mut b, amt(0), amt(80)).unwrap();
        assert_eq!((b.total0(), b.total1()), (amt(100), amt(120)));
        assert_eq!(b.net_payment(), amt(20));
        assert!(b.flipped());
        assert_eq!(b.payer(), Side::One);
        assert!(b.is_consistent());
    }

    #[test]
    fn test_equal_totals_not_flipped() {
        let mut b = NetBalance::new();
        NettingStrategy::TotalsBased
            .increase(&mut b, amt(70), amt(70))
            .unwrap();
        assert_eq!(b.net_payment(), Amount::ZERO);
        assert!(!b.flipped());
    }

    #[test]
    fn test_totals_decrease_round_trip() {
        let s = NettingStrategy::TotalsBased;
        let mut b = NetBalance::new();
        s.increase(&mut b, amt(100), amt(40)).unwrap();
        let before = b;
        s.increase(&mut b, amt(5), amt(300)).unwrap();
        s.decrease(&mut b, amt(5), amt(300)).unwrap();
        assert_eq!(b, before);
    }

    #[test]
    fn test_totals_decrease_underflow_leaves_balance() {
        let s = NettingStrategy::TotalsBased;
        let mut b = NetBalance::new();
        s.increase(&mut b, amt(10), amt(10)).unwrap();
        let before = b;
        let err = s.decrease(&mut b, amt(5), amt(11)).unwrap_err();
        assert_eq!(
            err,
            SettlementError::ArithmeticUnderflow {
                field: "total1",
                available: amt(10),
                requested: amt(11),
            }
        );
        assert_eq!(b, before);
    }

    #[test]
    fn test_delta_only_keeps_totals_at_zero() {
        let s = NettingStrategy::DeltaOnly;
        let mut b = NetBalance::new();
        s.increase(&mut b, amt(100), amt(40)).unwrap();
        assert_eq!(b.net_payment(), amt(60));
        assert!(!b.flipped());
        assert_eq!(b.total0(), Amount::ZERO);
        s.increase(&mut b, amt(0), amt(80)).unwrap();
        assert_eq!(b.net_payment(), amt(20));
        assert!(b.flipped());
    }

    #[test]
    fn test_delta_only_matches_totals_when_undoing_last_increase() {
        let mut reference = NetBalance::new();
        let mut delta = NetBalance::new();
        for (s, b) in [
            (NettingStrategy::TotalsBased, &mut reference),
            (NettingStrategy::DeltaOnly, &mut delta),
        ] {
            s.increase(b, amt(100), amt(40)).unwrap();
            s.increase(b, amt(30), amt(10)).unwrap();
            s.decrease(b, amt(30), amt(10)).unwrap();
        }
        assert_eq!(reference.net_payment(), amt(60));
        assert_eq!(delta.net_payment(), reference.net_payment());
        assert_eq!(delta.flipped(), reference.flipped());
    }

    #[test]
    fn test_delta_only_toggles_flip_on_exact_cancel() {
        let s = NettingStrategy::DeltaOnly;
        let mut b = NetBalance::new();
        s.increase(&mut b, amt(100), amt(40)).unwrap();
        s.decrease(&mut b, amt(100), amt(40)).unwrap();
        assert_eq!(b.net_payment(), Amount::ZERO);
        assert!(b.flipped());
    }

    #[test]
    fn test_delta_only_sign_flip_branch() {
        // net 10 in favour of side 0, then remove a 30-over-0 payment.
        let s = NettingStrategy::DeltaOnly;
        let mut b = NetBalance::new();
        s.increase(&mut b, amt(10), amt(0)).unwrap();
        s.decrease(&mut b, amt(30), amt(0)).unwrap();
        assert_eq!(b.net_payment(), amt(20));
        assert!(b.flipped());
    }

    #[test]
    fn test_delta_only_diverges_after_interleaved_increase() {
        let mut reference = NetBalance::new();
        let mut delta = NetBalance::new();
        for (s, b) in [
            (NettingStrategy::TotalsBased, &mut reference),
            (NettingStrategy::DeltaOnly, &mut delta),
        ] {
            s.increase(b, amt(100), amt(40)).unwrap();
            s.increase(b, amt(0), amt(80)).unwrap();
            s.decrease(b, amt(100), amt(40)).unwrap();
        }
        // Reference: totals (0, 80) -> net 80 owed by side 1.
        assert_eq!(reference.net_payment(), amt(80));
        assert!(reference.flipped());
        // Delta-only lands on net 40 in favour of side 0.
        assert_eq!(delta.net_payment(), amt(40));
        assert!(!delta.flipped());
    }

    #[test]
    fn test_strategy_serde_names() {
        let s: NettingStrategy = serde_json::from_str("\"delta_only\"").unwrap();
        assert_eq!(s, NettingStrategy::DeltaOnly);
        assert_eq!(NettingStrategy::default(), NettingStrategy::TotalsBased);
    }
}
