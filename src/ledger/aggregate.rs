use crate::accumulator::net::NetBalance;
use crate::accumulator::{credit, debit};
use crate::core::amount::Amount;
use crate::core::currency::CurrencyCode;
use crate::core::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Before/after view of one net position, returned by the net ledgers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetChange {
    pub before: NetBalance,
    pub after: NetBalance,
    /// The position did not exist before this change.
    pub created: bool,
}

impl NetChange {
    fn gross(balance: &NetBalance) -> Result<Amount> {
        credit("gross_payment", balance.total0(), balance.total1())
    }
}

/// Running totals over every position of one ledger in one currency.
///
/// Invariant: `gross_payment` is the sum of `total0 + total1` and
/// `net_payment` the sum of `net_payment` across those positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyAggregate {
    gross_payment: Amount,
    net_payment: Amount,
    positions: u64,
}

impl CurrencyAggregate {
    pub fn gross_payment(&self) -> Amount {
        self.gross_payment
    }

    pub fn net_payment(&self) -> Amount {
        self.net_payment
    }

    pub fn positions(&self) -> u64 {
        self.positions
    }

    /// Liquidity saved by netting: `gross - net`.
    pub fn savings(&self) -> Amount {
        self.gross_payment
            .checked_sub(self.net_payment)
            .unwrap_or(Amount::ZERO)
    }

    pub fn apply(&mut self, change: &NetChange) -> Result<()> {
        let gross = debit(
            "gross_payment",
            self.gross_payment,
            NetChange::gross(&change.before)?,
        )?;
        let gross = credit("gross_payment", gross, NetChange::gross(&change.after)?)?;
        let net = debit("net_payment", self.net_payment, change.before.net_payment())?;
        let net = credit("net_payment", net, change.after.net_payment())?;

        self.gross_payment = gross;
        self.net_payment = net;
        if change.created {
            self.positions += 1;
        }
        Ok(())
    }
}

/// Per-currency aggregates for one ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyAggregates {
    by_currency: BTreeMap<CurrencyCode, CurrencyAggregate>,
}

impl CurrencyAggregates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, currency: &CurrencyCode, change: &NetChange) -> Result<()> {
        let mut aggregate = self.get(currency);
        aggregate.apply(change)?;
        self.by_currency.insert(currency.clone(), aggregate);
        Ok(())
    }

    /// Fails exactly when [`apply`](Self::apply) would, without changing
    /// anything.
    pub fn check(&self, currency: &CurrencyCode, change: &NetChange) -> Result<()> {
        self.get(currency).apply(change)
    }

    pub fn get(&self, currency: &CurrencyCode) -> CurrencyAggregate {
        self.by_currency.get(currency).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CurrencyCode, &CurrencyAggregate)> {
        self.by_currency.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::net::NettingStrategy;

    fn change(before: NetBalance, d0: u64, d1: u64, increase: bool) -> NetChange {
        let mut after = before;
        let s = NettingStrategy::TotalsBased;
        if increase {
            s.increase(&mut after, Amount::from(d0), Amount::from(d1)).unwrap();
        } else {
            s.decrease(&mut after, Amount::from(d0), Amount::from(d1)).unwrap();
        }
        NetChange {
            before,
            after,
            created: before == NetBalance::new() && increase,
        }
    }

    #[test]
    fn test_aggregate_tracks_gross_and_net() {
        let usd = CurrencyCode::new("USD");
        let mut totals = CurrencyAggregates::new();

        let first = change(NetBalance::new(), 100, 40, true);
        totals.apply(&usd, &first).unwrap();
        let second = change(first.after, 0, 80, true);
        totals.apply(&usd, &second).unwrap();

        let agg = totals.get(&usd);
        assert_eq!(agg.gross_payment(), Amount::from(220));
        assert_eq!(agg.net_payment(), Amount::from(20));
        assert_eq!(agg.savings(), Amount::from(200));
        assert_eq!(agg.positions(), 1);

        let third = change(second.after, 100, 40, false);
        totals.apply(&usd, &third).unwrap();
        let agg = totals.get(&usd);
        assert_eq!(agg.gross_payment(), Amount::from(80));
        assert_eq!(agg.net_payment(), Amount::from(80));
    }

    #[test]
    fn test_currencies_are_independent() {
        let mut totals = CurrencyAggregates::new();
        totals
            .apply(&CurrencyCode::new("ETH"), &change(NetBalance::new(), 5, 0, true))
            .unwrap();
        assert_eq!(totals.get(&CurrencyCode::new("FIL")), CurrencyAggregate::default());
        assert_eq!(totals.iter().count(), 1);
    }

    #[test]
    fn test_check_does_not_mutate() {
        let usd = CurrencyCode::new("USD");
        let mut totals = CurrencyAggregates::new();
        let first = change(NetBalance::new(), 5, 0, true);
        totals.check(&usd, &first).unwrap();
        assert_eq!(totals.iter().count(), 0);

        // removing more than was ever added underflows the aggregate
        let bogus = NetChange {
            before: first.after,
            after: NetBalance::new(),
            created: false,
        };
        assert!(totals.check(&usd, &bogus).is_err());
    }
}
