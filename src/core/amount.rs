use crate::core::error::SettlementError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A non-negative quantity of one currency.
///
/// Every ledger field is an `Amount`, so a negative balance cannot be
/// represented; subtraction is only available in checked form.
///
/// # Examples
///
/// ```
/// use bilateral_settlement::core::amount::Amount;
/// use rust_decimal_macros::dec;
///
/// let a = Amount::new(dec!(100)).unwrap();
/// let b = Amount::new(dec!(40)).unwrap();
/// assert_eq!(a.abs_diff(b), Amount::new(dec!(60)).unwrap());
/// assert!(b.checked_sub(a).is_none());
/// assert!(Amount::new(dec!(-1)).is_err());
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub const ZERO: Amount = Amount(Decimal::ZERO);

    pub fn new(value: Decimal) -> Result<Self, SettlementError> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(SettlementError::NegativeAmount(value));
        }
        Ok(Self(value.abs()))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// `None` on overflow.
    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    /// `None` if the result would be negative.
    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        if rhs.0 > self.0 {
            return None;
        }
        self.0.checked_sub(rhs.0).map(Amount)
    }

    /// `|self - rhs|`.
    pub fn abs_diff(self, rhs: Amount) -> Amount {
        if self >= rhs {
            Amount(self.0 - rhs.0)
        } else {
            Amount(rhs.0 - self.0)
        }
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = SettlementError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Amount(Decimal::from(value))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_negative_rejected() {
        assert_eq!(
            Amount::new(dec!(-0.01)),
            Err(SettlementError::NegativeAmount(dec!(-0.01)))
        );
    }

    #[test]
    fn test_negative_zero_normalized() {
        let z = Amount::new(dec!(-0)).unwrap();
        assert!(z.is_zero());
        assert!(!z.value().is_sign_negative());
    }

    #[test]
    fn test_checked_sub() {
        let a = Amount::from(50);
        assert_eq!(a.checked_sub(Amount::from(50)), Some(Amount::ZERO));
        assert_eq!(a.checked_sub(Amount::from(51)), None);
    }

    #[test]
    fn test_abs_diff_symmetric() {
        let a = Amount::from(100);
        let b = Amount::from(120);
        assert_eq!(a.abs_diff(b), Amount::from(20));
        assert_eq!(b.abs_diff(a), Amount::from(20));
    }

    #[test]
    fn test_serde_validates_sign() {
        let ok: Amount = serde_json::from_str("\"12.5\"").unwrap();
        assert_eq!(ok.value(), dec!(12.5));
        assert!(serde_json::from_str::<Amount>("\"-3\"").is_err());
        assert_eq!(serde_json::to_string(&ok).unwrap(), "\"12.5\"");
    }
}
