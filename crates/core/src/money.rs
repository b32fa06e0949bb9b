use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Neg;

/// A number of units of a single currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    pub number: Decimal,
    pub currency: String,
}

impl Amount {
    pub fn new(number: Decimal, currency: impl Into<String>) -> Self {
        Amount {
            number,
            currency: currency.into(),
        }
    }

    /// True when both numbers are on the same side of zero, zero counting as positive.
    pub fn same_sign(&self, other: &Amount) -> bool {
        same_sign(self.number, other.number)
    }
}

pub fn same_sign(a: Decimal, b: Decimal) -> bool {
    (a >= Decimal::ZERO) == (b >= Decimal::ZERO)
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.number, self.currency)
    }
}

impl Neg for Amount {
    type Output = Amount;
    fn neg(self) -> Amount {
        Amount {
            number: -self.number,
            currency: self.currency,
        }
    }
}

impl Neg for &Amount {
    type Output = Amount;
    fn neg(self) -> Amount {
        Amount {
            number: -self.number,
            currency: self.currency.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn display_keeps_scale() {
        assert_eq!(Amount::new(dec!(-404.38), "CAD").to_string(), "-404.38 CAD");
        assert_eq!(Amount::new(dec!(4000), "USD").to_string(), "4000 USD");
    }

    #[test]
    fn negation() {
        let a = Amount::new(dec!(12.50), "USD");
        assert_eq!(-&a, Amount::new(dec!(-12.50), "USD"));
        assert_eq!(-(-a.clone()), a);
    }

    #[test]
    fn equality_ignores_scale() {
        assert_eq!(Amount::new(dec!(500), "USD"), Amount::new(dec!(500.00), "USD"));
    }

    #[test]
    fn same_sign_treats_zero_as_positive() {
        assert!(same_sign(dec!(0), dec!(3)));
        assert!(same_sign(dec!(-1), dec!(-3)));
        assert!(!same_sign(dec!(0), dec!(-3)));
    }
}
