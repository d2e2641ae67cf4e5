use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

pub const DEFAULT_CURRENCY_CODE: &str = "USD";

/// Tolerance used when checking that a dollar amount has no more than two decimal places. `f64` cannot represent most
/// cent values exactly, so `4.99 * 100.0` lands a hair away from `499.0`.
const CENT_EPSILON: f64 = 1e-6;

//--------------------------------------        Cents        ---------------------------------------------------------
/// An amount of money in integer minor units (cents).
///
/// All arithmetic inside the engine happens on `Cents`. Conversion to and from decimal dollars only happens at the
/// edges of the system (request bodies and responses), via [`Cents::try_from_dollars`] and [`Cents::to_dollars`].
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Cents(i64);

macro_rules! cents_arithmetic {
    ($($trait:ident::$f:ident),+ ; $($assign:ident::$af:ident),+) => {
        $(impl $trait for Cents {
            type Output = Cents;

            fn $f(self, rhs: Cents) -> Cents {
                Cents(self.0.$f(rhs.0))
            }
        })+
        $(impl $assign for Cents {
            fn $af(&mut self, rhs: Cents) {
                self.0.$af(rhs.0)
            }
        })+
    };
}

cents_arithmetic!(Add::add, Sub::sub; AddAssign::add_assign, SubAssign::sub_assign);

impl Neg for Cents {
    type Output = Cents;

    fn neg(self) -> Cents {
        Cents(-self.0)
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Value cannot be represented in cents: {0}")]
pub struct CentsConversionError(String);

impl From<i64> for Cents {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl Display for Cents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}${}.{:02}", abs / 100, abs % 100)
    }
}

impl Cents {
    pub const ZERO: Cents = Cents(0);
    /// The largest single amount ($10,000,000.00) accepted anywhere. Sums of a handful of these stay far from overflow.
    pub const MAX_AMOUNT: Cents = Cents(1_000_000_000);

    pub fn value(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn exceeds_max_amount(&self) -> bool {
        self.0 > Self::MAX_AMOUNT.0
    }

    /// Converts a decimal dollar amount into cents.
    ///
    /// The amount must be finite, non-negative, no larger than [`Cents::MAX_AMOUNT`], and carry at most two decimal
    /// places.
    pub fn try_from_dollars(dollars: f64) -> Result<Self, CentsConversionError> {
        if !dollars.is_finite() {
            return Err(CentsConversionError(format!("{dollars} is not a finite number")));
        }
        if dollars < 0.0 {
            return Err(CentsConversionError(format!("{dollars} is negative")));
        }
        let scaled = dollars * 100.0;
        let rounded = scaled.round();
        if (scaled - rounded).abs() > CENT_EPSILON {
            return Err(CentsConversionError(format!("{dollars} has more than two decimal places")));
        }
        if rounded > Self::MAX_AMOUNT.0 as f64 {
            return Err(CentsConversionError(format!("{dollars} exceeds the maximum of {}", Self::MAX_AMOUNT)));
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok(Self(rounded as i64))
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn to_dollars(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

/// Serde adapter that renders [`Cents`] as decimal dollars, for use with `#[serde(with = "dollars")]`.
pub mod dollars {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use super::Cents;

    pub fn serialize<S: Serializer>(value: &Cents, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.to_dollars())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Cents, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Cents::try_from_dollars(value).map_err(D::Error::custom)
    }
}

/// As [`dollars`], for optional fields.
pub mod optional_dollars {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use super::Cents;

    pub fn serialize<S: Serializer>(value: &Option<Cents>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(&v.to_dollars()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Cents>, D::Error> {
        let value = Option::<f64>::deserialize(deserializer)?;
        value.map(Cents::try_from_dollars).transpose().map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[test]
    fn display() {
        assert_eq!(Cents::from(0).to_string(), "$0.00");
        assert_eq!(Cents::from(5).to_string(), "$0.05");
        assert_eq!(Cents::from(11385).to_string(), "$113.85");
        assert_eq!(Cents::from(-250).to_string(), "-$2.50");
    }

    #[test]
    fn from_dollars() {
        assert_eq!(Cents::try_from_dollars(4.99).unwrap(), Cents::from(499));
        assert_eq!(Cents::try_from_dollars(100.0).unwrap(), Cents::from(10_000));
        assert_eq!(Cents::try_from_dollars(0.1 + 0.2).unwrap(), Cents::from(30));
        assert!(Cents::try_from_dollars(-0.01).is_err());
        assert!(Cents::try_from_dollars(f64::NAN).is_err());
        assert_eq!(Cents::try_from_dollars(10_000_000.0).unwrap(), Cents::MAX_AMOUNT);
        assert!(Cents::try_from_dollars(10_000_000.01).is_err());
        assert!(Cents::try_from_dollars(9.3e16).is_err());
        assert!(Cents::from(1_000_000_001).exceeds_max_amount());
        assert!(Cents::try_from_dollars(f64::INFINITY).is_err());
        assert!(Cents::try_from_dollars(1.005).is_err());
    }

    #[test]
    fn arithmetic() {
        let mut a = Cents::from(1000);
        a += Cents::from(25);
        a -= Cents::from(5);
        assert_eq!(a, Cents::from(1020));
        assert_eq!(-a, Cents::from(-1020));
        let total: Cents = [100, 200, 300].into_iter().map(Cents::from).sum();
        assert_eq!(total, Cents::from(600));
    }

    #[derive(Serialize, Deserialize)]
    struct Priced {
        #[serde(with = "dollars")]
        price: Cents,
        #[serde(with = "optional_dollars", default)]
        tip: Option<Cents>,
    }

    #[test]
    fn dollars_serde() {
        let p: Priced = serde_json::from_str(r#"{"price": 12.34}"#).unwrap();
        assert_eq!(p.price, Cents::from(1234));
        assert!(p.tip.is_none());
        let json = serde_json::to_string(&Priced { price: Cents::from(50), tip: Some(Cents::from(500)) }).unwrap();
        assert_eq!(json, r#"{"price":0.5,"tip":5.0}"#);
        assert!(serde_json::from_str::<Priced>(r#"{"price": -1.0}"#).is_err());
    }
}
