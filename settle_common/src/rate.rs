use std::fmt::Display;

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::Cents;

pub const PPM_PER_PERCENT: i64 = 10_000;
const PPM_ONE: i64 = 1_000_000;

/// A percentage, stored as an integer number of parts-per-million. 10.25% is `Rate(102_500)`.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Rate(i64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateError {
    #[error("Rate must be a finite number, got {0}")]
    NotFinite(String),
    #[error("Rate must lie between 0% and 100%, got {0}%")]
    OutOfRange(String),
}

impl Rate {
    pub const fn from_ppm(ppm: u32) -> Self {
        Self(ppm as i64)
    }

    pub fn from_percent(percent: f64) -> Result<Self, RateError> {
        if !percent.is_finite() {
            return Err(RateError::NotFinite(percent.to_string()));
        }
        if !(0.0..=100.0).contains(&percent) {
            return Err(RateError::OutOfRange(percent.to_string()));
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
        let ppm = (percent * PPM_PER_PERCENT as f64).round() as i64;
        Ok(Self(ppm))
    }

    pub fn ppm(&self) -> i64 {
        self.0
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn as_percent(&self) -> f64 {
        self.0 as f64 / PPM_PER_PERCENT as f64
    }

    /// Applies the rate to an amount, rounding half away from zero to the nearest cent.
    pub fn apply_to(&self, amount: Cents) -> Cents {
        let magnitude = i128::from(amount.value()).abs() * i128::from(self.0);
        let rounded = (magnitude + i128::from(PPM_ONE / 2)) / i128::from(PPM_ONE);
        #[allow(clippy::cast_possible_truncation)]
        let rounded = rounded as i64;
        if amount.is_negative() {
            Cents::from(-rounded)
        } else {
            Cents::from(rounded)
        }
    }
}

impl Display for Rate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let whole = self.0 / PPM_PER_PERCENT;
        let frac = self.0 % PPM_PER_PERCENT;
        if frac == 0 {
            write!(f, "{whole}%")
        } else {
            let frac = format!("{frac:04}");
            write!(f, "{whole}.{}%", frac.trim_end_matches('0'))
        }
    }
}
