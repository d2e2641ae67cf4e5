mod cents;
mod rate;

pub mod helpers;
mod secret;

pub use cents::{dollars, optional_dollars, Cents, CentsConversionError, DEFAULT_CURRENCY_CODE};
pub use rate::{Rate, RateError, PPM_PER_PERCENT};
pub use secret::Secret;
