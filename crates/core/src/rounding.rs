//! Decimal rounding of binary floating point values.
//!
//! Prices are accumulated as `f64` and rounded at the end. Rounding works on
//! the exact binary value of the float (not on its shortest decimal
//! rendering), with ties going to the even digit. `2.675` is stored as
//! `2.67499999…` and therefore rounds to `2.67`; `0.125` is an exact tie and
//! rounds to `0.12`.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

/// Round `value` to `dp` decimal places, nearest with ties to even.
///
/// Non-finite or out-of-range inputs are returned unchanged.
pub fn round_half_even(value: f64, dp: u32) -> f64 {
    let Some(exact) = Decimal::from_f64_retain(value) else {
        return value;
    };
    exact
        .round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven)
        .to_f64()
        .unwrap_or(value)
}

/// Convert a stored decimal amount into the float domain used by pricing.
pub fn decimal_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// Convert a computed float amount back into a 2-place decimal for storage.
pub fn f64_to_money(value: f64) -> Option<Decimal> {
    Decimal::from_f64(round_half_even(value, 2)).map(|d| d.round_dp(2))
}
