//! # Fixed-Point Helpers
//!
//! All vault accounting is `a * b / d` in one costume or another: USD
//! valuation (`amount * price / 10^decimals`), share conversion
//! (`value * precision / price`), pro-rata payouts
//! (`holding * shares / supply`), and bps fees. This module is the one
//! place that product gets computed, with overflow handled instead of
//! wrapped.

/// Greatest common divisor (Euclid).
fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a.max(1)
}

/// Floor of `a * b / d`, or `None` if `d == 0` or the reduced product
/// still overflows `u128`.
///
/// The operands are reduced by their common factors with `d` before
/// multiplying. Pro-rata ratios (shares over supply, weights over 100)
/// share large factors with their denominators, so the reduction keeps the
/// realistic cases both exact and in range; a product that overflows after
/// reduction is an error surfaced to the caller, never a wrap.
pub fn mul_div(a: u128, b: u128, d: u128) -> Option<u128> {
    if d == 0 {
        return None;
    }

    let g = gcd(a, d);
    let (a, d) = (a / g, d / g);
    let g = gcd(b, d);
    let (b, d) = (b / g, d / g);

    a.checked_mul(b).map(|product| product / d)
}

/// Floor of `amount * bps / 10_000`. Saturates on overflow: a fee capped
/// at `u128::MAX` charges the maximum, never less than owed by wrapping.
pub fn bps_of(amount: u128, bps: u16) -> u128 {
    mul_div(amount, bps as u128, crate::config::BPS_DENOMINATOR).unwrap_or(u128::MAX)
}
