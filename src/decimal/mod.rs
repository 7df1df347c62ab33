//! Canonical decimal arithmetic used at every boundary the core crosses.
//!
//! `rust_decimal::Decimal` is the wire type (add/sub/mul/div, ordering,
//! and serde's string-shaped JSON encoding come for free from the crate,
//! the same way the teacher uses it throughout `services::matching`).
//! This module adds the two things `rust_decimal` doesn't give us: a
//! canonical string round-trip at `DECIMAL_PRECISION`, and a numerically
//! stable `ln`/`exp` pair for the LMSR cost function in
//! `services::lmsr`.

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

use crate::error::EngineError;

/// Fallback precision for call sites that don't carry an explicit
/// `DECIMAL_PRECISION` from config (e.g. internal aggregation code that
/// runs off the hot path). Matches the config default in `config.rs`.
pub const DEFAULT_PRECISION: u32 = 18;

/// Parse a decimal string exactly as it will be re-serialized: reject
/// anything `Decimal::from_str` itself would reject (NaN-like tokens,
/// malformed exponents), then round half-to-even to `precision`.
pub fn parse_canonical(s: &str, precision: u32) -> Result<Decimal, EngineError> {
    let value = Decimal::from_str(s.trim())
        .map_err(|e| EngineError::Validation(format!("invalid decimal '{s}': {e}")))?;
    Ok(round_half_even(value, precision))
}

/// Half-to-even rounding to `precision` fractional digits. `rust_decimal`
/// calls this strategy `MidpointNearestEven`; we just pin the name so
/// every call site in the core rounds the same way.
pub fn round_half_even(value: Decimal, precision: u32) -> Decimal {
    value.round_dp_with_strategy(precision, RoundingStrategy::MidpointNearestEven)
}

/// Canonical string rendering: fixed precision, no scientific notation
/// (rust_decimal never uses it), no trailing-zero trimming so two equal
/// values always serialize identically.
pub fn to_canonical_string(value: Decimal, precision: u32) -> String {
    round_half_even(value, precision).to_string()
}

/// `rust_decimal` has no transcendental functions. We bridge through
/// `f64` for `ln`/`exp` and round the result back to `precision` — the
/// LMSR quantities/prices this feeds are never themselves comparison
/// keys (the order book's price levels are plain limit prices, not LMSR
/// outputs), so `f64` rounding error here does not leak into match
/// determinism.
pub fn exp(value: Decimal, precision: u32) -> Result<Decimal, EngineError> {
    let x: f64 = value
        .to_string()
        .parse()
        .map_err(|_| EngineError::Internal(anyhow::anyhow!("decimal->f64 conversion failed")))?;
    let result = x.exp();
    decimal_from_f64(result, precision)
}

pub fn ln(value: Decimal, precision: u32) -> Result<Decimal, EngineError> {
    if value <= Decimal::ZERO {
        return Err(EngineError::Internal(anyhow::anyhow!(
            "ln of non-positive value"
        )));
    }
    let x: f64 = value
        .to_string()
        .parse()
        .map_err(|_| EngineError::Internal(anyhow::anyhow!("decimal->f64 conversion failed")))?;
    decimal_from_f64(x.ln(), precision)
}

fn decimal_from_f64(x: f64, precision: u32) -> Result<Decimal, EngineError> {
    let value = Decimal::from_f64_retain(x)
        .ok_or_else(|| EngineError::Internal(anyhow::anyhow!("f64->decimal conversion failed")))?;
    Ok(round_half_even(value, precision))
}

/// `b * log(sum(exp(x_i / b)))`, computed via the shifted form
/// `b * (m/b + log(sum(exp((x_i - m) / b))))` with `m = max(x_i)` so the
/// exponent argument never overflows for large quantities — this is the
/// stabilization spec.md's LMSR cost function requires.
pub fn log_sum_exp_scaled(values: &[Decimal], b: Decimal, precision: u32) -> Result<Decimal, EngineError> {
    if values.is_empty() {
        return Err(EngineError::Validation(
            "log_sum_exp requires at least one value".into(),
        ));
    }
    let m = values
        .iter()
        .copied()
        .fold(Decimal::MIN, |acc, v| if v > acc { v } else { acc });

    let mut sum = Decimal::ZERO;
    for &v in values {
        let shifted = (v - m) / b;
        sum += exp(shifted, precision)?;
    }
    let ln_sum = ln(sum, precision)?;
    Ok(round_half_even(b * (m / b + ln_sum), precision))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_and_rounds_canonical() {
        let v = parse_canonical("1.23456789012345678901", 18).unwrap();
        assert_eq!(v.scale(), 18);
    }

    #[test]
    fn half_even_rounds_ties_to_even() {
        let v = round_half_even(dec!(0.125), 2);
        assert_eq!(v, dec!(0.12));
        let v = round_half_even(dec!(0.135), 2);
        assert_eq!(v, dec!(0.14));
    }

    #[test]
    fn exp_ln_roundtrip() {
        let v = dec!(2.5);
        let e = exp(v, 12).unwrap();
        let back = ln(e, 12).unwrap();
        assert!((back - v).abs() < dec!(0.001));
    }

    #[test]
    fn log_sum_exp_matches_naive_for_small_values() {
        // b*ln(e^(0/b) + e^(0/b)) = b*ln(2) for q = [0, 0]
        let b = dec!(100);
        let stable = log_sum_exp_scaled(&[dec!(0), dec!(0)], b, 12).unwrap();
        let naive = b * ln(dec!(2), 12).unwrap();
        assert!((stable - naive).abs() < dec!(0.001));
    }
}
