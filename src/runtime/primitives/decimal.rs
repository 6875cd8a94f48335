//! Deterministic 18-decimal fixed-point arithmetic.
//!
//! Every operation truncates toward zero so all replicas agree bit for bit.

use sp_arithmetic::{
    helpers_128bit::multiply_by_rational_with_rounding, per_things::Rounding, FixedPointNumber,
};
use thiserror::Error;

pub use sp_arithmetic::FixedU128 as Decimal;

/// Number of fractional decimal digits.
pub const PRECISION: usize = 18;

/// Raw units per whole number (`10^18`).
pub const UNIT: u128 = 1_000_000_000_000_000_000;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecimalError {
    #[error("Invalid decimal literal {0:?}")]
    Malformed(String),

    #[error("Decimal literal {0:?} has more than 18 fractional digits")]
    TooPrecise(String),

    #[error("Decimal literal {0:?} overflows")]
    Overflow(String),
}

pub fn zero() -> Decimal {
    Decimal::from_inner(0)
}

pub fn one() -> Decimal {
    Decimal::from_inner(UNIT)
}

pub fn from_integer(n: u128) -> Decimal {
    Decimal::from_inner(n.saturating_mul(UNIT))
}

/// `numerator / denominator`, truncated. `None` when the denominator is zero
/// or the result overflows.
pub fn from_rational(numerator: u128, denominator: u128) -> Option<Decimal> {
    multiply_by_rational_with_rounding(numerator, UNIT, denominator, Rounding::Down)
        .map(Decimal::from_inner)
}

/// `numerator / denominator`, truncated. Zero when the denominator is zero,
/// saturating on overflow.
pub fn ratio(numerator: u128, denominator: u128) -> Decimal {
    if denominator == 0 {
        return zero();
    }
    from_rational(numerator, denominator).unwrap_or_else(|| Decimal::from_inner(u128::MAX))
}

pub fn add(a: Decimal, b: Decimal) -> Decimal {
    Decimal::from_inner(a.into_inner().saturating_add(b.into_inner()))
}

/// Saturates at zero.
pub fn sub(a: Decimal, b: Decimal) -> Decimal {
    Decimal::from_inner(a.into_inner().saturating_sub(b.into_inner()))
}

/// `a * b`, truncated; saturates on overflow.
pub fn mul(a: Decimal, b: Decimal) -> Decimal {
    multiply_by_rational_with_rounding(a.into_inner(), b.into_inner(), UNIT, Rounding::Down)
        .map(Decimal::from_inner)
        .unwrap_or_else(|| Decimal::from_inner(u128::MAX))
}

/// `a * n`, truncated to an integer; saturates on overflow.
pub fn mul_int(a: Decimal, n: u128) -> u128 {
    multiply_by_rational_with_rounding(n, a.into_inner(), UNIT, Rounding::Down).unwrap_or(u128::MAX)
}

/// `a * numerator / denominator` in one truncating step. Zero when the
/// denominator is zero, saturating on overflow.
pub fn mul_ratio(a: Decimal, numerator: u128, denominator: u128) -> Decimal {
    if denominator == 0 {
        return zero();
    }
    multiply_by_rational_with_rounding(a.into_inner(), numerator, denominator, Rounding::Down)
        .map(Decimal::from_inner)
        .unwrap_or_else(|| Decimal::from_inner(u128::MAX))
}

/// Integer part.
pub fn floor(a: Decimal) -> u128 {
    a.into_inner() / UNIT
}

pub fn clamp(value: Decimal, min: Decimal, max: Decimal) -> Decimal {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}

/// Renders with all 18 fractional digits, e.g. `0.600000000000000000`.
pub fn format(a: Decimal) -> String {
    let inner = a.into_inner();
    format!("{}.{:0width$}", inner / UNIT, inner % UNIT, width = PRECISION)
}

/// Parses `"2"`, `"0.6"` or `"1.250000000000000000"`.
pub fn parse(literal: &str) -> Result<Decimal, DecimalError> {
    let malformed = || DecimalError::Malformed(literal.to_owned());
    let (int_part, frac_part) = match literal.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (literal, ""),
    };
    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    if !frac_part.bytes().all(|b| b.is_ascii_digit()) || (literal.contains('.') && frac_part.is_empty()) {
        return Err(malformed());
    }
    if frac_part.len() > PRECISION {
        return Err(DecimalError::TooPrecise(literal.to_owned()));
    }

    let overflow = || DecimalError::Overflow(literal.to_owned());
    let int_value: u128 = int_part.parse().map_err(|_| overflow())?;
    let frac_value: u128 = if frac_part.is_empty() {
        0
    } else {
        let digits: u128 = frac_part.parse().map_err(|_| malformed())?;
        digits * 10u128.pow((PRECISION - frac_part.len()) as u32)
    };

    int_value
        .checked_mul(UNIT)
        .and_then(|v| v.checked_add(frac_value))
        .map(Decimal::from_inner)
        .ok_or_else(overflow)
}

/// Serde adapter storing decimals as strings.
pub mod serde_decimal {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    use super::Decimal;

    pub fn serialize<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse(&raw).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_format() {
        assert_eq!(parse("0.6").unwrap(), from_rational(6, 10).unwrap());
        assert_eq!(parse("2").unwrap(), from_integer(2));
        assert_eq!(format(parse("1.25").unwrap()), "1.250000000000000000");
        assert!(parse("").is_err());
        assert!(parse("1.").is_err());
        assert!(parse("-1").is_err());
        assert!(parse("0.1234567890123456789").is_err());
    }

    #[test]
    fn multiplication_truncates() {
        let third = from_rational(1, 3).unwrap();
        assert_eq!(third.into_inner(), 333_333_333_333_333_333);
        assert_eq!(mul_int(parse("0.9").unwrap(), 15), 13);
        assert_eq!(mul(from_integer(3), third).into_inner(), 999_999_999_999_999_999);
        assert_eq!(floor(parse("99.99").unwrap()), 99);
    }

    #[test]
    fn zero_denominator_yields_none() {
        assert!(from_rational(5, 0).is_none());
        assert_eq!(ratio(5, 0), zero());
        assert_eq!(ratio(1, 4), parse("0.25").unwrap());
        assert_eq!(mul_ratio(from_integer(600), 100, 0), zero());
        assert_eq!(mul_ratio(from_integer(600), 100, 1_000), from_integer(60));
    }

    #[test]
    fn one_is_multiplicative_identity() {
        let x = parse("1.5").unwrap();
        assert_eq!(mul(x, one()), x);
        assert_eq!(add(sub(x, one()), one()), x);
    }
}
