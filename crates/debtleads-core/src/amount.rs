//! Fixed-point monetary amounts.
//!
//! The open-data bundle writes values such as `"1.234.567,89"` (Brazilian
//! locale) while re-exported spreadsheets tend to use `"1234567.89"`. Both
//! parse into the same [`Amount`], stored as an `i128` count of micro-units
//! so that summation is exact and rounding happens once, at the end.
//!
//! # Separator rules
//!
//! - Both `.` and `,` present: the one occurring last is the decimal
//!   separator, the other is a thousands separator.
//! - A single `,` or a single `.`: decimal separator.
//! - The same separator repeated (`1.234.567`): thousands separators.
//! - A leading `R$` and any whitespace are ignored.
//! - Fractional digits past the sixth are rounded half-up.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of fractional digits carried by [`Amount`].
pub const SCALE: i8 = 6;

const UNITS: i128 = 1_000_000;
const CENT: i128 = UNITS / 100;

/// Largest magnitude, in micro-units, that fits `Decimal128(38, 6)`.
const MAX_MICROS: i128 = 10i128.pow(38) - 1;

/// A signed decimal amount with six fractional digits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Build from a raw count of micro-units (10^-6).
    pub const fn from_micros(micros: i128) -> Self {
        Self(micros)
    }

    /// Raw count of micro-units; this is the Arrow `Decimal128(_, 6)` value.
    pub const fn micros(self) -> i128 {
        self.0
    }

    /// Whole units, e.g. `Amount::from_units(100_000)` for R$ 100.000,00.
    pub const fn from_units(units: i64) -> Self {
        Self(units as i128 * UNITS)
    }

    /// Convert from a float, rounding to the nearest micro-unit.
    ///
    /// Returns `None` for NaN and infinities.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        Some(Self((value * UNITS as f64).round() as i128))
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / UNITS as f64
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Sum, or `None` once the result no longer fits `Decimal128(38, 6)`.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0
            .checked_add(other.0)
            .filter(|micros| micros.abs() <= MAX_MICROS)
            .map(Amount)
    }

    /// Round half-up (away from zero) to two decimal places.
    pub fn round_cents(self) -> Amount {
        let whole = self.0 / CENT;
        let rem = self.0 % CENT;
        let adjust = if rem.abs() * 2 >= CENT {
            self.0.signum()
        } else {
            0
        };
        Amount((whole + adjust) * CENT)
    }

    /// Parse a locale-formatted decimal string.
    ///
    /// Returns `None` for empty input or anything that is not a number.
    pub fn parse(raw: &str) -> Option<Amount> {
        let cleaned: String = raw
            .trim()
            .trim_start_matches("R$")
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();

        let (negative, body) = match cleaned.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
        };
        if body.is_empty() {
            return None;
        }

        let decimal_sep = decimal_separator(body);
        let mut int_part = String::with_capacity(body.len());
        let mut frac_part = String::new();
        let mut in_fraction = false;
        for c in body.chars() {
            match c {
                '0'..='9' if in_fraction => frac_part.push(c),
                '0'..='9' => int_part.push(c),
                '.' | ',' if Some(c) == decimal_sep && !in_fraction => in_fraction = true,
                '.' | ',' if Some(c) != decimal_sep => {}
                _ => return None,
            }
        }
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }

        let whole: i128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().ok()?
        };

        let digits = frac_part.as_bytes();
        let mut fraction: i128 = 0;
        for i in 0..SCALE as usize {
            fraction *= 10;
            if let Some(d) = digits.get(i) {
                fraction += (d - b'0') as i128;
            }
        }
        if digits.get(SCALE as usize).is_some_and(|d| *d >= b'5') {
            fraction += 1;
        }

        let micros = whole.checked_mul(UNITS)?.checked_add(fraction)?;
        if micros > MAX_MICROS {
            return None;
        }
        Some(Amount(if negative { -micros } else { micros }))
    }
}

/// Decide which of `.` / `,` acts as the decimal separator in `body`.
fn decimal_separator(body: &str) -> Option<char> {
    let last_dot = body.rfind('.');
    let last_comma = body.rfind(',');
    match (last_dot, last_comma) {
        (Some(d), Some(c)) => Some(if d > c { '.' } else { ',' }),
        (Some(_), None) if body.matches('.').count() == 1 => Some('.'),
        (None, Some(_)) if body.matches(',').count() == 1 => Some(','),
        _ => None,
    }
}

impl std::ops::Add for Amount {
    type Output = Amount;

    fn add(self, other: Amount) -> Amount {
        Amount(self.0 + other.0)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}

impl fmt::Display for Amount {
    /// Plain decimal notation with at least two fractional digits.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = abs / UNITS as u128;
        let frac = format!("{:06}", abs % UNITS as u128);
        let trimmed = frac.trim_end_matches('0');
        let shown = if trimmed.len() < 2 { &frac[..2] } else { trimmed };
        write!(f, "{sign}{whole}.{shown}")
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.to_f64())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a number or a decimal string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
        Ok(Amount::from_units(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
        i64::try_from(v)
            .map(Amount::from_units)
            .map_err(|_| E::custom(format!("amount out of range: {v}")))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
        Amount::from_f64(v).ok_or_else(|| E::custom(format!("not a finite amount: {v}")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
        Amount::parse(v).ok_or_else(|| E::custom(format!("not a decimal amount: {v:?}")))
    }
}
