use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use super::{DatatypeId, NumericValue};
use crate::error::{ValueError, ValueResult};

const DIVISION_BY_ZERO: &str = "Illegal division by zero";

/// xs:double value.
///
/// Ordering and equality follow Java `Double.compareTo`: `-0.0 < 0.0`, NaN is
/// equal to itself and greater than every other value, including `INF`.
#[derive(Debug, Clone, Copy)]
pub struct DoubleValue(f64);

impl DoubleValue {
    pub const ZERO: DoubleValue = DoubleValue(0.0);

    pub fn new(value: f64) -> Self {
        Self(value)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    pub fn floor(&self) -> Self {
        Self(self.0.floor())
    }

    /// Round to the nearest integer, ties to even (IEEE 754 default rounding).
    pub fn round_ieee754_default(&self) -> Self {
        Self(self.0.round_ties_even())
    }

    fn canonical_bits(&self) -> u64 {
        if self.0.is_nan() {
            f64::NAN.to_bits()
        } else {
            self.0.to_bits()
        }
    }
}

impl PartialEq for DoubleValue {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_bits() == other.canonical_bits()
    }
}

impl Eq for DoubleValue {}

impl Hash for DoubleValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_bits().hash(state);
    }
}

impl PartialOrd for DoubleValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DoubleValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0.is_nan(), other.0.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.0.total_cmp(&other.0),
        }
    }
}

impl NumericValue for DoubleValue {
    fn abs(&self) -> ValueResult<Self> {
        Ok(Self(self.0.abs()))
    }

    fn add(&self, others: &[Self]) -> ValueResult<Self> {
        Ok(Self(others.iter().fold(self.0, |acc, v| acc + v.0)))
    }

    fn multiply(&self, others: &[Self]) -> ValueResult<Self> {
        Ok(Self(others.iter().fold(self.0, |acc, v| acc * v.0)))
    }

    fn subtract(&self, subtrahend: &Self) -> ValueResult<Self> {
        Ok(Self(self.0 - subtrahend.0))
    }

    fn divide(&self, divisor: &Self) -> ValueResult<Self> {
        let quotient = self.0 / divisor.0;
        if quotient.is_infinite() || quotient.is_nan() {
            return Err(ValueError::Arithmetic(DIVISION_BY_ZERO.to_string()));
        }
        Ok(Self(quotient))
    }
}

// ---------------------------------------------------------------------------
// Lexical form
// ---------------------------------------------------------------------------

impl FromStr for DoubleValue {
    type Err = ValueError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let s = input.trim();
        match s {
            "NaN" => return Ok(Self(f64::NAN)),
            "INF" | "+INF" => return Ok(Self(f64::INFINITY)),
            "-INF" => return Ok(Self(f64::NEG_INFINITY)),
            _ => {}
        }
        if !is_decimal_literal(s) {
            return Err(ValueError::format(
                DatatypeId::Double,
                input,
                "expected decimal digits with optional fraction and exponent",
            ));
        }
        s.parse::<f64>()
            .map(Self)
            .map_err(|e| ValueError::format(DatatypeId::Double, input, e.to_string()))
    }
}

/// `[+-]? digits? ('.' digits?)? ([eE] [+-]? digits)?` with at least one
/// mantissa digit.
fn is_decimal_literal(s: &str) -> bool {
    let bytes = s.as_bytes();
    let len = bytes.len();
    let mut i = 0;

    let skip_digits = |mut i: usize| {
        while i < len && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    if i < len && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let int_end = skip_digits(i);
    let mut mantissa_digits = int_end - i;
    i = int_end;

    if i < len && bytes[i] == b'.' {
        let frac_end = skip_digits(i + 1);
        mantissa_digits += frac_end - (i + 1);
        i = frac_end;
    }
    if mantissa_digits == 0 {
        return false;
    }

    if i < len && (bytes[i] == b'e' || bytes[i] == b'E') {
        i += 1;
        if i < len && (bytes[i] == b'+' || bytes[i] == b'-') {
            i += 1;
        }
        let exp_end = skip_digits(i);
        if exp_end == i {
            return false;
        }
        i = exp_end;
    }
    i == len
}

impl fmt::Display for DoubleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        if v.is_nan() {
            return f.write_str("NaN");
        }
        if v.is_infinite() {
            return f.write_str(if v > 0.0 { "INF" } else { "-INF" });
        }
        if v == 0.0 {
            return f.write_str(if v.is_sign_negative() { "-0.0" } else { "0.0" });
        }

        // Shortest round-trip digits and decimal exponent.
        let sci = format!("{:e}", v.abs());
        let Some((mantissa, exp)) = sci.split_once('e') else {
            return f.write_str(&sci);
        };
        let exp: i32 = exp.parse().unwrap_or(0);
        let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
        let sign = if v < 0.0 { "-" } else { "" };

        if (1e-3..1e7).contains(&v.abs()) {
            if exp >= 0 {
                let int_len = exp as usize + 1;
                if digits.len() <= int_len {
                    let pad = "0".repeat(int_len - digits.len());
                    write!(f, "{}{}{}.0", sign, digits, pad)
                } else {
                    let (int, frac) = digits.split_at(int_len);
                    write!(f, "{}{}.{}", sign, int, frac)
                }
            } else {
                let zeros = "0".repeat((-exp - 1) as usize);
                write!(f, "{}0.{}{}", sign, zeros, digits)
            }
        } else {
            let (first, rest) = digits.split_at(1);
            let rest = if rest.is_empty() { "0" } else { rest };
            write!(f, "{}{}.{}E{}", sign, first, rest, exp)
        }
    }
}
