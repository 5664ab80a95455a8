use std::fmt;
use std::str::FromStr;

use super::{DatatypeId, NumericValue};
use crate::error::{ValueError, ValueResult};

/// xs:integer value, restricted to the signed 64-bit range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IntegerValue(i64);

impl IntegerValue {
    pub const ZERO: IntegerValue = IntegerValue(0);

    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn value(self) -> i64 {
        self.0
    }

    /// Remainder of truncated division; the sign follows the dividend.
    pub fn modulo(&self, divisor: &Self) -> ValueResult<Self> {
        if divisor.0 == 0 {
            return Err(division_by_zero());
        }
        self.0.checked_rem(divisor.0).map(Self).ok_or_else(overflow)
    }
}

fn overflow() -> ValueError {
    ValueError::Arithmetic("Integer overflow".to_string())
}

fn division_by_zero() -> ValueError {
    ValueError::Arithmetic("Illegal division by zero".to_string())
}

impl NumericValue for IntegerValue {
    fn abs(&self) -> ValueResult<Self> {
        self.0.checked_abs().map(Self).ok_or_else(overflow)
    }

    fn add(&self, others: &[Self]) -> ValueResult<Self> {
        others
            .iter()
            .try_fold(self.0, |acc, v| acc.checked_add(v.0))
            .map(Self)
            .ok_or_else(overflow)
    }

    fn multiply(&self, others: &[Self]) -> ValueResult<Self> {
        others
            .iter()
            .try_fold(self.0, |acc, v| acc.checked_mul(v.0))
            .map(Self)
            .ok_or_else(overflow)
    }

    fn subtract(&self, subtrahend: &Self) -> ValueResult<Self> {
        self.0
            .checked_sub(subtrahend.0)
            .map(Self)
            .ok_or_else(overflow)
    }

    fn divide(&self, divisor: &Self) -> ValueResult<Self> {
        if divisor.0 == 0 {
            return Err(division_by_zero());
        }
        self.0.checked_div(divisor.0).map(Self).ok_or_else(overflow)
    }
}

impl FromStr for IntegerValue {
    type Err = ValueError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let s = input.trim();
        let digits = s.strip_prefix(['+', '-']).unwrap_or(s);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValueError::format(
                DatatypeId::Integer,
                input,
                "expected optional sign followed by digits",
            ));
        }
        s.parse::<i64>()
            .map(Self)
            .map_err(|_| ValueError::format(DatatypeId::Integer, input, "out of 64-bit range"))
    }
}

impl fmt::Display for IntegerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn i(v: i64) -> IntegerValue {
        IntegerValue::new(v)
    }

    #[test]
    fn test_parse() {
        assert_eq!("42".parse::<IntegerValue>().unwrap(), i(42));
        assert_eq!(" -7 ".parse::<IntegerValue>().unwrap(), i(-7));
        assert_eq!("+007".parse::<IntegerValue>().unwrap(), i(7));
    }

    #[test]
    fn test_parse_rejects() {
        for s in ["", "+", "1.0", "1e3", "abc", "99999999999999999999"] {
            assert!(s.parse::<IntegerValue>().is_err(), "accepted {:?}", s);
        }
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(i(1).add(&[i(2), i(3)]).unwrap(), i(6));
        assert_eq!(i(2).multiply(&[i(3), i(4)]).unwrap(), i(24));
        assert_eq!(i(2).subtract(&i(5)).unwrap(), i(-3));
        assert_eq!(i(7).divide(&i(2)).unwrap(), i(3));
        assert_eq!(i(-7).divide(&i(2)).unwrap(), i(-3));
        assert_eq!(i(-7).modulo(&i(3)).unwrap(), i(-1));
        assert_eq!(i(-9).abs().unwrap(), i(9));
    }

    #[test]
    fn test_overflow_is_arithmetic_error() {
        assert!(i(i64::MAX).add(&[i(1)]).is_err());
        assert!(i(i64::MIN).abs().is_err());
        assert!(i(i64::MIN).divide(&i(-1)).is_err());
    }

    #[test]
    fn test_division_by_zero() {
        let err = i(1).divide(&IntegerValue::ZERO).unwrap_err();
        assert_eq!(err.to_string(), "Illegal division by zero");
        assert!(i(1).modulo(&IntegerValue::ZERO).is_err());
    }

    proptest! {
        #[test]
        fn test_print_parse_roundtrip(v in any::<i64>()) {
            let restored: IntegerValue = i(v).to_string().parse().unwrap();
            prop_assert_eq!(restored, i(v));
        }
    }
}
