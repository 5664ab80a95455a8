use std::fmt;
use std::str::FromStr;

use super::{DatatypeId, LexicalText};
use crate::error::ValueError;

// ---------------------------------------------------------------------------
// xs:string
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StringValue(String);

impl StringValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for StringValue {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for StringValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl LexicalText for StringValue {
    fn text(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// xs:boolean
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BooleanValue(bool);

impl BooleanValue {
    pub const TRUE: BooleanValue = BooleanValue(true);
    pub const FALSE: BooleanValue = BooleanValue(false);

    pub fn new(value: bool) -> Self {
        Self(value)
    }

    pub fn value(self) -> bool {
        self.0
    }

    pub fn not(self) -> Self {
        Self(!self.0)
    }
}

impl From<bool> for BooleanValue {
    fn from(value: bool) -> Self {
        Self(value)
    }
}

impl FromStr for BooleanValue {
    type Err = ValueError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim() {
            "true" | "1" => Ok(Self::TRUE),
            "false" | "0" => Ok(Self::FALSE),
            _ => Err(ValueError::format(
                DatatypeId::Boolean,
                input,
                "expected one of true, false, 1, 0",
            )),
        }
    }
}

impl fmt::Display for BooleanValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.0 { "true" } else { "false" })
    }
}

// ---------------------------------------------------------------------------
// xs:anyURI
// ---------------------------------------------------------------------------

/// URI reference kept in lexical form. Only whitespace collapse and a check
/// for embedded whitespace or control characters are applied.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AnyUriValue(String);

impl AnyUriValue {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for AnyUriValue {
    type Err = ValueError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let s = input.trim();
        if let Some(c) = s.chars().find(|c| c.is_whitespace() || c.is_control()) {
            return Err(ValueError::format(
                DatatypeId::AnyUri,
                input,
                format!("illegal character {:?}", c),
            ));
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for AnyUriValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl LexicalText for AnyUriValue {
    fn text(&self) -> &str {
        &self.0
    }
}
