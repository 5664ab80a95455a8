//! Typed, immutable attribute values.
//!
//! Every value has a datatype descriptor ([`DatatypeId`]) used for dispatch
//! and safe downcasting, and a lexical form used for parsing and printing.
//! Values never change after construction; operations return new values.

mod double;
mod integer;
mod ip_address;
mod simple;

pub use double::DoubleValue;
pub use integer::IntegerValue;
pub use ip_address::{IpAddressValue, PortRange};
pub use simple::{AnyUriValue, BooleanValue, StringValue};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use crate::error::{DatatypeCastError, ValueError, ValueResult};

// ---------------------------------------------------------------------------
// DatatypeId: globally unique datatype identifiers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DatatypeId {
    String,
    Boolean,
    Integer,
    Double,
    AnyUri,
    IpAddress,
}

impl DatatypeId {
    pub const ALL: [DatatypeId; 6] = [
        DatatypeId::String,
        DatatypeId::Boolean,
        DatatypeId::Integer,
        DatatypeId::Double,
        DatatypeId::AnyUri,
        DatatypeId::IpAddress,
    ];

    pub fn uri(self) -> &'static str {
        match self {
            DatatypeId::String => "http://www.w3.org/2001/XMLSchema#string",
            DatatypeId::Boolean => "http://www.w3.org/2001/XMLSchema#boolean",
            DatatypeId::Integer => "http://www.w3.org/2001/XMLSchema#integer",
            DatatypeId::Double => "http://www.w3.org/2001/XMLSchema#double",
            DatatypeId::AnyUri => "http://www.w3.org/2001/XMLSchema#anyURI",
            DatatypeId::IpAddress => "urn:oasis:names:tc:xacml:2.0:data-type:ipAddress",
        }
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.uri() == uri)
    }

    /// Parse a lexical string into a value of this datatype.
    pub fn parse_value(self, lexical: &str) -> ValueResult<AttributeValue> {
        Ok(match self {
            DatatypeId::String => AttributeValue::String(lexical.parse()?),
            DatatypeId::Boolean => AttributeValue::Boolean(lexical.parse()?),
            DatatypeId::Integer => AttributeValue::Integer(lexical.parse()?),
            DatatypeId::Double => AttributeValue::Double(lexical.parse()?),
            DatatypeId::AnyUri => AttributeValue::AnyUri(lexical.parse()?),
            DatatypeId::IpAddress => AttributeValue::IpAddress(lexical.parse()?),
        })
    }
}

impl fmt::Display for DatatypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uri())
    }
}

impl TryFrom<String> for DatatypeId {
    type Error = String;

    fn try_from(uri: String) -> Result<Self, Self::Error> {
        DatatypeId::from_uri(&uri).ok_or_else(|| format!("unknown datatype `{}`", uri))
    }
}

impl From<DatatypeId> for String {
    fn from(id: DatatypeId) -> Self {
        id.uri().to_string()
    }
}

// ---------------------------------------------------------------------------
// AttributeValue: the supertype of all values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "LexicalForm", into = "LexicalForm")]
pub enum AttributeValue {
    String(StringValue),
    Boolean(BooleanValue),
    Integer(IntegerValue),
    Double(DoubleValue),
    AnyUri(AnyUriValue),
    IpAddress(IpAddressValue),
}

impl AttributeValue {
    pub fn datatype(&self) -> DatatypeId {
        match self {
            AttributeValue::String(_) => DatatypeId::String,
            AttributeValue::Boolean(_) => DatatypeId::Boolean,
            AttributeValue::Integer(_) => DatatypeId::Integer,
            AttributeValue::Double(_) => DatatypeId::Double,
            AttributeValue::AnyUri(_) => DatatypeId::AnyUri,
            AttributeValue::IpAddress(_) => DatatypeId::IpAddress,
        }
    }

    pub fn parse(datatype: DatatypeId, lexical: &str) -> ValueResult<Self> {
        datatype.parse_value(lexical)
    }

    /// A lexical form shared by all values that compare equal. Only
    /// `ipAddress` keeps its input text in `Display`, so only it differs.
    pub fn normalized(&self) -> String {
        match self {
            AttributeValue::IpAddress(v) => v.normalized(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(v) => v.fmt(f),
            AttributeValue::Boolean(v) => v.fmt(f),
            AttributeValue::Integer(v) => v.fmt(f),
            AttributeValue::Double(v) => v.fmt(f),
            AttributeValue::AnyUri(v) => v.fmt(f),
            AttributeValue::IpAddress(v) => v.fmt(f),
        }
    }
}

/// Serialized shape of a value: datatype URI plus lexical form.
#[derive(Serialize, Deserialize)]
struct LexicalForm {
    datatype: DatatypeId,
    value: String,
}

impl From<AttributeValue> for LexicalForm {
    fn from(v: AttributeValue) -> Self {
        LexicalForm {
            datatype: v.datatype(),
            value: v.to_string(),
        }
    }
}

impl TryFrom<LexicalForm> for AttributeValue {
    type Error = ValueError;

    fn try_from(form: LexicalForm) -> Result<Self, Self::Error> {
        form.datatype.parse_value(&form.value)
    }
}

// ---------------------------------------------------------------------------
// NativeValue / Datatype<T>: safe downcasting
// ---------------------------------------------------------------------------

/// A concrete value type with a fixed datatype identifier.
pub trait NativeValue:
    Sized + Clone + fmt::Display + FromStr<Err = ValueError> + Send + Sync + 'static
{
    const DATATYPE: DatatypeId;

    fn downcast(value: &AttributeValue) -> Option<&Self>;

    fn into_attribute(self) -> AttributeValue;
}

macro_rules! native_value {
    ($ty:ty, $variant:ident) => {
        impl NativeValue for $ty {
            const DATATYPE: DatatypeId = DatatypeId::$variant;

            fn downcast(value: &AttributeValue) -> Option<&Self> {
                match value {
                    AttributeValue::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn into_attribute(self) -> AttributeValue {
                AttributeValue::$variant(self)
            }
        }

        impl From<$ty> for AttributeValue {
            fn from(v: $ty) -> Self {
                AttributeValue::$variant(v)
            }
        }
    };
}

native_value!(StringValue, String);
native_value!(BooleanValue, Boolean);
native_value!(IntegerValue, Integer);
native_value!(DoubleValue, Double);
native_value!(AnyUriValue, AnyUri);
native_value!(IpAddressValue, IpAddress);

/// Capability token binding a native value type to its datatype identifier.
pub struct Datatype<T> {
    id: DatatypeId,
    _native: PhantomData<fn() -> T>,
}

impl<T: NativeValue> Datatype<T> {
    pub const fn new() -> Self {
        Self {
            id: T::DATATYPE,
            _native: PhantomData,
        }
    }

    pub fn id(&self) -> DatatypeId {
        self.id
    }

    /// Checked cast from the supertype.
    pub fn cast<'a>(&self, value: &'a AttributeValue) -> Result<&'a T, DatatypeCastError> {
        T::downcast(value).ok_or(DatatypeCastError {
            expected: self.id,
            actual: value.datatype(),
        })
    }

    pub fn parse(&self, lexical: &str) -> ValueResult<T> {
        lexical.parse()
    }
}

impl<T: NativeValue> Default for Datatype<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Datatype<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Datatype<T> {}

impl<T> fmt::Debug for Datatype<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Datatype({})", self.id)
    }
}

impl<T> fmt::Display for Datatype<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Standard datatype tokens.
pub mod datatypes {
    use super::*;

    pub const STRING: Datatype<StringValue> = Datatype::new();
    pub const BOOLEAN: Datatype<BooleanValue> = Datatype::new();
    pub const INTEGER: Datatype<IntegerValue> = Datatype::new();
    pub const DOUBLE: Datatype<DoubleValue> = Datatype::new();
    pub const ANY_URI: Datatype<AnyUriValue> = Datatype::new();
    pub const IP_ADDRESS: Datatype<IpAddressValue> = Datatype::new();
}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Arithmetic contract shared by numeric representations.
pub trait NumericValue: NativeValue {
    fn abs(&self) -> ValueResult<Self>;

    /// `self + others[0] + others[1] + ...`, left to right.
    fn add(&self, others: &[Self]) -> ValueResult<Self>;

    /// `self * others[0] * others[1] * ...`, left to right.
    fn multiply(&self, others: &[Self]) -> ValueResult<Self>;

    fn subtract(&self, subtrahend: &Self) -> ValueResult<Self>;

    fn divide(&self, divisor: &Self) -> ValueResult<Self>;
}

/// Values whose native representation is their lexical string.
pub trait LexicalText {
    fn text(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::datatypes::*;
    use super::*;

    #[test]
    fn test_datatype_uri_roundtrip() {
        for id in DatatypeId::ALL {
            assert_eq!(DatatypeId::from_uri(id.uri()), Some(id));
        }
        assert_eq!(DatatypeId::from_uri("urn:example:unknown"), None);
    }

    #[test]
    fn test_cast_matching_type() {
        let v = AttributeValue::String(StringValue::new("alice"));
        assert_eq!(STRING.cast(&v).unwrap().as_str(), "alice");
    }

    #[test]
    fn test_cast_mismatch() {
        let v = AttributeValue::Boolean(BooleanValue::TRUE);
        let err = STRING.cast(&v).unwrap_err();
        assert_eq!(err.expected, DatatypeId::String);
        assert_eq!(err.actual, DatatypeId::Boolean);
    }

    #[test]
    fn test_parse_value_dispatch() {
        let v = AttributeValue::parse(DatatypeId::Double, "1.5").unwrap();
        assert_eq!(v, AttributeValue::Double(DoubleValue::new(1.5)));
        assert!(AttributeValue::parse(DatatypeId::Integer, "1.5").is_err());
    }

    #[test]
    fn test_attribute_value_serde() {
        let v = AttributeValue::parse(DatatypeId::IpAddress, "10.0.0.1/24:80-443").unwrap();
        let json = serde_json::to_string(&v).unwrap();
        assert!(json.contains("ipAddress"));
        let restored: AttributeValue = serde_json::from_str(&json).unwrap();
        assert_eq!(v, restored);
    }

    #[test]
    fn test_attribute_value_serde_rejects_bad_lexical() {
        let json = r#"{"datatype":"http://www.w3.org/2001/XMLSchema#integer","value":"abc"}"#;
        assert!(serde_json::from_str::<AttributeValue>(json).is_err());
    }

    #[test]
    fn test_datatype_token_parse() {
        assert_eq!(INTEGER.parse("42").unwrap(), IntegerValue::new(42));
        assert_eq!(BOOLEAN.id(), DatatypeId::Boolean);
        assert_eq!(DOUBLE.to_string(), DatatypeId::Double.uri());
        assert_eq!(ANY_URI.id(), DatatypeId::AnyUri);
        assert_eq!(IP_ADDRESS.id(), DatatypeId::IpAddress);
    }
}
