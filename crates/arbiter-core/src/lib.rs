//! Arbiter core types
//!
//! The leaves of the policy decision point: immutable typed attribute
//! values, the extended decision algebra, obligation/advice (PEP action)
//! accumulators, and the individual decision request/result pair used as
//! cache key and value.

pub mod decision;
pub mod error;
pub mod pep;
pub mod request;
pub mod value;

pub use decision::*;
pub use error::*;
pub use pep::*;
pub use request::*;
pub use value::{
    datatypes, AnyUriValue, AttributeValue, BooleanValue, Datatype, DatatypeId, DoubleValue,
    IntegerValue, IpAddressValue, LexicalText, NativeValue, NumericValue, PortRange, StringValue,
};
