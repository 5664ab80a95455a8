use thiserror::Error;

use crate::decision::StatusCode;
use crate::value::DatatypeId;

/// Errors raised while constructing or operating on attribute values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    /// Malformed lexical form for the datatype.
    #[error("invalid {datatype} literal `{input}`: {reason}")]
    Format {
        datatype: DatatypeId,
        input: String,
        reason: String,
    },

    /// Arithmetic result not representable (overflow, division by zero, NaN).
    #[error("{0}")]
    Arithmetic(String),
}

impl ValueError {
    pub fn format(datatype: DatatypeId, input: &str, reason: impl Into<String>) -> Self {
        ValueError::Format {
            datatype,
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

pub type ValueResult<T> = Result<T, ValueError>;

/// A value did not have the native representation a typed consumer expected.
///
/// Kept apart from [`ValueError`] and from bind-time type mismatches: it only
/// happens at evaluation time, at a function argument boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("expected {expected} value, got {actual}")]
pub struct DatatypeCastError {
    pub expected: DatatypeId,
    pub actual: DatatypeId,
}

/// Failure of an expression evaluation, carried up to the enclosing rule or
/// policy where it becomes an Indeterminate decision.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({code})")]
pub struct IndeterminateError {
    pub code: StatusCode,
    pub message: String,
}

impl IndeterminateError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        Self::new(StatusCode::ProcessingError, message)
    }

    pub fn missing_attribute(message: impl Into<String>) -> Self {
        Self::new(StatusCode::MissingAttribute, message)
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SyntaxError, message)
    }
}

impl From<ValueError> for IndeterminateError {
    fn from(e: ValueError) -> Self {
        match e {
            ValueError::Format { .. } => IndeterminateError::syntax(e.to_string()),
            ValueError::Arithmetic(_) => IndeterminateError::processing(e.to_string()),
        }
    }
}

pub type EvalResult<T> = Result<T, IndeterminateError>;
