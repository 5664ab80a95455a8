use std::fmt;
use std::sync::Arc;

use arbiter_core::{
    AttributeKey, AttributeValue, DatatypeId, EvalResult, IndeterminateError, ValueResult,
};

use crate::context::EvaluationContext;

/// An evaluatable node with a statically known result datatype.
pub trait Expression: Send + Sync + fmt::Debug {
    fn return_type(&self) -> DatatypeId;

    /// Evaluate against one request. The value has datatype `return_type()`.
    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> EvalResult<AttributeValue>;

    /// The value, when it is known without a request.
    fn constant_value(&self) -> Option<&AttributeValue> {
        None
    }
}

pub type ExpressionRef = Arc<dyn Expression>;

// ---------------------------------------------------------------------------
// Constant
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Constant(AttributeValue);

impl Constant {
    pub fn new(value: impl Into<AttributeValue>) -> Self {
        Self(value.into())
    }

    pub fn parse(datatype: DatatypeId, lexical: &str) -> ValueResult<Self> {
        AttributeValue::parse(datatype, lexical).map(Self)
    }

    pub fn into_ref(self) -> ExpressionRef {
        Arc::new(self)
    }
}

impl Expression for Constant {
    fn return_type(&self) -> DatatypeId {
        self.0.datatype()
    }

    fn evaluate(&self, _ctx: &EvaluationContext<'_>) -> EvalResult<AttributeValue> {
        Ok(self.0.clone())
    }

    fn constant_value(&self) -> Option<&AttributeValue> {
        Some(&self.0)
    }
}

// ---------------------------------------------------------------------------
// AttributeDesignator
// ---------------------------------------------------------------------------

/// Looks up exactly one request attribute value.
#[derive(Debug, Clone)]
pub struct AttributeDesignator {
    key: AttributeKey,
    must_be_present: bool,
}

impl AttributeDesignator {
    pub fn new(key: AttributeKey, must_be_present: bool) -> Self {
        Self {
            key,
            must_be_present,
        }
    }

    pub fn key(&self) -> &AttributeKey {
        &self.key
    }

    pub fn into_ref(self) -> ExpressionRef {
        Arc::new(self)
    }
}

impl Expression for AttributeDesignator {
    fn return_type(&self) -> DatatypeId {
        self.key.datatype
    }

    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> EvalResult<AttributeValue> {
        match ctx.attribute(&self.key).as_slice() {
            [value] => Ok((*value).clone()),
            [] if self.must_be_present => Err(IndeterminateError::missing_attribute(format!(
                "Missing attribute {} (category {}, datatype {})",
                self.key.id, self.key.category, self.key.datatype
            ))),
            [] => Err(IndeterminateError::processing(format!(
                "No value for attribute {} where exactly one is expected",
                self.key.id
            ))),
            values => Err(IndeterminateError::processing(format!(
                "{} values for attribute {} where exactly one is expected",
                values.len(),
                self.key.id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_core::{categories, IndividualDecisionRequest, StatusCode, StringValue};

    fn role_key() -> AttributeKey {
        AttributeKey::new(categories::ACCESS_SUBJECT, "role", DatatypeId::String)
    }

    fn s(v: &str) -> AttributeValue {
        AttributeValue::String(StringValue::new(v))
    }

    #[test]
    fn test_constant() {
        let c = Constant::parse(DatatypeId::Integer, "5").unwrap();
        assert_eq!(c.return_type(), DatatypeId::Integer);
        assert!(c.constant_value().is_some());
        let req = IndividualDecisionRequest::new();
        assert_eq!(c.evaluate(&EvaluationContext::new(&req)).unwrap().to_string(), "5");
    }

    #[test]
    fn test_designator_single_value() {
        let req = IndividualDecisionRequest::new().with_attribute(role_key(), s("admin"));
        let d = AttributeDesignator::new(role_key(), true);
        assert_eq!(d.evaluate(&EvaluationContext::new(&req)).unwrap(), s("admin"));
        assert!(d.constant_value().is_none());
    }

    #[test]
    fn test_designator_missing() {
        let req = IndividualDecisionRequest::new();
        let err = AttributeDesignator::new(role_key(), true)
            .evaluate(&EvaluationContext::new(&req))
            .unwrap_err();
        assert_eq!(err.code, StatusCode::MissingAttribute);

        let err = AttributeDesignator::new(role_key(), false)
            .evaluate(&EvaluationContext::new(&req))
            .unwrap_err();
        assert_eq!(err.code, StatusCode::ProcessingError);
    }

    #[test]
    fn test_designator_multi_valued_bag() {
        let req = IndividualDecisionRequest::new()
            .with_attribute(role_key(), s("a"))
            .with_attribute(role_key(), s("b"));
        let err = AttributeDesignator::new(role_key(), true)
            .evaluate(&EvaluationContext::new(&req))
            .unwrap_err();
        assert_eq!(err.code, StatusCode::ProcessingError);
        assert!(err.message.starts_with("2 values"));
    }
}
