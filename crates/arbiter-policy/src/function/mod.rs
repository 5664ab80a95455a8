//! First-order functions: signatures, bind-time checks and calls.
//!
//! A function binds argument expressions into a [`FunctionCall`]. Arity and
//! declared argument types are checked once, at bind time. At evaluation
//! time the arguments are evaluated left to right and the first
//! Indeterminate aborts the call unchanged.

pub mod arithmetic;
pub mod comparison;
pub mod equality;
pub mod logical;
pub mod matching;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arbiter_core::{
    AttributeValue, Datatype, DatatypeId, EvalResult, IndeterminateError, NativeValue,
};

use crate::context::EvaluationContext;
use crate::error::{PolicyError, PolicyResult};
use crate::expression::{Expression, ExpressionRef};

pub const XACML_1_0_PREFIX: &str = "urn:oasis:names:tc:xacml:1.0:function:";
pub const XACML_2_0_PREFIX: &str = "urn:oasis:names:tc:xacml:2.0:function:";
pub const XACML_3_0_PREFIX: &str = "urn:oasis:names:tc:xacml:3.0:function:";
pub const EXTENSION_PREFIX: &str = "urn:arbiter:function:";

// ---------------------------------------------------------------------------
// FunctionSignature
// ---------------------------------------------------------------------------

/// Trailing repeated parameter of a variadic function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariadicParam {
    pub datatype: DatatypeId,
    /// Minimum number of repeated arguments.
    pub min: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub name: String,
    pub return_type: DatatypeId,
    pub params: Vec<DatatypeId>,
    pub variadic: Option<VariadicParam>,
}

impl FunctionSignature {
    pub fn fixed(name: impl Into<String>, return_type: DatatypeId, params: Vec<DatatypeId>) -> Self {
        Self {
            name: name.into(),
            return_type,
            params,
            variadic: None,
        }
    }

    pub fn variadic(
        name: impl Into<String>,
        return_type: DatatypeId,
        datatype: DatatypeId,
        min: usize,
    ) -> Self {
        Self {
            name: name.into(),
            return_type,
            params: Vec::new(),
            variadic: Some(VariadicParam { datatype, min }),
        }
    }

    /// Check arity and argument types of `args` against this signature.
    pub fn check_args(&self, args: &[ExpressionRef]) -> PolicyResult<()> {
        let fixed = self.params.len();
        match self.variadic {
            None if args.len() != fixed => {
                return Err(PolicyError::InvalidArity(format!(
                    "Function {}: expected {} args, got {}",
                    self.name,
                    fixed,
                    args.len()
                )));
            }
            Some(v) if args.len() < fixed + v.min => {
                return Err(PolicyError::InvalidArity(format!(
                    "Function {}: expected at least {} args, got {}",
                    self.name,
                    fixed + v.min,
                    args.len()
                )));
            }
            _ => {}
        }

        for (i, arg) in args.iter().enumerate() {
            let expected = match self.params.get(i) {
                Some(d) => *d,
                None => match self.variadic {
                    Some(v) => v.datatype,
                    None => break,
                },
            };
            let actual = arg.return_type();
            if actual != expected {
                return Err(PolicyError::TypeMismatch(format!(
                    "Function {}: Invalid type ({}) for arg#{}. Expected: {}",
                    self.name, actual, i, expected
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Function / FunctionCall
// ---------------------------------------------------------------------------

pub trait Function: Send + Sync + fmt::Debug {
    fn signature(&self) -> &FunctionSignature;

    fn id(&self) -> &str {
        &self.signature().name
    }

    /// Bind argument expressions into a call.
    fn new_call(&self, args: Vec<ExpressionRef>) -> PolicyResult<FunctionCall>;
}

type CallBody =
    Arc<dyn Fn(&[ExpressionRef], &EvaluationContext<'_>) -> EvalResult<AttributeValue> + Send + Sync>;

fn call_body<F>(f: F) -> CallBody
where
    F: Fn(&[ExpressionRef], &EvaluationContext<'_>) -> EvalResult<AttributeValue>
        + Send
        + Sync
        + 'static,
{
    Arc::new(f)
}

/// A function bound to its argument expressions.
#[derive(Clone)]
pub struct FunctionCall {
    function: String,
    return_type: DatatypeId,
    args: Vec<ExpressionRef>,
    body: CallBody,
}

impl FunctionCall {
    /// Call whose body receives the evaluated argument values.
    pub fn eager<F>(
        signature: &FunctionSignature,
        args: Vec<ExpressionRef>,
        body: F,
    ) -> PolicyResult<Self>
    where
        F: Fn(&[AttributeValue]) -> EvalResult<AttributeValue> + Send + Sync + 'static,
    {
        Self::lazy(signature, args, move |args, ctx| {
            let values = evaluate_args(args, ctx)?;
            body(&values)
        })
    }

    /// Call whose body decides itself which arguments to evaluate.
    pub fn lazy<F>(
        signature: &FunctionSignature,
        args: Vec<ExpressionRef>,
        body: F,
    ) -> PolicyResult<Self>
    where
        F: Fn(&[ExpressionRef], &EvaluationContext<'_>) -> EvalResult<AttributeValue>
            + Send
            + Sync
            + 'static,
    {
        signature.check_args(&args)?;
        Ok(Self {
            function: signature.name.clone(),
            return_type: signature.return_type,
            args,
            body: call_body(body),
        })
    }

    pub fn function_id(&self) -> &str {
        &self.function
    }

    pub fn into_ref(self) -> ExpressionRef {
        Arc::new(self)
    }
}

impl fmt::Debug for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionCall")
            .field("function", &self.function)
            .field("args", &self.args)
            .finish()
    }
}

impl Expression for FunctionCall {
    fn return_type(&self) -> DatatypeId {
        self.return_type
    }

    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> EvalResult<AttributeValue> {
        (self.body)(&self.args, ctx)
    }
}

/// Evaluate all arguments left to right, stopping at the first failure.
pub fn evaluate_args(
    args: &[ExpressionRef],
    ctx: &EvaluationContext<'_>,
) -> EvalResult<Vec<AttributeValue>> {
    args.iter().map(|arg| arg.evaluate(ctx)).collect()
}

/// Checked cast of an evaluated argument to its native parameter type.
pub fn cast_arg<'v, T: NativeValue>(
    function: &str,
    value: &'v AttributeValue,
) -> EvalResult<&'v T> {
    Datatype::<T>::new().cast(value).map_err(|e| {
        IndeterminateError::processing(format!(
            "Function {}: Invalid arg types. Expected: {}, actual: {}",
            function, e.expected, e.actual
        ))
    })
}

/// Split evaluated arguments into exactly `N` values.
pub fn fixed_args<'v, const N: usize>(
    function: &str,
    values: &'v [AttributeValue],
) -> EvalResult<&'v [AttributeValue; N]> {
    values.try_into().map_err(|_| {
        IndeterminateError::processing(format!(
            "Function {}: expected {} args, got {}",
            function,
            N,
            values.len()
        ))
    })
}

// ---------------------------------------------------------------------------
// StandardFunction: signature plus a body over evaluated values
// ---------------------------------------------------------------------------

type ValueBody = Arc<dyn Fn(&str, &[AttributeValue]) -> EvalResult<AttributeValue> + Send + Sync>;

/// Function with eager argument evaluation.
#[derive(Clone)]
pub struct StandardFunction {
    signature: FunctionSignature,
    body: ValueBody,
}

impl StandardFunction {
    pub fn new<F>(signature: FunctionSignature, body: F) -> Self
    where
        F: Fn(&str, &[AttributeValue]) -> EvalResult<AttributeValue> + Send + Sync + 'static,
    {
        Self {
            signature,
            body: Arc::new(body),
        }
    }
}

impl fmt::Debug for StandardFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardFunction")
            .field("signature", &self.signature)
            .finish()
    }
}

impl Function for StandardFunction {
    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn new_call(&self, args: Vec<ExpressionRef>) -> PolicyResult<FunctionCall> {
        let body = Arc::clone(&self.body);
        let name = self.signature.name.clone();
        FunctionCall::eager(&self.signature, args, move |values| body(&name, values))
    }
}

// ---------------------------------------------------------------------------
// FunctionRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn Function>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the standard function library.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        let all = equality::functions()
            .into_iter()
            .chain(comparison::functions())
            .chain(arithmetic::functions())
            .chain(logical::functions())
            .chain(matching::functions());
        for function in all {
            registry.functions.insert(function.id().to_string(), function);
        }
        registry
    }

    /// Register an extension function. Ids must be unique.
    pub fn register(&mut self, function: Arc<dyn Function>) -> PolicyResult<()> {
        let id = function.id().to_string();
        if self.functions.contains_key(&id) {
            return Err(PolicyError::InvalidArgument(format!(
                "function {} is already registered",
                id
            )));
        }
        self.functions.insert(id, function);
        Ok(())
    }

    pub fn get(&self, id: &str) -> PolicyResult<Arc<dyn Function>> {
        self.functions
            .get(id)
            .cloned()
            .ok_or_else(|| PolicyError::UnknownFunction(id.to_string()))
    }

    /// Look up `id` and bind `args` to it.
    pub fn call(&self, id: &str, args: Vec<ExpressionRef>) -> PolicyResult<ExpressionRef> {
        Ok(self.get(id)?.new_call(args)?.into_ref())
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Constant;
    use arbiter_core::{IndividualDecisionRequest, IntegerValue, StatusCode, StringValue};

    fn int(v: i64) -> ExpressionRef {
        Constant::new(IntegerValue::new(v)).into_ref()
    }

    fn string(v: &str) -> ExpressionRef {
        Constant::new(StringValue::new(v)).into_ref()
    }

    #[derive(Debug)]
    struct Failing;

    impl Expression for Failing {
        fn return_type(&self) -> DatatypeId {
            DatatypeId::Integer
        }

        fn evaluate(&self, _ctx: &EvaluationContext<'_>) -> EvalResult<AttributeValue> {
            Err(IndeterminateError::missing_attribute("first failure"))
        }
    }

    /// Declares integer but yields a string, to reach the runtime cast check.
    #[derive(Debug)]
    struct Lying;

    impl Expression for Lying {
        fn return_type(&self) -> DatatypeId {
            DatatypeId::Integer
        }

        fn evaluate(&self, _ctx: &EvaluationContext<'_>) -> EvalResult<AttributeValue> {
            Ok(AttributeValue::String(StringValue::new("not a number")))
        }
    }

    #[test]
    fn test_standard_registry_contents() {
        let registry = FunctionRegistry::standard();
        assert!(registry.len() >= 30);
        for id in [
            "urn:oasis:names:tc:xacml:1.0:function:string-equal",
            "urn:oasis:names:tc:xacml:1.0:function:double-divide",
            "urn:oasis:names:tc:xacml:1.0:function:string-regexp-match",
            "urn:oasis:names:tc:xacml:2.0:function:ipAddress-regexp-match",
            "urn:oasis:names:tc:xacml:3.0:function:anyURI-contains",
            "urn:oasis:names:tc:xacml:1.0:function:and",
        ] {
            assert!(registry.get(id).is_ok(), "missing {}", id);
        }
    }

    #[test]
    fn test_unknown_function() {
        let err = FunctionRegistry::standard().get("urn:example:nope").unwrap_err();
        assert_eq!(err, PolicyError::UnknownFunction("urn:example:nope".into()));
    }

    #[test]
    fn test_register_rejects_duplicate() {
        let mut registry = FunctionRegistry::standard();
        let existing = registry
            .get("urn:oasis:names:tc:xacml:1.0:function:string-equal")
            .unwrap();
        assert!(registry.register(existing).is_err());
    }

    #[test]
    fn test_bind_checks_arity() {
        let registry = FunctionRegistry::standard();
        let err = registry
            .call("urn:oasis:names:tc:xacml:1.0:function:integer-equal", vec![int(1)])
            .unwrap_err();
        assert!(matches!(err, PolicyError::InvalidArity(_)));

        let err = registry
            .call("urn:oasis:names:tc:xacml:1.0:function:integer-add", vec![int(1)])
            .unwrap_err();
        assert!(matches!(err, PolicyError::InvalidArity(_)));
    }

    #[test]
    fn test_bind_checks_types() {
        let registry = FunctionRegistry::standard();
        let err = registry
            .call(
                "urn:oasis:names:tc:xacml:1.0:function:integer-equal",
                vec![int(1), string("1")],
            )
            .unwrap_err();
        match err {
            PolicyError::TypeMismatch(msg) => assert!(msg.contains("arg#1")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_first_indeterminate_propagates_unchanged() {
        let registry = FunctionRegistry::standard();
        let call = registry
            .call(
                "urn:oasis:names:tc:xacml:1.0:function:integer-add",
                vec![int(1), Arc::new(Failing), Arc::new(Lying)],
            )
            .unwrap();
        let req = IndividualDecisionRequest::new();
        let err = call.evaluate(&EvaluationContext::new(&req)).unwrap_err();
        assert_eq!(err.code, StatusCode::MissingAttribute);
        assert_eq!(err.message, "first failure");
    }

    #[test]
    fn test_runtime_cast_failure_is_processing_error() {
        let registry = FunctionRegistry::standard();
        let call = registry
            .call(
                "urn:oasis:names:tc:xacml:1.0:function:integer-add",
                vec![int(1), Arc::new(Lying)],
            )
            .unwrap();
        let req = IndividualDecisionRequest::new();
        let err = call.evaluate(&EvaluationContext::new(&req)).unwrap_err();
        assert_eq!(err.code, StatusCode::ProcessingError);
        assert!(err
            .message
            .starts_with("Function urn:oasis:names:tc:xacml:1.0:function:integer-add: Invalid arg types"));
    }
}
