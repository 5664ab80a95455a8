use std::sync::Arc;

use arbiter_core::{AttributeValue, BooleanValue, DatatypeId, IndeterminateError};

use super::{cast_arg, fixed_args, Function, FunctionCall, FunctionSignature, StandardFunction};
use super::XACML_1_0_PREFIX;
use crate::error::PolicyResult;
use crate::expression::{Expression, ExpressionRef};

/// `and` / `or`. Arguments are evaluated in order and evaluation stops at
/// the first argument equal to the short-circuit value. An Indeterminate
/// argument only decides the result when no later argument short-circuits.
#[derive(Debug)]
pub struct LogicalFunction {
    signature: FunctionSignature,
    /// `false` for `and`, `true` for `or`.
    short_circuit: bool,
}

impl LogicalFunction {
    pub fn and() -> Self {
        Self {
            signature: FunctionSignature::variadic(
                format!("{}and", XACML_1_0_PREFIX),
                DatatypeId::Boolean,
                DatatypeId::Boolean,
                0,
            ),
            short_circuit: false,
        }
    }

    pub fn or() -> Self {
        Self {
            signature: FunctionSignature::variadic(
                format!("{}or", XACML_1_0_PREFIX),
                DatatypeId::Boolean,
                DatatypeId::Boolean,
                0,
            ),
            short_circuit: true,
        }
    }
}

impl Function for LogicalFunction {
    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn new_call(&self, args: Vec<ExpressionRef>) -> PolicyResult<FunctionCall> {
        let name = self.signature.name.clone();
        let short_circuit = self.short_circuit;
        FunctionCall::lazy(&self.signature, args, move |args, ctx| {
            let mut first_error: Option<IndeterminateError> = None;
            for arg in args {
                match arg.evaluate(ctx) {
                    Ok(value) => {
                        if cast_arg::<BooleanValue>(&name, &value)?.value() == short_circuit {
                            return Ok(BooleanValue::new(short_circuit).into());
                        }
                    }
                    Err(e) => {
                        first_error.get_or_insert(e);
                    }
                }
            }
            match first_error {
                Some(e) => Err(e),
                None => Ok(BooleanValue::new(!short_circuit).into()),
            }
        })
    }
}

fn not() -> StandardFunction {
    let signature = FunctionSignature::fixed(
        format!("{}not", XACML_1_0_PREFIX),
        DatatypeId::Boolean,
        vec![DatatypeId::Boolean],
    );
    StandardFunction::new(signature, |f, values| {
        let [a] = fixed_args::<1>(f, values)?;
        Ok(AttributeValue::from(cast_arg::<BooleanValue>(f, a)?.not()))
    })
}

pub fn functions() -> Vec<Arc<dyn Function>> {
    vec![
        Arc::new(LogicalFunction::and()) as Arc<dyn Function>,
        Arc::new(LogicalFunction::or()),
        Arc::new(not()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EvaluationContext;
    use crate::expression::{Constant, Expression};
    use arbiter_core::{EvalResult, IndividualDecisionRequest, StatusCode};

    #[derive(Debug)]
    struct Broken;

    impl Expression for Broken {
        fn return_type(&self) -> DatatypeId {
            DatatypeId::Boolean
        }

        fn evaluate(&self, _ctx: &EvaluationContext<'_>) -> EvalResult<AttributeValue> {
            Err(IndeterminateError::processing("broken"))
        }
    }

    fn b(v: bool) -> ExpressionRef {
        Constant::new(BooleanValue::new(v)).into_ref()
    }

    fn broken() -> ExpressionRef {
        Arc::new(Broken)
    }

    fn run(f: &dyn Function, args: Vec<ExpressionRef>) -> EvalResult<bool> {
        let req = IndividualDecisionRequest::new();
        let value = f.new_call(args).unwrap().evaluate(&EvaluationContext::new(&req))?;
        Ok(value == AttributeValue::from(BooleanValue::TRUE))
    }

    #[test]
    fn test_and() {
        let and = LogicalFunction::and();
        assert!(run(&and, vec![]).unwrap());
        assert!(run(&and, vec![b(true), b(true)]).unwrap());
        assert!(!run(&and, vec![b(true), b(false)]).unwrap());
    }

    #[test]
    fn test_and_false_wins_over_indeterminate() {
        let and = LogicalFunction::and();
        assert!(!run(&and, vec![broken(), b(false)]).unwrap());
        let err = run(&and, vec![broken(), b(true)]).unwrap_err();
        assert_eq!(err.code, StatusCode::ProcessingError);
    }

    #[test]
    fn test_or() {
        let or = LogicalFunction::or();
        assert!(!run(&or, vec![]).unwrap());
        assert!(run(&or, vec![b(false), broken(), b(true)]).unwrap());
        assert!(run(&or, vec![b(false), broken()]).is_err());
    }

    #[test]
    fn test_not() {
        let not = not();
        assert!(!run(&not, vec![b(true)]).unwrap());
        assert!(run(&not, vec![b(false)]).unwrap());
    }
}
