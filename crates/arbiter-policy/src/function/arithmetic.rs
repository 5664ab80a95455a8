use std::sync::Arc;

use arbiter_core::{
    AttributeValue, DoubleValue, EvalResult, IndeterminateError, IntegerValue, NativeValue,
    NumericValue, ValueResult,
};

use super::{cast_arg, fixed_args, Function, FunctionSignature, StandardFunction};
use super::XACML_1_0_PREFIX;

fn operands<T: NumericValue>(function: &str, values: &[AttributeValue]) -> EvalResult<Vec<T>> {
    values
        .iter()
        .map(|v| cast_arg::<T>(function, v).cloned())
        .collect()
}

/// `add` / `multiply`: variadic, at least two operands, folded left to right.
fn variadic<T: NumericValue>(
    name: String,
    op: fn(&T, &[T]) -> ValueResult<T>,
) -> StandardFunction {
    let signature = FunctionSignature::variadic(name, T::DATATYPE, T::DATATYPE, 2);
    StandardFunction::new(signature, move |f, values| {
        let nums = operands::<T>(f, values)?;
        match nums.split_first() {
            Some((first, rest)) => Ok(op(first, rest)?.into_attribute()),
            None => Err(IndeterminateError::processing(format!(
                "Function {}: no operands",
                f
            ))),
        }
    })
}

fn binary<T: NumericValue>(
    name: String,
    op: fn(&T, &T) -> ValueResult<T>,
) -> StandardFunction {
    let signature = FunctionSignature::fixed(name, T::DATATYPE, vec![T::DATATYPE, T::DATATYPE]);
    StandardFunction::new(signature, move |f, values| {
        let [a, b] = fixed_args::<2>(f, values)?;
        Ok(op(cast_arg::<T>(f, a)?, cast_arg::<T>(f, b)?)?.into_attribute())
    })
}

fn unary<T: NativeValue>(
    name: String,
    op: fn(&T) -> ValueResult<T>,
) -> StandardFunction {
    let signature = FunctionSignature::fixed(name, T::DATATYPE, vec![T::DATATYPE]);
    StandardFunction::new(signature, move |f, values| {
        let [a] = fixed_args::<1>(f, values)?;
        Ok(op(cast_arg::<T>(f, a)?)?.into_attribute())
    })
}

fn numeric_family<T: NumericValue>(prefix: &str, functions: &mut Vec<Arc<dyn Function>>) {
    let id = |op: &str| format!("{}{}-{}", XACML_1_0_PREFIX, prefix, op);
    functions.push(Arc::new(variadic::<T>(id("add"), T::add)));
    functions.push(Arc::new(variadic::<T>(id("multiply"), T::multiply)));
    functions.push(Arc::new(binary::<T>(id("subtract"), T::subtract)));
    functions.push(Arc::new(binary::<T>(id("divide"), T::divide)));
    functions.push(Arc::new(unary::<T>(id("abs"), T::abs)));
}

pub fn functions() -> Vec<Arc<dyn Function>> {
    let mut functions: Vec<Arc<dyn Function>> = Vec::new();
    numeric_family::<IntegerValue>("integer", &mut functions);
    numeric_family::<DoubleValue>("double", &mut functions);
    functions.push(Arc::new(binary::<IntegerValue>(
        format!("{}integer-mod", XACML_1_0_PREFIX),
        IntegerValue::modulo,
    )));
    functions.push(Arc::new(unary::<DoubleValue>(
        format!("{}floor", XACML_1_0_PREFIX),
        |d| Ok(d.floor()),
    )));
    functions.push(Arc::new(unary::<DoubleValue>(
        format!("{}round", XACML_1_0_PREFIX),
        |d| Ok(d.round_ieee754_default()),
    )));
    functions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EvaluationContext;
    use crate::expression::{Constant, Expression, ExpressionRef};
    use crate::function::FunctionRegistry;
    use arbiter_core::{DatatypeId, IndividualDecisionRequest, StatusCode};

    fn call(id: &str, args: Vec<ExpressionRef>) -> EvalResult<AttributeValue> {
        let registry = FunctionRegistry::standard();
        let expr = registry
            .call(&format!("{}{}", XACML_1_0_PREFIX, id), args)
            .unwrap();
        let req = IndividualDecisionRequest::new();
        expr.evaluate(&EvaluationContext::new(&req))
    }

    fn d(lexical: &str) -> ExpressionRef {
        Constant::parse(DatatypeId::Double, lexical).unwrap().into_ref()
    }

    fn i(v: i64) -> ExpressionRef {
        Constant::new(IntegerValue::new(v)).into_ref()
    }

    #[test]
    fn test_double_add_many() {
        let v = call("double-add", vec![d("1.5"), d("2"), d("-0.5")]).unwrap();
        assert_eq!(v, AttributeValue::from(DoubleValue::new(3.0)));
    }

    #[test]
    fn test_integer_multiply() {
        let v = call("integer-multiply", vec![i(2), i(3), i(7)]).unwrap();
        assert_eq!(v, AttributeValue::from(IntegerValue::new(42)));
    }

    #[test]
    fn test_double_divide_by_zero_message() {
        let err = call("double-divide", vec![d("1"), d("0")]).unwrap_err();
        assert_eq!(
            err,
            IndeterminateError::processing("Illegal division by zero")
        );
    }

    #[test]
    fn test_integer_overflow_is_processing_error() {
        let err = call("integer-add", vec![i(i64::MAX), i(1)]).unwrap_err();
        assert_eq!(err.code, StatusCode::ProcessingError);
    }

    #[test]
    fn test_mod_floor_round() {
        assert_eq!(
            call("integer-mod", vec![i(7), i(3)]).unwrap(),
            AttributeValue::from(IntegerValue::new(1))
        );
        assert_eq!(
            call("floor", vec![d("-1.5")]).unwrap(),
            AttributeValue::from(DoubleValue::new(-2.0))
        );
        assert_eq!(
            call("round", vec![d("2.5")]).unwrap(),
            AttributeValue::from(DoubleValue::new(2.0))
        );
        assert_eq!(
            call("double-abs", vec![d("-INF")]).unwrap(),
            AttributeValue::from(DoubleValue::new(f64::INFINITY))
        );
    }
}
