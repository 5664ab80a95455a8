use std::cmp::Ordering;
use std::sync::Arc;

use arbiter_core::{BooleanValue, DatatypeId, DoubleValue, IntegerValue, NativeValue};

use super::{cast_arg, fixed_args, Function, FunctionSignature, StandardFunction};
use super::XACML_1_0_PREFIX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl Comparison {
    fn suffix(self) -> &'static str {
        match self {
            Comparison::GreaterThan => "greater-than",
            Comparison::GreaterThanOrEqual => "greater-than-or-equal",
            Comparison::LessThan => "less-than",
            Comparison::LessThanOrEqual => "less-than-or-equal",
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Comparison::GreaterThan => ordering == Ordering::Greater,
            Comparison::GreaterThanOrEqual => ordering != Ordering::Less,
            Comparison::LessThan => ordering == Ordering::Less,
            Comparison::LessThanOrEqual => ordering != Ordering::Greater,
        }
    }
}

pub fn compare<T: NativeValue + Ord>(name: String, comparison: Comparison) -> StandardFunction {
    let signature =
        FunctionSignature::fixed(name, DatatypeId::Boolean, vec![T::DATATYPE, T::DATATYPE]);
    StandardFunction::new(signature, move |f, values| {
        let [a, b] = fixed_args::<2>(f, values)?;
        let ordering = cast_arg::<T>(f, a)?.cmp(cast_arg::<T>(f, b)?);
        Ok(BooleanValue::new(comparison.holds(ordering)).into())
    })
}

pub fn functions() -> Vec<Arc<dyn Function>> {
    let mut functions: Vec<Arc<dyn Function>> = Vec::new();
    for comparison in [
        Comparison::GreaterThan,
        Comparison::GreaterThanOrEqual,
        Comparison::LessThan,
        Comparison::LessThanOrEqual,
    ] {
        let id = |ty: &str| format!("{}{}-{}", XACML_1_0_PREFIX, ty, comparison.suffix());
        functions.push(Arc::new(compare::<IntegerValue>(id("integer"), comparison)));
        functions.push(Arc::new(compare::<DoubleValue>(id("double"), comparison)));
    }
    functions
}
