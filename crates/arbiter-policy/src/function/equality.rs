use std::sync::Arc;

use arbiter_core::{
    AnyUriValue, BooleanValue, DatatypeId, DoubleValue, IntegerValue, IpAddressValue, NativeValue,
    StringValue,
};

use super::{cast_arg, fixed_args, Function, FunctionSignature, StandardFunction};
use super::{EXTENSION_PREFIX, XACML_1_0_PREFIX};

/// `<type>-equal`: both arguments of type `T`, native equality.
///
/// Doubles compare with total-order equality (NaN equals NaN, `-0.0` differs
/// from `0.0`); IP addresses compare their parsed form.
pub fn equal<T: NativeValue + PartialEq>(name: String) -> StandardFunction {
    let signature =
        FunctionSignature::fixed(name, DatatypeId::Boolean, vec![T::DATATYPE, T::DATATYPE]);
    StandardFunction::new(signature, |f, values| {
        let [a, b] = fixed_args::<2>(f, values)?;
        let equal = cast_arg::<T>(f, a)? == cast_arg::<T>(f, b)?;
        Ok(BooleanValue::new(equal).into())
    })
}

pub fn functions() -> Vec<Arc<dyn Function>> {
    let id = |name: &str| format!("{}{}", XACML_1_0_PREFIX, name);
    let mut functions: Vec<Arc<dyn Function>> = Vec::new();
    functions.push(Arc::new(equal::<StringValue>(id("string-equal"))));
    functions.push(Arc::new(equal::<BooleanValue>(id("boolean-equal"))));
    functions.push(Arc::new(equal::<IntegerValue>(id("integer-equal"))));
    functions.push(Arc::new(equal::<DoubleValue>(id("double-equal"))));
    functions.push(Arc::new(equal::<AnyUriValue>(id("anyURI-equal"))));
    functions.push(Arc::new(equal::<IpAddressValue>(format!(
        "{}ipAddress-equal",
        EXTENSION_PREFIX
    ))));
    functions
}
