//! Non-equal-type match functions: two parameters of possibly different
//! datatypes, a boolean result, built from a pure matcher over the lexical
//! text of both arguments.

use std::marker::PhantomData;
use std::sync::Arc;

use arbiter_core::{
    AnyUriValue, BooleanValue, DatatypeId, IndeterminateError, IpAddressValue, LexicalText,
    NativeValue, StringValue,
};
use regex::Regex;
use tracing::debug;

use super::{cast_arg, fixed_args, Function, FunctionCall, FunctionSignature};
use super::{XACML_1_0_PREFIX, XACML_2_0_PREFIX, XACML_3_0_PREFIX};
use crate::error::{PolicyError, PolicyResult};
use crate::expression::{Expression, ExpressionRef};

/// `matcher(arg0, arg1)`; `Err` carries the operation-specific message.
pub type Matcher = fn(&str, &str) -> Result<bool, String>;

pub fn regexp_matcher(pattern: &str, input: &str) -> Result<bool, String> {
    let regex = Regex::new(pattern)
        .map_err(|e| format!("Invalid regular expression in arg#0 ({})", e))?;
    Ok(regex.is_match(input))
}

pub fn starts_with_matcher(prefix: &str, input: &str) -> Result<bool, String> {
    Ok(input.starts_with(prefix))
}

pub fn ends_with_matcher(suffix: &str, input: &str) -> Result<bool, String> {
    Ok(input.ends_with(suffix))
}

pub fn contains_matcher(part: &str, input: &str) -> Result<bool, String> {
    Ok(input.contains(part))
}

#[derive(Debug)]
pub struct NonEqualTypeMatchFunction<T0, T1> {
    signature: FunctionSignature,
    matcher: Matcher,
    /// Compile a constant first argument once, at bind time.
    precompile_regex: bool,
    _params: PhantomData<fn() -> (T0, T1)>,
}

impl<T0, T1> NonEqualTypeMatchFunction<T0, T1>
where
    T0: NativeValue + LexicalText,
    T1: NativeValue + LexicalText,
{
    pub fn new(name: impl Into<String>, matcher: Matcher) -> Self {
        Self {
            signature: FunctionSignature::fixed(
                name,
                DatatypeId::Boolean,
                vec![T0::DATATYPE, T1::DATATYPE],
            ),
            matcher,
            precompile_regex: false,
            _params: PhantomData,
        }
    }

    /// Regular-expression match of the second argument against the pattern
    /// in the first (unanchored search).
    pub fn regexp(name: impl Into<String>) -> Self {
        Self {
            precompile_regex: true,
            ..Self::new(name, regexp_matcher)
        }
    }

    /// Call that always goes through the matcher, compiling nothing ahead.
    pub fn new_generic_call(&self, args: Vec<ExpressionRef>) -> PolicyResult<FunctionCall> {
        let name = self.signature.name.clone();
        let matcher = self.matcher;
        FunctionCall::eager(&self.signature, args, move |values| {
            let [a, b] = fixed_args::<2>(&name, values)?;
            let arg0 = cast_arg::<T0>(&name, a)?;
            let arg1 = cast_arg::<T1>(&name, b)?;
            let matched = matcher(arg0.text(), arg1.text()).map_err(|msg| {
                IndeterminateError::processing(format!("Function {}: {}", name, msg))
            })?;
            Ok(BooleanValue::new(matched).into())
        })
    }

    fn new_precompiled_call(
        &self,
        pattern: &T0,
        args: Vec<ExpressionRef>,
    ) -> PolicyResult<FunctionCall> {
        let name = self.signature.name.clone();
        let regex = Regex::new(pattern.text()).map_err(|e| {
            PolicyError::InvalidArgument(format!(
                "Function {}: Invalid regular expression in arg#0 ({})",
                name, e
            ))
        })?;
        debug!(function = %name, pattern = %pattern.text(), "regular expression compiled at bind time");
        FunctionCall::eager(&self.signature, args, move |values| {
            let [_, input] = fixed_args::<2>(&name, values)?;
            let input = cast_arg::<T1>(&name, input)?;
            Ok(BooleanValue::new(regex.is_match(input.text())).into())
        })
    }
}

impl<T0, T1> Function for NonEqualTypeMatchFunction<T0, T1>
where
    T0: NativeValue + LexicalText + std::fmt::Debug,
    T1: NativeValue + LexicalText + std::fmt::Debug,
{
    fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    fn new_call(&self, args: Vec<ExpressionRef>) -> PolicyResult<FunctionCall> {
        if self.precompile_regex {
            if let Some(constant) = args.first().and_then(|a| a.constant_value()) {
                self.signature.check_args(&args)?;
                let pattern = T0::downcast(constant).cloned().ok_or_else(|| {
                    PolicyError::TypeMismatch(format!(
                        "Function {}: Invalid type ({}) for arg#0. Expected: {}",
                        self.signature.name,
                        constant.datatype(),
                        T0::DATATYPE
                    ))
                })?;
                return self.new_precompiled_call(&pattern, args);
            }
        }
        self.new_generic_call(args)
    }
}

pub fn functions() -> Vec<Arc<dyn Function>> {
    let mut functions: Vec<Arc<dyn Function>> = Vec::new();
    functions.push(Arc::new(
        NonEqualTypeMatchFunction::<StringValue, StringValue>::regexp(format!(
            "{}string-regexp-match",
            XACML_1_0_PREFIX
        )),
    ));
    functions.push(Arc::new(
        NonEqualTypeMatchFunction::<StringValue, AnyUriValue>::regexp(format!(
            "{}anyURI-regexp-match",
            XACML_2_0_PREFIX
        )),
    ));
    functions.push(Arc::new(
        NonEqualTypeMatchFunction::<StringValue, IpAddressValue>::regexp(format!(
            "{}ipAddress-regexp-match",
            XACML_2_0_PREFIX
        )),
    ));

    let text_matchers: [(&str, Matcher); 3] = [
        ("starts-with", starts_with_matcher),
        ("ends-with", ends_with_matcher),
        ("contains", contains_matcher),
    ];
    for (suffix, matcher) in text_matchers {
        functions.push(Arc::new(
            NonEqualTypeMatchFunction::<StringValue, StringValue>::new(
                format!("{}string-{}", XACML_3_0_PREFIX, suffix),
                matcher,
            ),
        ));
        functions.push(Arc::new(
            NonEqualTypeMatchFunction::<StringValue, AnyUriValue>::new(
                format!("{}anyURI-{}", XACML_3_0_PREFIX, suffix),
                matcher,
            ),
        ));
    }
    functions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::EvaluationContext;
    use crate::expression::{AttributeDesignator, Constant, Expression};
    use arbiter_core::{
        categories, AttributeKey, AttributeValue, EvalResult, IndividualDecisionRequest,
        StatusCode,
    };
    use proptest::prelude::*;

    type StringRegexp = NonEqualTypeMatchFunction<StringValue, StringValue>;

    fn pattern_key() -> AttributeKey {
        AttributeKey::new(categories::RESOURCE, "pattern", DatatypeId::String)
    }

    fn input_key() -> AttributeKey {
        AttributeKey::new(categories::RESOURCE, "input", DatatypeId::String)
    }

    fn string(v: &str) -> ExpressionRef {
        Constant::new(StringValue::new(v)).into_ref()
    }

    fn input() -> ExpressionRef {
        AttributeDesignator::new(input_key(), true).into_ref()
    }

    fn eval(call: &FunctionCall, req: &IndividualDecisionRequest) -> EvalResult<bool> {
        let value = call.evaluate(&EvaluationContext::new(req))?;
        Ok(value == AttributeValue::from(BooleanValue::TRUE))
    }

    fn request(pattern: &str, text: &str) -> IndividualDecisionRequest {
        IndividualDecisionRequest::new()
            .with_attribute(pattern_key(), StringValue::new(pattern).into())
            .with_attribute(input_key(), StringValue::new(text).into())
    }

    #[test]
    fn test_regexp_is_unanchored_search() {
        let f = StringRegexp::regexp("string-regexp-match");
        let call = f.new_call(vec![string("b+c"), input()]).unwrap();
        assert!(eval(&call, &request("", "abbbcd")).unwrap());
        assert!(!eval(&call, &request("", "acd")).unwrap());

        let anchored = f.new_call(vec![string("^b"), input()]).unwrap();
        assert!(!eval(&anchored, &request("", "abc")).unwrap());
    }

    #[test]
    fn test_invalid_constant_regex_fails_at_bind() {
        let f = StringRegexp::regexp("string-regexp-match");
        let err = f.new_call(vec![string("(unclosed"), input()]).unwrap_err();
        match err {
            PolicyError::InvalidArgument(msg) => {
                assert!(msg.contains("Invalid regular expression in arg#0"))
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_invalid_dynamic_regex_is_processing_error() {
        let f = StringRegexp::regexp("string-regexp-match");
        let pattern = AttributeDesignator::new(pattern_key(), true).into_ref();
        let call = f.new_call(vec![pattern, input()]).unwrap();
        let err = eval(&call, &request("(unclosed", "x")).unwrap_err();
        assert_eq!(err.code, StatusCode::ProcessingError);
        assert!(err
            .message
            .starts_with("Function string-regexp-match: Invalid regular expression in arg#0"));
    }

    #[test]
    fn test_ip_address_regexp_matches_lexical_form() {
        let f = NonEqualTypeMatchFunction::<StringValue, IpAddressValue>::regexp("ip-regexp");
        let ip = Constant::parse(DatatypeId::IpAddress, "10.0.0.1/24:80").unwrap().into_ref();
        let call = f.new_call(vec![string(r"^10\.0\.0\.\d+/24"), ip]).unwrap();
        assert!(eval(&call, &IndividualDecisionRequest::new()).unwrap());
    }

    #[test]
    fn test_text_matchers() {
        let registry = crate::function::FunctionRegistry::standard();
        let uri = Constant::parse(DatatypeId::AnyUri, "https://example.com/docs/a")
            .unwrap()
            .into_ref();
        let call = registry
            .get("urn:oasis:names:tc:xacml:3.0:function:anyURI-starts-with")
            .unwrap()
            .new_call(vec![string("https://example.com/"), uri.clone()])
            .unwrap();
        assert!(eval(&call, &IndividualDecisionRequest::new()).unwrap());

        let call = registry
            .get("urn:oasis:names:tc:xacml:3.0:function:anyURI-contains")
            .unwrap()
            .new_call(vec![string("/private/"), uri])
            .unwrap();
        assert!(!eval(&call, &IndividualDecisionRequest::new()).unwrap());
    }

    #[test]
    fn test_precompile_rejects_wrong_arg_types() {
        let f = StringRegexp::regexp("string-regexp-match");
        let err = f
            .new_call(vec![
                Constant::parse(DatatypeId::Integer, "1").unwrap().into_ref(),
                input(),
            ])
            .unwrap_err();
        assert!(matches!(err, PolicyError::TypeMismatch(_)));
    }

    #[test]
    fn test_invalid_pattern_fails_at_bind_but_is_indeterminate_when_dynamic() {
        let f = NonEqualTypeMatchFunction::<StringValue, AnyUriValue>::regexp("anyURI-regexp-match");
        let uri = Constant::parse(DatatypeId::AnyUri, "https://example.com/a")
            .unwrap()
            .into_ref();
        let bad = "a(b";
        assert!(matches!(
            f.new_call(vec![string(bad), uri.clone()]),
            Err(PolicyError::InvalidArgument(_))
        ));

        let pattern = AttributeDesignator::new(pattern_key(), true).into_ref();
        let call = f.new_call(vec![pattern, uri]).unwrap();
        let err = eval(&call, &request(bad, "")).unwrap_err();
        assert_eq!(err.code, StatusCode::ProcessingError);
        assert!(err
            .message
            .starts_with("Function anyURI-regexp-match: Invalid regular expression in arg#0"));
    }

    /// Patterns over `chars` that compile.
    fn valid_pattern(chars: &'static str) -> impl Strategy<Value = String> {
        chars.prop_filter("pattern must compile", |p| Regex::new(p).is_ok())
    }

    fn agree<T1>(f: &NonEqualTypeMatchFunction<StringValue, T1>, pattern: &str, value: ExpressionRef)
    where
        T1: NativeValue + LexicalText + std::fmt::Debug,
    {
        let optimized = f.new_call(vec![string(pattern), value.clone()]).unwrap();
        let generic = f.new_generic_call(vec![string(pattern), value]).unwrap();
        let req = IndividualDecisionRequest::new();
        assert_eq!(
            eval(&optimized, &req).unwrap(),
            eval(&generic, &req).unwrap(),
            "pattern {:?}",
            pattern
        );
    }

    proptest! {
        #[test]
        fn test_string_regexp_paths_agree(
            pattern in valid_pattern("[a-c.*+?|()0-9^$]{0,8}"),
            text in "[a-c0-9]{0,12}",
        ) {
            let f = StringRegexp::regexp("string-regexp-match");
            agree(&f, &pattern, string(&text));
        }

        #[test]
        fn test_any_uri_regexp_paths_agree(
            pattern in valid_pattern("[a-c.*+?|()/:^$]{0,8}"),
            path in "[a-c/.]{0,10}",
        ) {
            let f = NonEqualTypeMatchFunction::<StringValue, AnyUriValue>::regexp("anyURI-regexp-match");
            let uri = Constant::parse(DatatypeId::AnyUri, &format!("http://ab.c/{}", path))
                .unwrap()
                .into_ref();
            agree(&f, &pattern, uri);
        }

        #[test]
        fn test_ip_address_regexp_paths_agree(
            pattern in valid_pattern("[0-9.*+?|()/:^$]{0,8}"),
            octets in any::<[u8; 4]>(),
            prefix in prop::option::of(0u8..=32),
            port in prop::option::of(any::<u16>()),
        ) {
            let mut lexical = format!("{}.{}.{}.{}", octets[0], octets[1], octets[2], octets[3]);
            if let Some(p) = prefix {
                lexical.push_str(&format!("/{}", p));
            }
            if let Some(p) = port {
                lexical.push_str(&format!(":{}", p));
            }
            let f = NonEqualTypeMatchFunction::<StringValue, IpAddressValue>::regexp("ipAddress-regexp-match");
            let ip = Constant::parse(DatatypeId::IpAddress, &lexical).unwrap().into_ref();
            agree(&f, &pattern, ip);
        }
    }
}
