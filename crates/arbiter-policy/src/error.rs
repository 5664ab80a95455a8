use thiserror::Error;

/// Configuration errors raised while binding expressions, building
/// combining evaluators or assembling policies.
///
/// All of these are fatal at construction time; nothing here is raised
/// during evaluation (evaluation failures are Indeterminate decisions).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    #[error("invalid arity: {0}")]
    InvalidArity(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    #[error("unknown combining algorithm: {0}")]
    UnknownCombiningAlgorithm(String),

    #[error("invalid combining algorithm parameters: {0}")]
    InvalidCombiningParameters(String),

    #[error("legacy combining algorithm disabled: {0}")]
    LegacyAlgorithmDisabled(String),

    #[error("invalid policy: {0}")]
    InvalidPolicy(String),
}

pub type PolicyResult<T> = Result<T, PolicyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_error_variants() {
        let errors = vec![
            PolicyError::TypeMismatch("arg#0".into()),
            PolicyError::InvalidArity("expected 2".into()),
            PolicyError::InvalidArgument("bad regex".into()),
            PolicyError::UnknownFunction("f".into()),
            PolicyError::UnknownCombiningAlgorithm("a".into()),
            PolicyError::InvalidCombiningParameters("p".into()),
            PolicyError::LegacyAlgorithmDisabled("l".into()),
            PolicyError::InvalidPolicy("x".into()),
        ];
        for err in errors {
            assert!(!err.to_string().is_empty());
        }
    }

    #[test]
    fn test_policy_result_type_alias() {
        fn unknown() -> PolicyResult<u32> {
            Err(PolicyError::UnknownFunction("urn:example:f".into()))
        }
        assert_eq!(
            unknown().unwrap_err().to_string(),
            "unknown function: urn:example:f"
        );
    }
}
