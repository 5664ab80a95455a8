//! Arbiter policy evaluation
//!
//! Expressions and the standard function library, rules and policies, and
//! the combining algorithm engine that folds child decisions into one
//! extended decision.
//!
//! Everything here is built once (binding, type checking, regex
//! compilation, combining evaluator construction) and then evaluated
//! concurrently by many requests without locking.

pub mod combining;
pub mod context;
pub mod error;
pub mod expression;
pub mod function;
pub mod obligation;
pub mod policy;
pub mod rule;

pub use combining::{
    CombinedElement, CombinerParameter, CombiningAlg, CombiningAlgRegistry, CombiningEvaluator,
    Decidable, DecidableKind, DecisionOutcome,
};
pub use context::EvaluationContext;
pub use error::{PolicyError, PolicyResult};
pub use expression::{AttributeDesignator, Constant, Expression, ExpressionRef};
pub use function::matching::NonEqualTypeMatchFunction;
pub use function::{Function, FunctionCall, FunctionRegistry, FunctionSignature};
pub use obligation::PepActionExpression;
pub use policy::Policy;
pub use rule::Rule;
