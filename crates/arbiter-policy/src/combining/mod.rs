//! Combining algorithm engine.
//!
//! An algorithm turns an ordered list of child decidables, fixed at
//! construction, into a stateless [`CombiningEvaluator`]. Each evaluation
//! visits the children in order and feeds their decisions to a fold; the
//! fold may stop early, and its result is a pure function of the sequence of
//! child decisions it saw.

pub mod legacy;
pub mod standard;

use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use arbiter_core::{
    AttributeValue, ExtendedDecision, ExtendedIndeterminate, PepActions, PepActionsBuilder,
    PolicyRef, Status,
};
use tracing::debug;

use crate::context::EvaluationContext;
use crate::error::{PolicyError, PolicyResult};

// ---------------------------------------------------------------------------
// Decidable: a combinable element (rule, policy, policy set)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecidableKind {
    Rule,
    Policy,
}

impl fmt::Display for DecidableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecidableKind::Rule => write!(f, "rule"),
            DecidableKind::Policy => write!(f, "policy"),
        }
    }
}

/// Decision of one decidable plus the PEP actions that go with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionOutcome {
    pub decision: ExtendedDecision,
    /// Only actions applying to `decision` (empty unless Permit or Deny).
    pub pep_actions: PepActions,
}

impl DecisionOutcome {
    pub fn new(decision: ExtendedDecision) -> Self {
        Self {
            decision,
            pep_actions: PepActions::default(),
        }
    }

    pub fn not_applicable() -> Self {
        Self::new(ExtendedDecision::NotApplicable)
    }

    pub fn indeterminate(extended: ExtendedIndeterminate, status: Status) -> Self {
        Self::new(ExtendedDecision::indeterminate(extended, status))
    }
}

pub trait Decidable: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    fn kind(&self) -> DecidableKind;

    /// Evaluate against one request. `applicable` is `Some` only when the
    /// request asks for applicable policy ids.
    fn evaluate(
        &self,
        ctx: &EvaluationContext<'_>,
        applicable: Option<&mut Vec<PolicyRef>>,
    ) -> DecisionOutcome;
}

// ---------------------------------------------------------------------------
// CombiningAlg / CombiningEvaluator
// ---------------------------------------------------------------------------

/// Combiner parameter attached to one child element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinerParameter {
    pub name: String,
    pub value: AttributeValue,
}

#[derive(Debug, Clone)]
pub struct CombinedElement {
    pub decidable: Arc<dyn Decidable>,
    pub parameters: Vec<CombinerParameter>,
}

impl CombinedElement {
    pub fn new(decidable: Arc<dyn Decidable>) -> Self {
        Self {
            decidable,
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.parameters.push(CombinerParameter {
            name: name.into(),
            value,
        });
        self
    }
}

pub trait CombiningEvaluator: Send + Sync + fmt::Debug {
    /// Combine the children's decisions. Child PEP actions are appended to
    /// `out_pep_actions` only for a Permit or Deny result, and only those
    /// applying to it. Applicable policy ids of every child that was not
    /// NotApplicable are appended to `out_applicable` when it is `Some`.
    fn evaluate(
        &self,
        ctx: &EvaluationContext<'_>,
        out_pep_actions: &mut PepActionsBuilder,
        out_applicable: Option<&mut Vec<PolicyRef>>,
    ) -> ExtendedDecision;
}

pub trait CombiningAlg: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    /// Kind of child element this algorithm combines.
    fn combined_kind(&self) -> DecidableKind;

    /// XACML 1.x algorithms, available only when legacy support is enabled.
    fn is_legacy(&self) -> bool {
        false
    }

    fn new_evaluator(
        &self,
        elements: Vec<CombinedElement>,
    ) -> PolicyResult<Arc<dyn CombiningEvaluator>>;
}

// ---------------------------------------------------------------------------
// DecisionFold: per-evaluation algorithm state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    Stop,
}

/// Fold over child decisions. A fresh fold is created for every evaluation,
/// so evaluators carry no state between invocations.
pub trait DecisionFold: Default {
    fn step(&mut self, decision: &ExtendedDecision) -> Step;

    fn finish(self) -> ExtendedDecision;
}

/// Status of the first Indeterminate seen, or a generic processing error.
pub(crate) fn first_status(status: Option<Status>, fallback: &str) -> Status {
    status.unwrap_or_else(|| Status::processing_error(fallback))
}

/// Evaluator running fold `F` over children in declaration order.
pub struct OrderedCombiner<F> {
    algorithm: String,
    elements: Vec<CombinedElement>,
    _fold: PhantomData<fn() -> F>,
}

impl<F> OrderedCombiner<F> {
    pub fn new(algorithm: impl Into<String>, elements: Vec<CombinedElement>) -> Self {
        Self {
            algorithm: algorithm.into(),
            elements,
            _fold: PhantomData,
        }
    }
}

impl<F> fmt::Debug for OrderedCombiner<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedCombiner")
            .field("algorithm", &self.algorithm)
            .field("elements", &self.elements.len())
            .finish()
    }
}

impl<F: DecisionFold> CombiningEvaluator for OrderedCombiner<F> {
    fn evaluate(
        &self,
        ctx: &EvaluationContext<'_>,
        out_pep_actions: &mut PepActionsBuilder,
        out_applicable: Option<&mut Vec<PolicyRef>>,
    ) -> ExtendedDecision {
        let collect_ids = out_applicable.is_some();
        let mut fold = F::default();
        let mut visited: Vec<(DecisionOutcome, Vec<PolicyRef>)> =
            Vec::with_capacity(self.elements.len());

        for element in &self.elements {
            let mut child_ids = Vec::new();
            let sink = if collect_ids { Some(&mut child_ids) } else { None };
            let outcome = element.decidable.evaluate(ctx, sink);
            let step = fold.step(&outcome.decision);
            visited.push((outcome, child_ids));
            if step == Step::Stop {
                break;
            }
        }

        let decision = fold.finish();
        if let Some(effect) = decision.effect() {
            for (outcome, _) in &visited {
                if outcome.decision.effect() == Some(effect) {
                    out_pep_actions.extend_for(effect, &outcome.pep_actions);
                }
            }
        }
        if let Some(out) = out_applicable {
            for (outcome, ids) in visited {
                if !outcome.decision.is_not_applicable() {
                    out.extend(ids);
                }
            }
        }

        debug!(
            algorithm = %self.algorithm,
            children = self.elements.len(),
            decision = %decision,
            "combined child decisions"
        );
        decision
    }
}

// ---------------------------------------------------------------------------
// FoldingAlg: algorithm defined by a fold
// ---------------------------------------------------------------------------

pub struct FoldingAlg<F> {
    id: String,
    kind: DecidableKind,
    legacy: bool,
    _fold: PhantomData<fn() -> F>,
}

impl<F> FoldingAlg<F> {
    pub fn new(id: impl Into<String>, kind: DecidableKind) -> Self {
        Self {
            id: id.into(),
            kind,
            legacy: false,
            _fold: PhantomData,
        }
    }

    pub fn legacy(id: impl Into<String>, kind: DecidableKind) -> Self {
        Self {
            legacy: true,
            ..Self::new(id, kind)
        }
    }
}

impl<F> fmt::Debug for FoldingAlg<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FoldingAlg")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("legacy", &self.legacy)
            .finish()
    }
}

/// Reject parameters (no built-in algorithm takes any) and children of the
/// wrong kind.
pub fn validate_elements(
    algorithm: &str,
    kind: DecidableKind,
    elements: &[CombinedElement],
) -> PolicyResult<()> {
    for element in elements {
        if !element.parameters.is_empty() {
            return Err(PolicyError::InvalidCombiningParameters(format!(
                "algorithm {} takes no parameters, got {} for {}",
                algorithm,
                element.parameters.len(),
                element.decidable.id()
            )));
        }
        if element.decidable.kind() != kind {
            return Err(PolicyError::InvalidPolicy(format!(
                "algorithm {} combines {} elements, {} is a {}",
                algorithm,
                kind,
                element.decidable.id(),
                element.decidable.kind()
            )));
        }
    }
    Ok(())
}

impl<F: DecisionFold + 'static> CombiningAlg for FoldingAlg<F> {
    fn id(&self) -> &str {
        &self.id
    }

    fn combined_kind(&self) -> DecidableKind {
        self.kind
    }

    fn is_legacy(&self) -> bool {
        self.legacy
    }

    fn new_evaluator(
        &self,
        elements: Vec<CombinedElement>,
    ) -> PolicyResult<Arc<dyn CombiningEvaluator>> {
        validate_elements(&self.id, self.kind, &elements)?;
        Ok(Arc::new(OrderedCombiner::<F>::new(self.id.clone(), elements)))
    }
}

// ---------------------------------------------------------------------------
// CombiningAlgRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct CombiningAlgRegistry {
    algorithms: HashMap<String, Arc<dyn CombiningAlg>>,
    enable_legacy: bool,
}

impl CombiningAlgRegistry {
    pub fn new(enable_legacy: bool) -> Self {
        Self {
            algorithms: HashMap::new(),
            enable_legacy,
        }
    }

    /// Registry with the XACML 3.0 and XACML 1.x algorithms.
    pub fn standard(enable_legacy: bool) -> Self {
        let mut registry = Self::new(enable_legacy);
        for alg in standard::algorithms().into_iter().chain(legacy::algorithms()) {
            registry.algorithms.insert(alg.id().to_string(), alg);
        }
        registry
    }

    pub fn register(&mut self, alg: Arc<dyn CombiningAlg>) -> PolicyResult<()> {
        let id = alg.id().to_string();
        if self.algorithms.contains_key(&id) {
            return Err(PolicyError::InvalidArgument(format!(
                "combining algorithm {} is already registered",
                id
            )));
        }
        self.algorithms.insert(id, alg);
        Ok(())
    }

    pub fn legacy_enabled(&self) -> bool {
        self.enable_legacy
    }

    pub fn get(&self, id: &str) -> PolicyResult<Arc<dyn CombiningAlg>> {
        let alg = self
            .algorithms
            .get(id)
            .ok_or_else(|| PolicyError::UnknownCombiningAlgorithm(id.to_string()))?;
        if alg.is_legacy() && !self.enable_legacy {
            return Err(PolicyError::LegacyAlgorithmDisabled(id.to_string()));
        }
        Ok(Arc::clone(alg))
    }

    pub fn new_evaluator(
        &self,
        id: &str,
        elements: Vec<CombinedElement>,
    ) -> PolicyResult<Arc<dyn CombiningEvaluator>> {
        self.get(id)?.new_evaluator(elements)
    }

    /// Ids usable with the current legacy setting.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .algorithms
            .values()
            .filter(|alg| self.enable_legacy || !alg.is_legacy())
            .map(|alg| alg.id())
            .collect();
        ids.sort_unstable();
        ids
    }
}
