use std::sync::Arc;

use arbiter_core::{
    ExtendedDecision, ExtendedIndeterminate, PepActionsBuilder, PolicyKind, PolicyRef, Status,
};
use tracing::debug;

use crate::combining::{
    CombinedElement, CombiningAlgRegistry, CombiningEvaluator, Decidable, DecidableKind,
    DecisionOutcome,
};
use crate::context::EvaluationContext;
use crate::error::{PolicyError, PolicyResult};
use crate::expression::ExpressionRef;
use crate::obligation::{evaluate_boolean, evaluate_pep_actions, require_boolean, PepActionExpression};

/// A policy (combining rules) or policy set (combining policies).
#[derive(Debug)]
pub struct Policy {
    reference: PolicyRef,
    target: Option<ExpressionRef>,
    algorithm: String,
    combiner: Arc<dyn CombiningEvaluator>,
    pep_actions: Vec<PepActionExpression>,
}

impl Policy {
    /// Build a policy over `children` using combining algorithm
    /// `algorithm`. A `Policy` reference must combine rules, a `PolicySet`
    /// reference must combine policies.
    pub fn new(
        reference: PolicyRef,
        algorithms: &CombiningAlgRegistry,
        algorithm: &str,
        children: Vec<CombinedElement>,
    ) -> PolicyResult<Self> {
        let alg = algorithms.get(algorithm)?;
        let expected = match reference.kind {
            PolicyKind::Policy => DecidableKind::Rule,
            PolicyKind::PolicySet => DecidableKind::Policy,
        };
        if alg.combined_kind() != expected {
            return Err(PolicyError::InvalidPolicy(format!(
                "{} cannot use {}: it combines {} elements",
                reference,
                algorithm,
                alg.combined_kind()
            )));
        }
        let combiner = alg.new_evaluator(children)?;
        Ok(Self {
            reference,
            target: None,
            algorithm: algorithm.to_string(),
            combiner,
            pep_actions: Vec::new(),
        })
    }

    pub fn with_target(mut self, target: ExpressionRef) -> PolicyResult<Self> {
        require_boolean("policy target", &target)?;
        self.target = Some(target);
        Ok(self)
    }

    pub fn with_pep_action(mut self, action: PepActionExpression) -> Self {
        self.pep_actions.push(action);
        self
    }

    pub fn reference(&self) -> &PolicyRef {
        &self.reference
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }
}

impl Decidable for Policy {
    fn id(&self) -> &str {
        &self.reference.id
    }

    fn kind(&self) -> DecidableKind {
        DecidableKind::Policy
    }

    fn evaluate(
        &self,
        ctx: &EvaluationContext<'_>,
        applicable: Option<&mut Vec<PolicyRef>>,
    ) -> DecisionOutcome {
        let target = match &self.target {
            Some(target) => evaluate_boolean(target, ctx),
            None => Ok(true),
        };
        if let Ok(false) = target {
            return DecisionOutcome::not_applicable();
        }

        let mut descendants = Vec::new();
        let sink = if applicable.is_some() {
            Some(&mut descendants)
        } else {
            None
        };
        let mut child_actions = PepActionsBuilder::new();
        let combined = self.combiner.evaluate(ctx, &mut child_actions, sink);

        // An Indeterminate target turns any applicable result Indeterminate,
        // keeping its potential effect.
        let decision = match target {
            Err(e) => {
                debug!(policy = %self.reference, error = %e, "policy target indeterminate");
                let status = Status::from(e);
                match combined {
                    ExtendedDecision::NotApplicable => ExtendedDecision::NotApplicable,
                    ExtendedDecision::Permit => {
                        ExtendedDecision::indeterminate(ExtendedIndeterminate::Permit, status)
                    }
                    ExtendedDecision::Deny => {
                        ExtendedDecision::indeterminate(ExtendedIndeterminate::Deny, status)
                    }
                    ExtendedDecision::Indeterminate { extended, .. } => {
                        ExtendedDecision::indeterminate(extended, status)
                    }
                }
            }
            Ok(_) => combined,
        };

        let outcome = match decision.effect() {
            Some(effect) => match evaluate_pep_actions(&self.pep_actions, effect, ctx) {
                Ok(own) => {
                    child_actions.extend_for(effect, &own);
                    DecisionOutcome {
                        decision,
                        pep_actions: child_actions.build(),
                    }
                }
                Err(e) => {
                    debug!(policy = %self.reference, error = %e, "policy PEP action assignment failed");
                    DecisionOutcome::indeterminate(effect.into(), Status::from(e))
                }
            },
            None => DecisionOutcome::new(decision),
        };

        if let Some(out) = applicable {
            if !outcome.decision.is_not_applicable() {
                out.push(self.reference.clone());
                out.extend(descendants);
            }
        }
        outcome
    }
}
