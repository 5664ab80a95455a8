use arbiter_core::{EffectType, ExtendedDecision, PolicyRef, Status};
use tracing::debug;

use crate::combining::{Decidable, DecidableKind, DecisionOutcome};
use crate::context::EvaluationContext;
use crate::error::PolicyResult;
use crate::expression::ExpressionRef;
use crate::obligation::{evaluate_boolean, evaluate_pep_actions, require_boolean, PepActionExpression};

/// A rule: effect, optional target and condition, and PEP actions.
///
/// Target or condition false gives NotApplicable. Any Indeterminate while
/// evaluating target, condition or PEP action assignments gives
/// Indeterminate with the rule's effect as potential effect.
#[derive(Debug)]
pub struct Rule {
    id: String,
    effect: EffectType,
    target: Option<ExpressionRef>,
    condition: Option<ExpressionRef>,
    pep_actions: Vec<PepActionExpression>,
}

impl Rule {
    pub fn new(id: impl Into<String>, effect: EffectType) -> Self {
        Self {
            id: id.into(),
            effect,
            target: None,
            condition: None,
            pep_actions: Vec::new(),
        }
    }

    pub fn with_target(mut self, target: ExpressionRef) -> PolicyResult<Self> {
        require_boolean("rule target", &target)?;
        self.target = Some(target);
        Ok(self)
    }

    pub fn with_condition(mut self, condition: ExpressionRef) -> PolicyResult<Self> {
        require_boolean("rule condition", &condition)?;
        self.condition = Some(condition);
        Ok(self)
    }

    pub fn with_pep_action(mut self, action: PepActionExpression) -> Self {
        self.pep_actions.push(action);
        self
    }

    pub fn effect(&self) -> EffectType {
        self.effect
    }
}

impl Decidable for Rule {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> DecidableKind {
        DecidableKind::Rule
    }

    fn evaluate(
        &self,
        ctx: &EvaluationContext<'_>,
        _applicable: Option<&mut Vec<PolicyRef>>,
    ) -> DecisionOutcome {
        for check in [&self.target, &self.condition].into_iter().flatten() {
            match evaluate_boolean(check, ctx) {
                Ok(true) => {}
                Ok(false) => return DecisionOutcome::not_applicable(),
                Err(e) => {
                    debug!(rule = %self.id, error = %e, "rule indeterminate");
                    return DecisionOutcome::indeterminate(self.effect.into(), Status::from(e));
                }
            }
        }

        match evaluate_pep_actions(&self.pep_actions, self.effect, ctx) {
            Ok(pep_actions) => DecisionOutcome {
                decision: ExtendedDecision::from(self.effect),
                pep_actions,
            },
            Err(e) => {
                debug!(rule = %self.id, error = %e, "rule PEP action assignment failed");
                DecisionOutcome::indeterminate(self.effect.into(), Status::from(e))
            }
        }
    }
}
