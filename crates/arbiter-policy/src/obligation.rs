//! Obligation and advice expressions attached to rules and policies.

use arbiter_core::{
    AttributeAssignment, BooleanValue, Datatype, EffectType, EvalResult, IndeterminateError,
    PepAction, PepActionKind, PepActions, PepActionsBuilder,
};

use crate::context::EvaluationContext;
use crate::error::{PolicyError, PolicyResult};
use crate::expression::{Expression, ExpressionRef};

#[derive(Debug, Clone)]
pub struct AssignmentExpression {
    pub attribute_id: String,
    pub category: Option<String>,
    pub expression: ExpressionRef,
}

/// Template of a PEP action; assignments are evaluated per request.
#[derive(Debug, Clone)]
pub struct PepActionExpression {
    id: String,
    kind: PepActionKind,
    applies_to: EffectType,
    assignments: Vec<AssignmentExpression>,
}

impl PepActionExpression {
    pub fn obligation(id: impl Into<String>, applies_to: EffectType) -> Self {
        Self {
            id: id.into(),
            kind: PepActionKind::Obligation,
            applies_to,
            assignments: Vec::new(),
        }
    }

    pub fn advice(id: impl Into<String>, applies_to: EffectType) -> Self {
        Self {
            kind: PepActionKind::Advice,
            ..Self::obligation(id, applies_to)
        }
    }

    pub fn with_assignment(
        mut self,
        attribute_id: impl Into<String>,
        expression: ExpressionRef,
    ) -> Self {
        self.assignments.push(AssignmentExpression {
            attribute_id: attribute_id.into(),
            category: None,
            expression,
        });
        self
    }

    pub fn applies_to(&self) -> EffectType {
        self.applies_to
    }

    pub fn evaluate(&self, ctx: &EvaluationContext<'_>) -> EvalResult<PepAction> {
        let mut assignments = Vec::with_capacity(self.assignments.len());
        for assignment in &self.assignments {
            assignments.push(AttributeAssignment {
                attribute_id: assignment.attribute_id.clone(),
                category: assignment.category.clone(),
                value: assignment.expression.evaluate(ctx)?,
            });
        }
        Ok(PepAction {
            id: self.id.clone(),
            kind: self.kind,
            applies_to: self.applies_to,
            assignments,
        })
    }
}

/// Evaluate the actions applying to `effect`, in declaration order.
pub fn evaluate_pep_actions(
    templates: &[PepActionExpression],
    effect: EffectType,
    ctx: &EvaluationContext<'_>,
) -> EvalResult<PepActions> {
    let mut builder = PepActionsBuilder::new();
    for template in templates.iter().filter(|t| t.applies_to == effect) {
        builder.add(template.evaluate(ctx)?);
    }
    Ok(builder.build())
}

/// Reject non-boolean target and condition expressions at construction.
pub(crate) fn require_boolean(what: &str, expression: &ExpressionRef) -> PolicyResult<()> {
    let actual = expression.return_type();
    if actual != arbiter_core::DatatypeId::Boolean {
        return Err(PolicyError::TypeMismatch(format!(
            "{} must be boolean, got {}",
            what, actual
        )));
    }
    Ok(())
}

/// Evaluate a boolean expression (target or condition).
pub(crate) fn evaluate_boolean(
    expression: &ExpressionRef,
    ctx: &EvaluationContext<'_>,
) -> EvalResult<bool> {
    let value = expression.evaluate(ctx)?;
    Datatype::<BooleanValue>::new()
        .cast(&value)
        .map(|b| b.value())
        .map_err(|e| IndeterminateError::processing(e.to_string()))
}
