//! Obligations and advice forwarded to the policy enforcement point.

use serde::{Deserialize, Serialize};

use crate::decision::EffectType;
use crate::value::AttributeValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PepActionKind {
    /// Must be fulfilled by the PEP or the decision is not enforced.
    Obligation,
    Advice,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeAssignment {
    pub attribute_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub value: AttributeValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PepAction {
    pub id: String,
    pub kind: PepActionKind,
    pub applies_to: EffectType,
    #[serde(default)]
    pub assignments: Vec<AttributeAssignment>,
}

impl PepAction {
    pub fn obligation(id: impl Into<String>, applies_to: EffectType) -> Self {
        Self::new(id, PepActionKind::Obligation, applies_to)
    }

    pub fn advice(id: impl Into<String>, applies_to: EffectType) -> Self {
        Self::new(id, PepActionKind::Advice, applies_to)
    }

    fn new(id: impl Into<String>, kind: PepActionKind, applies_to: EffectType) -> Self {
        Self {
            id: id.into(),
            kind,
            applies_to,
            assignments: Vec::new(),
        }
    }

    pub fn with_assignment(mut self, attribute_id: impl Into<String>, value: AttributeValue) -> Self {
        self.assignments.push(AttributeAssignment {
            attribute_id: attribute_id.into(),
            category: None,
            value,
        });
        self
    }
}

// ---------------------------------------------------------------------------
// PepActions: immutable snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PepActions {
    #[serde(default)]
    obligations: Vec<PepAction>,
    #[serde(default)]
    advice: Vec<PepAction>,
}

impl PepActions {
    pub fn obligations(&self) -> &[PepAction] {
        &self.obligations
    }

    pub fn advice(&self) -> &[PepAction] {
        &self.advice
    }

    pub fn is_empty(&self) -> bool {
        self.obligations.is_empty() && self.advice.is_empty()
    }

    pub fn len(&self) -> usize {
        self.obligations.len() + self.advice.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PepAction> {
        self.obligations.iter().chain(self.advice.iter())
    }
}

// ---------------------------------------------------------------------------
// PepActionsBuilder: accumulator owned by one evaluation call
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct PepActionsBuilder {
    obligations: Vec<PepAction>,
    advice: Vec<PepAction>,
}

impl PepActionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, action: PepAction) {
        match action.kind {
            PepActionKind::Obligation => self.obligations.push(action),
            PepActionKind::Advice => self.advice.push(action),
        }
    }

    /// Append the actions of `actions` that apply to `effect`, in order.
    pub fn extend_for(&mut self, effect: EffectType, actions: &PepActions) {
        for action in actions.iter().filter(|a| a.applies_to == effect) {
            self.add(action.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.obligations.is_empty() && self.advice.is_empty()
    }

    pub fn build(self) -> PepActions {
        PepActions {
            obligations: self.obligations,
            advice: self.advice,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::StringValue;

    #[test]
    fn test_builder_separates_kinds() {
        let mut b = PepActionsBuilder::new();
        assert!(b.is_empty());
        b.add(PepAction::obligation("audit", EffectType::Deny));
        b.add(PepAction::advice("notify", EffectType::Deny));
        let actions = b.build();
        assert_eq!(actions.obligations().len(), 1);
        assert_eq!(actions.advice().len(), 1);
        assert_eq!(actions.len(), 2);
    }

    #[test]
    fn test_extend_for_filters_by_effect() {
        let mut child = PepActionsBuilder::new();
        child.add(PepAction::obligation("on-permit", EffectType::Permit));
        child.add(PepAction::obligation("on-deny", EffectType::Deny));
        let child = child.build();

        let mut parent = PepActionsBuilder::new();
        parent.extend_for(EffectType::Deny, &child);
        let actions = parent.build();
        assert_eq!(actions.len(), 1);
        assert_eq!(actions.obligations()[0].id, "on-deny");
    }

    #[test]
    fn test_assignment() {
        let action = PepAction::advice("greet", EffectType::Permit)
            .with_assignment("msg", AttributeValue::String(StringValue::new("hi")));
        assert_eq!(action.assignments.len(), 1);
        assert_eq!(action.assignments[0].attribute_id, "msg");
    }
}
