use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::IndeterminateError;
use crate::pep::PepActions;

// ---------------------------------------------------------------------------
// DecisionType / EffectType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecisionType {
    Permit,
    Deny,
    NotApplicable,
    Indeterminate,
}

impl fmt::Display for DecisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionType::Permit => write!(f, "Permit"),
            DecisionType::Deny => write!(f, "Deny"),
            DecisionType::NotApplicable => write!(f, "NotApplicable"),
            DecisionType::Indeterminate => write!(f, "Indeterminate"),
        }
    }
}

/// Effect of a rule, and the effect an obligation or advice applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EffectType {
    Permit,
    Deny,
}

impl EffectType {
    pub fn as_decision(self) -> DecisionType {
        match self {
            EffectType::Permit => DecisionType::Permit,
            EffectType::Deny => DecisionType::Deny,
        }
    }
}

impl fmt::Display for EffectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_decision())
    }
}

// ---------------------------------------------------------------------------
// ExtendedIndeterminate: which effect an Indeterminate could have produced
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExtendedIndeterminate {
    Permit,
    Deny,
    PermitOrDeny,
    /// The potential effect is unknown (target or decision evaluation failed
    /// before any effect was reached).
    None,
}

impl From<EffectType> for ExtendedIndeterminate {
    fn from(effect: EffectType) -> Self {
        match effect {
            EffectType::Permit => ExtendedIndeterminate::Permit,
            EffectType::Deny => ExtendedIndeterminate::Deny,
        }
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusCode {
    Ok,
    MissingAttribute,
    SyntaxError,
    ProcessingError,
}

impl StatusCode {
    pub fn urn(self) -> &'static str {
        match self {
            StatusCode::Ok => "urn:oasis:names:tc:xacml:1.0:status:ok",
            StatusCode::MissingAttribute => "urn:oasis:names:tc:xacml:1.0:status:missing-attribute",
            StatusCode::SyntaxError => "urn:oasis:names:tc:xacml:1.0:status:syntax-error",
            StatusCode::ProcessingError => "urn:oasis:names:tc:xacml:1.0:status:processing-error",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.urn())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Status {
    pub code: StatusCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Status {
    pub fn ok() -> Self {
        Self {
            code: StatusCode::Ok,
            message: None,
        }
    }

    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }

    pub fn processing_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::ProcessingError, message)
    }
}

impl From<IndeterminateError> for Status {
    fn from(e: IndeterminateError) -> Self {
        Status::new(e.code, e.message)
    }
}

// ---------------------------------------------------------------------------
// ExtendedDecision: result of evaluating one decidable
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtendedDecision {
    Permit,
    Deny,
    NotApplicable,
    Indeterminate {
        extended: ExtendedIndeterminate,
        status: Status,
    },
}

impl ExtendedDecision {
    pub fn indeterminate(extended: ExtendedIndeterminate, status: Status) -> Self {
        ExtendedDecision::Indeterminate { extended, status }
    }

    pub fn decision_type(&self) -> DecisionType {
        match self {
            ExtendedDecision::Permit => DecisionType::Permit,
            ExtendedDecision::Deny => DecisionType::Deny,
            ExtendedDecision::NotApplicable => DecisionType::NotApplicable,
            ExtendedDecision::Indeterminate { .. } => DecisionType::Indeterminate,
        }
    }

    /// The effect of a Permit or Deny decision.
    pub fn effect(&self) -> Option<EffectType> {
        match self {
            ExtendedDecision::Permit => Some(EffectType::Permit),
            ExtendedDecision::Deny => Some(EffectType::Deny),
            _ => None,
        }
    }

    pub fn extended_indeterminate(&self) -> Option<ExtendedIndeterminate> {
        match self {
            ExtendedDecision::Indeterminate { extended, .. } => Some(*extended),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<&Status> {
        match self {
            ExtendedDecision::Indeterminate { status, .. } => Some(status),
            _ => None,
        }
    }

    pub fn is_not_applicable(&self) -> bool {
        matches!(self, ExtendedDecision::NotApplicable)
    }
}

impl From<EffectType> for ExtendedDecision {
    fn from(effect: EffectType) -> Self {
        match effect {
            EffectType::Permit => ExtendedDecision::Permit,
            EffectType::Deny => ExtendedDecision::Deny,
        }
    }
}

impl fmt::Display for ExtendedDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtendedDecision::Indeterminate { extended, .. } => {
                let suffix = match extended {
                    ExtendedIndeterminate::Permit => "{P}",
                    ExtendedIndeterminate::Deny => "{D}",
                    ExtendedIndeterminate::PermitOrDeny => "{DP}",
                    ExtendedIndeterminate::None => "",
                };
                write!(f, "Indeterminate{}", suffix)
            }
            other => write!(f, "{}", other.decision_type()),
        }
    }
}

// ---------------------------------------------------------------------------
// PolicyRef: identifies an applicable policy or policy set
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyKind {
    Policy,
    PolicySet,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyRef {
    pub kind: PolicyKind,
    pub id: String,
    pub version: String,
}

impl PolicyRef {
    pub fn policy(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            kind: PolicyKind::Policy,
            id: id.into(),
            version: version.into(),
        }
    }

    pub fn policy_set(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            kind: PolicyKind::PolicySet,
            id: id.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for PolicyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            PolicyKind::Policy => "Policy",
            PolicyKind::PolicySet => "PolicySet",
        };
        write!(f, "{}[{} v{}]", kind, self.id, self.version)
    }
}

// ---------------------------------------------------------------------------
// DecisionResult: final result of one individual decision request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub decision: DecisionType,
    pub status: Status,
    #[serde(default)]
    pub pep_actions: PepActions,
    #[serde(default)]
    pub applicable_policies: Vec<PolicyRef>,
}

impl DecisionResult {
    /// Build the result of an evaluation. PEP actions are only kept for
    /// Permit and Deny.
    pub fn new(
        decision: ExtendedDecision,
        pep_actions: PepActions,
        applicable_policies: Vec<PolicyRef>,
    ) -> Self {
        match decision {
            ExtendedDecision::Permit | ExtendedDecision::Deny => Self {
                decision: decision.decision_type(),
                status: Status::ok(),
                pep_actions,
                applicable_policies,
            },
            ExtendedDecision::NotApplicable => Self {
                decision: DecisionType::NotApplicable,
                status: Status::ok(),
                pep_actions: PepActions::default(),
                applicable_policies,
            },
            ExtendedDecision::Indeterminate { status, .. } => Self {
                decision: DecisionType::Indeterminate,
                status,
                pep_actions: PepActions::default(),
                applicable_policies,
            },
        }
    }

    pub fn indeterminate(status: Status) -> Self {
        Self {
            decision: DecisionType::Indeterminate,
            status,
            pep_actions: PepActions::default(),
            applicable_policies: Vec::new(),
        }
    }

    pub fn not_applicable() -> Self {
        Self::new(ExtendedDecision::NotApplicable, PepActions::default(), Vec::new())
    }
}
