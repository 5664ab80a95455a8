//! XACML 1.0/1.1 combining algorithms, superseded in 3.0 and registered as
//! legacy (disabled unless `enable_legacy_combining_algorithms` is set).

use std::marker::PhantomData;
use std::sync::Arc;

use arbiter_core::{ExtendedDecision, ExtendedIndeterminate, Status};

use super::standard::{opposite, DenyWins, Overriding, PermitWins};
use super::{first_status, CombiningAlg, DecidableKind, DecisionFold, FoldingAlg, Step};

const RULE_1_0: &str = "urn:oasis:names:tc:xacml:1.0:rule-combining-algorithm:";
const POLICY_1_0: &str = "urn:oasis:names:tc:xacml:1.0:policy-combining-algorithm:";
const RULE_1_1: &str = "urn:oasis:names:tc:xacml:1.1:rule-combining-algorithm:";
const POLICY_1_1: &str = "urn:oasis:names:tc:xacml:1.1:policy-combining-algorithm:";

fn could_be(extended: ExtendedIndeterminate, effect: ExtendedIndeterminate) -> bool {
    matches!(
        extended,
        ExtendedIndeterminate::PermitOrDeny | ExtendedIndeterminate::None
    ) || extended == effect
}

/// 1.0 rule deny-overrides / permit-overrides. An Indeterminate child that
/// could have produced the winning effect makes the result Indeterminate
/// unless a later child actually produces it.
#[derive(Debug, Default)]
pub struct LegacyRuleOverridesFold<E> {
    won: bool,
    other: bool,
    error: bool,
    potential_win: bool,
    status: Option<Status>,
    _effect: PhantomData<E>,
}

impl<E: Overriding> DecisionFold for LegacyRuleOverridesFold<E> {
    fn step(&mut self, decision: &ExtendedDecision) -> Step {
        match decision {
            ExtendedDecision::NotApplicable => {}
            ExtendedDecision::Indeterminate { extended, status } => {
                self.status.get_or_insert_with(|| status.clone());
                self.error = true;
                if could_be(*extended, E::EFFECT.into()) {
                    self.potential_win = true;
                }
            }
            d if d.effect() == Some(E::EFFECT) => {
                self.won = true;
                return Step::Stop;
            }
            _ => self.other = true,
        }
        Step::Continue
    }

    fn finish(self) -> ExtendedDecision {
        let winning = E::EFFECT;
        let other = opposite(winning);
        if self.won {
            return winning.into();
        }
        if self.potential_win {
            return ExtendedDecision::indeterminate(
                winning.into(),
                first_status(self.status, "indeterminate rule"),
            );
        }
        if self.other {
            return other.into();
        }
        if self.error {
            return ExtendedDecision::indeterminate(
                other.into(),
                first_status(self.status, "indeterminate rule"),
            );
        }
        ExtendedDecision::NotApplicable
    }
}

/// 1.0 policy deny-overrides. An Indeterminate child is treated as Deny.
#[derive(Debug, Default)]
pub struct LegacyPolicyDenyOverridesFold {
    deny: bool,
    permit: bool,
}

impl DecisionFold for LegacyPolicyDenyOverridesFold {
    fn step(&mut self, decision: &ExtendedDecision) -> Step {
        match decision {
            ExtendedDecision::Deny | ExtendedDecision::Indeterminate { .. } => {
                self.deny = true;
                Step::Stop
            }
            ExtendedDecision::Permit => {
                self.permit = true;
                Step::Continue
            }
            ExtendedDecision::NotApplicable => Step::Continue,
        }
    }

    fn finish(self) -> ExtendedDecision {
        if self.deny {
            ExtendedDecision::Deny
        } else if self.permit {
            ExtendedDecision::Permit
        } else {
            ExtendedDecision::NotApplicable
        }
    }
}

/// 1.0 policy permit-overrides.
#[derive(Debug, Default)]
pub struct LegacyPolicyPermitOverridesFold {
    permit: bool,
    deny: bool,
    status: Option<Status>,
}

impl DecisionFold for LegacyPolicyPermitOverridesFold {
    fn step(&mut self, decision: &ExtendedDecision) -> Step {
        match decision {
            ExtendedDecision::Permit => {
                self.permit = true;
                return Step::Stop;
            }
            ExtendedDecision::Deny => self.deny = true,
            ExtendedDecision::Indeterminate { status, .. } => {
                self.status.get_or_insert_with(|| status.clone());
            }
            ExtendedDecision::NotApplicable => {}
        }
        Step::Continue
    }

    fn finish(self) -> ExtendedDecision {
        if self.permit {
            return ExtendedDecision::Permit;
        }
        if self.deny {
            return ExtendedDecision::Deny;
        }
        match self.status {
            Some(status) => {
                ExtendedDecision::indeterminate(ExtendedIndeterminate::PermitOrDeny, status)
            }
            None => ExtendedDecision::NotApplicable,
        }
    }
}

pub fn algorithms() -> Vec<Arc<dyn CombiningAlg>> {
    let mut algs: Vec<Arc<dyn CombiningAlg>> = Vec::new();
    for prefix in [RULE_1_0, RULE_1_1] {
        let ordered = if prefix == RULE_1_1 { "ordered-" } else { "" };
        algs.push(Arc::new(FoldingAlg::<LegacyRuleOverridesFold<DenyWins>>::legacy(
            format!("{}{}deny-overrides", prefix, ordered),
            DecidableKind::Rule,
        )));
        algs.push(Arc::new(FoldingAlg::<LegacyRuleOverridesFold<PermitWins>>::legacy(
            format!("{}{}permit-overrides", prefix, ordered),
            DecidableKind::Rule,
        )));
    }
    for prefix in [POLICY_1_0, POLICY_1_1] {
        let ordered = if prefix == POLICY_1_1 { "ordered-" } else { "" };
        algs.push(Arc::new(FoldingAlg::<LegacyPolicyDenyOverridesFold>::legacy(
            format!("{}{}deny-overrides", prefix, ordered),
            DecidableKind::Policy,
        )));
        algs.push(Arc::new(FoldingAlg::<LegacyPolicyPermitOverridesFold>::legacy(
            format!("{}{}permit-overrides", prefix, ordered),
            DecidableKind::Policy,
        )));
    }
    algs
}
