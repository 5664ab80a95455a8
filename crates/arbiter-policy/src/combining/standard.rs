//! XACML 3.0 combining algorithms (Appendix C).

use std::marker::PhantomData;
use std::sync::Arc;

use arbiter_core::{EffectType, ExtendedDecision, ExtendedIndeterminate, Status};

use super::{first_status, CombiningAlg, DecidableKind, DecisionFold, FoldingAlg, Step};

const RULE_3_0: &str = "urn:oasis:names:tc:xacml:3.0:rule-combining-algorithm:";
const POLICY_3_0: &str = "urn:oasis:names:tc:xacml:3.0:policy-combining-algorithm:";
const RULE_1_0: &str = "urn:oasis:names:tc:xacml:1.0:rule-combining-algorithm:";
const POLICY_1_0: &str = "urn:oasis:names:tc:xacml:1.0:policy-combining-algorithm:";

// ---------------------------------------------------------------------------
// deny-overrides / permit-overrides
// ---------------------------------------------------------------------------

/// Effect that wins an overrides algorithm.
pub trait Overriding: Default {
    const EFFECT: EffectType;
}

#[derive(Debug, Default)]
pub struct DenyWins;

impl Overriding for DenyWins {
    const EFFECT: EffectType = EffectType::Deny;
}

#[derive(Debug, Default)]
pub struct PermitWins;

impl Overriding for PermitWins {
    const EFFECT: EffectType = EffectType::Permit;
}

pub(crate) fn opposite(effect: EffectType) -> EffectType {
    match effect {
        EffectType::Permit => EffectType::Deny,
        EffectType::Deny => EffectType::Permit,
    }
}

/// Overrides fold. An Indeterminate whose potential effect is unknown
/// counts as Indeterminate{PermitOrDeny}.
#[derive(Debug, Default)]
pub struct OverridesFold<E> {
    won: bool,
    other: bool,
    error_winning: bool,
    error_other: bool,
    error_both: bool,
    status: Option<Status>,
    _effect: PhantomData<E>,
}

impl<E: Overriding> DecisionFold for OverridesFold<E> {
    fn step(&mut self, decision: &ExtendedDecision) -> Step {
        let winning = E::EFFECT;
        match decision {
            ExtendedDecision::NotApplicable => {}
            ExtendedDecision::Indeterminate { extended, status } => {
                self.status.get_or_insert_with(|| status.clone());
                match extended {
                    ExtendedIndeterminate::PermitOrDeny | ExtendedIndeterminate::None => {
                        self.error_both = true
                    }
                    x if *x == ExtendedIndeterminate::from(winning) => self.error_winning = true,
                    _ => self.error_other = true,
                }
            }
            d if d.effect() == Some(winning) => {
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
        let indeterminate = |extended: ExtendedIndeterminate, status: Option<Status>| {
            ExtendedDecision::indeterminate(extended, first_status(status, "indeterminate child"))
        };

        if self.won {
            return winning.into();
        }
        if self.error_both || (self.error_winning && (self.error_other || self.other)) {
            return indeterminate(ExtendedIndeterminate::PermitOrDeny, self.status);
        }
        if self.error_winning {
            return indeterminate(winning.into(), self.status);
        }
        if self.other {
            return other.into();
        }
        if self.error_other {
            return indeterminate(other.into(), self.status);
        }
        ExtendedDecision::NotApplicable
    }
}

// ---------------------------------------------------------------------------
// first-applicable
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct FirstApplicableFold {
    decision: Option<ExtendedDecision>,
}

impl DecisionFold for FirstApplicableFold {
    fn step(&mut self, decision: &ExtendedDecision) -> Step {
        if decision.is_not_applicable() {
            return Step::Continue;
        }
        self.decision = Some(decision.clone());
        Step::Stop
    }

    fn finish(self) -> ExtendedDecision {
        self.decision.unwrap_or(ExtendedDecision::NotApplicable)
    }
}

// ---------------------------------------------------------------------------
// only-one-applicable
// ---------------------------------------------------------------------------

/// More than one child that is not NotApplicable, or any Indeterminate
/// child, makes the result Indeterminate.
#[derive(Debug, Default)]
pub struct OnlyOneApplicableFold {
    decision: Option<ExtendedDecision>,
}

impl DecisionFold for OnlyOneApplicableFold {
    fn step(&mut self, decision: &ExtendedDecision) -> Step {
        match decision {
            ExtendedDecision::NotApplicable => Step::Continue,
            ExtendedDecision::Indeterminate { .. } => {
                self.decision = Some(decision.clone());
                Step::Stop
            }
            _ if self.decision.is_some() => {
                self.decision = Some(ExtendedDecision::indeterminate(
                    ExtendedIndeterminate::PermitOrDeny,
                    Status::processing_error("Too many applicable policies"),
                ));
                Step::Stop
            }
            _ => {
                self.decision = Some(decision.clone());
                Step::Continue
            }
        }
    }

    fn finish(self) -> ExtendedDecision {
        self.decision.unwrap_or(ExtendedDecision::NotApplicable)
    }
}

// ---------------------------------------------------------------------------
// deny-unless-permit / permit-unless-deny
// ---------------------------------------------------------------------------

/// Returns `E::EFFECT` at the first child with that effect, the opposite
/// effect otherwise. Never NotApplicable or Indeterminate.
#[derive(Debug, Default)]
pub struct UnlessFold<E> {
    found: bool,
    _effect: PhantomData<E>,
}

impl<E: Overriding> DecisionFold for UnlessFold<E> {
    fn step(&mut self, decision: &ExtendedDecision) -> Step {
        if decision.effect() == Some(E::EFFECT) {
            self.found = true;
            return Step::Stop;
        }
        Step::Continue
    }

    fn finish(self) -> ExtendedDecision {
        if self.found {
            E::EFFECT.into()
        } else {
            opposite(E::EFFECT).into()
        }
    }
}

pub type DenyOverrides = OverridesFold<DenyWins>;
pub type PermitOverrides = OverridesFold<PermitWins>;
/// deny-unless-permit: Permit if any child permits.
pub type DenyUnlessPermit = UnlessFold<PermitWins>;
/// permit-unless-deny: Deny if any child denies.
pub type PermitUnlessDeny = UnlessFold<DenyWins>;

fn both_kinds<F: DecisionFold + 'static>(name: &str, algs: &mut Vec<Arc<dyn CombiningAlg>>) {
    algs.push(Arc::new(FoldingAlg::<F>::new(
        format!("{}{}", RULE_3_0, name),
        DecidableKind::Rule,
    )));
    algs.push(Arc::new(FoldingAlg::<F>::new(
        format!("{}{}", POLICY_3_0, name),
        DecidableKind::Policy,
    )));
}

pub fn algorithms() -> Vec<Arc<dyn CombiningAlg>> {
    let mut algs: Vec<Arc<dyn CombiningAlg>> = Vec::new();
    both_kinds::<DenyOverrides>("deny-overrides", &mut algs);
    both_kinds::<DenyOverrides>("ordered-deny-overrides", &mut algs);
    both_kinds::<PermitOverrides>("permit-overrides", &mut algs);
    both_kinds::<PermitOverrides>("ordered-permit-overrides", &mut algs);
    both_kinds::<DenyUnlessPermit>("deny-unless-permit", &mut algs);
    both_kinds::<PermitUnlessDeny>("permit-unless-deny", &mut algs);
    algs.push(Arc::new(FoldingAlg::<FirstApplicableFold>::new(
        format!("{}first-applicable", RULE_1_0),
        DecidableKind::Rule,
    )));
    algs.push(Arc::new(FoldingAlg::<FirstApplicableFold>::new(
        format!("{}first-applicable", POLICY_1_0),
        DecidableKind::Policy,
    )));
    algs.push(Arc::new(FoldingAlg::<OnlyOneApplicableFold>::new(
        format!("{}only-one-applicable", POLICY_1_0),
        DecidableKind::Policy,
    )));
    algs
}

/// Run a fold over a fixed sequence, honouring early stop.
#[cfg(test)]
pub(crate) fn fold_all<F: DecisionFold>(decisions: &[ExtendedDecision]) -> ExtendedDecision {
    let mut fold = F::default();
    for d in decisions {
        if fold.step(d) == Step::Stop {
            break;
        }
    }
    fold.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combining::test_support::indeterminate;

    use arbiter_core::ExtendedDecision::{Deny, NotApplicable, Permit};
    use arbiter_core::ExtendedIndeterminate as X;

    fn ind(x: X) -> ExtendedDecision {
        indeterminate(x)
    }

    fn ext(d: &ExtendedDecision) -> Option<X> {
        d.extended_indeterminate()
    }

    #[test]
    fn test_deny_overrides() {
        assert_eq!(fold_all::<DenyOverrides>(&[Permit, Deny]), Deny);
        assert_eq!(fold_all::<DenyOverrides>(&[Permit, NotApplicable]), Permit);
        assert_eq!(fold_all::<DenyOverrides>(&[NotApplicable]), NotApplicable);
        assert_eq!(fold_all::<DenyOverrides>(&[]), NotApplicable);
        assert_eq!(
            ext(&fold_all::<DenyOverrides>(&[ind(X::Deny), Permit])),
            Some(X::PermitOrDeny)
        );
        assert_eq!(ext(&fold_all::<DenyOverrides>(&[ind(X::Deny)])), Some(X::Deny));
        assert_eq!(fold_all::<DenyOverrides>(&[ind(X::Permit), Deny]), Deny);
        assert_eq!(
            ext(&fold_all::<DenyOverrides>(&[ind(X::Permit), NotApplicable])),
            Some(X::Permit)
        );
        assert_eq!(fold_all::<DenyOverrides>(&[ind(X::Permit), Permit]), Permit);
        assert_eq!(
            ext(&fold_all::<DenyOverrides>(&[ind(X::None)])),
            Some(X::PermitOrDeny)
        );
    }

    #[test]
    fn test_permit_overrides() {
        assert_eq!(fold_all::<PermitOverrides>(&[Deny, Permit]), Permit);
        assert_eq!(fold_all::<PermitOverrides>(&[Deny, NotApplicable]), Deny);
        assert_eq!(
            ext(&fold_all::<PermitOverrides>(&[ind(X::Permit), Deny])),
            Some(X::PermitOrDeny)
        );
        assert_eq!(fold_all::<PermitOverrides>(&[ind(X::Deny), Permit]), Permit);
        assert_eq!(
            ext(&fold_all::<PermitOverrides>(&[ind(X::Deny)])),
            Some(X::Deny)
        );
    }

    #[test]
    fn test_indeterminate_keeps_first_status() {
        let first = ExtendedDecision::indeterminate(X::Deny, Status::processing_error("first"));
        let second = ExtendedDecision::indeterminate(X::Deny, Status::processing_error("second"));
        let result = fold_all::<DenyOverrides>(&[first, second]);
        assert_eq!(result.status().unwrap().message.as_deref(), Some("first"));
    }

    #[test]
    fn test_first_applicable() {
        assert_eq!(
            fold_all::<FirstApplicableFold>(&[NotApplicable, Deny, Permit]),
            Deny
        );
        assert_eq!(
            ext(&fold_all::<FirstApplicableFold>(&[ind(X::Permit), Deny])),
            Some(X::Permit)
        );
        assert_eq!(fold_all::<FirstApplicableFold>(&[NotApplicable]), NotApplicable);
    }

    #[test]
    fn test_only_one_applicable() {
        assert_eq!(
            fold_all::<OnlyOneApplicableFold>(&[NotApplicable, Permit]),
            Permit
        );
        let too_many = fold_all::<OnlyOneApplicableFold>(&[Permit, Deny]);
        assert_eq!(ext(&too_many), Some(X::PermitOrDeny));
        assert_eq!(
            ext(&fold_all::<OnlyOneApplicableFold>(&[Permit, ind(X::Deny)])),
            Some(X::Deny)
        );
        assert_eq!(fold_all::<OnlyOneApplicableFold>(&[]), NotApplicable);
    }

    #[test]
    fn test_unless_algorithms() {
        assert_eq!(fold_all::<DenyUnlessPermit>(&[NotApplicable]), Deny);
        assert_eq!(fold_all::<DenyUnlessPermit>(&[ind(X::Permit), Permit]), Permit);
        assert_eq!(fold_all::<PermitUnlessDeny>(&[ind(X::Deny)]), Permit);
        assert_eq!(fold_all::<PermitUnlessDeny>(&[Permit, Deny]), Deny);
    }

    #[test]
    fn test_algorithm_ids() {
        let ids: Vec<String> = algorithms().iter().map(|a| a.id().to_string()).collect();
        assert_eq!(ids.len(), 15);
        assert!(ids.contains(
            &"urn:oasis:names:tc:xacml:1.0:policy-combining-algorithm:only-one-applicable"
                .to_string()
        ));
        assert!(algorithms().iter().all(|a| !a.is_legacy()));
    }
}
