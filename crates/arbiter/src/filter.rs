//! Decision result filters: post-processing of the results of one batch of
//! individual decision requests.

use std::fmt;

use arbiter_core::{DecisionResult, DecisionType, IndividualDecisionRequest, PolicyRef, Status};
use tracing::debug;

pub const DEFAULT_FILTER_ID: &str = "default";
pub const COMBINED_DECISION_FILTER_ID: &str = "combined-decision";

pub trait DecisionResultFilter: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    /// Whether the filter can merge a batch into one result (the
    /// multiple-decision profile's CombinedDecision).
    fn supports_multiple_decision_combining(&self) -> bool;

    /// New collector for a batch of `expected` results. `combine` is only
    /// honored by filters that support combining.
    fn new_collector(&self, expected: usize, combine: bool) -> Box<dyn ResultCollector>;
}

/// Per-batch accumulator.
///
/// Results are added in evaluation order. When [`add_result`] returns
/// `Some`, those are the final results and the caller stops adding;
/// otherwise [`filtered_results`] is called once after the last addition.
///
/// [`add_result`]: ResultCollector::add_result
/// [`filtered_results`]: ResultCollector::filtered_results
pub trait ResultCollector: Send {
    fn add_result(
        &mut self,
        request: &IndividualDecisionRequest,
        result: DecisionResult,
    ) -> Option<Vec<DecisionResult>>;

    fn filtered_results(self: Box<Self>) -> Vec<DecisionResult>;
}

// ---------------------------------------------------------------------------
// default: every result, in input order
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct DefaultResultFilter;

impl DecisionResultFilter for DefaultResultFilter {
    fn id(&self) -> &str {
        DEFAULT_FILTER_ID
    }

    fn supports_multiple_decision_combining(&self) -> bool {
        false
    }

    fn new_collector(&self, expected: usize, _combine: bool) -> Box<dyn ResultCollector> {
        Box::new(AllResults(Vec::with_capacity(expected)))
    }
}

struct AllResults(Vec<DecisionResult>);

impl ResultCollector for AllResults {
    fn add_result(
        &mut self,
        _request: &IndividualDecisionRequest,
        result: DecisionResult,
    ) -> Option<Vec<DecisionResult>> {
        self.0.push(result);
        None
    }

    fn filtered_results(self: Box<Self>) -> Vec<DecisionResult> {
        self.0
    }
}

// ---------------------------------------------------------------------------
// combined-decision
// ---------------------------------------------------------------------------

/// Collapses a batch into one result when every individual result has the
/// same decision and carries no obligations or advice. Otherwise the batch
/// yields a single Indeterminate as soon as that is known.
#[derive(Debug, Default)]
pub struct CombinedDecisionResultFilter;

impl DecisionResultFilter for CombinedDecisionResultFilter {
    fn id(&self) -> &str {
        COMBINED_DECISION_FILTER_ID
    }

    fn supports_multiple_decision_combining(&self) -> bool {
        true
    }

    fn new_collector(&self, expected: usize, combine: bool) -> Box<dyn ResultCollector> {
        if combine {
            Box::new(CombinedResult::default())
        } else {
            Box::new(AllResults(Vec::with_capacity(expected)))
        }
    }
}

#[derive(Default)]
struct CombinedResult {
    decision: Option<DecisionType>,
    applicable_policies: Vec<PolicyRef>,
}

impl CombinedResult {
    fn reject(reason: &str) -> Option<Vec<DecisionResult>> {
        debug!(reason, "combined decision is indeterminate");
        Some(vec![DecisionResult::indeterminate(Status::processing_error(
            format!("Cannot combine decisions: {}", reason),
        ))])
    }
}

impl ResultCollector for CombinedResult {
    fn add_result(
        &mut self,
        _request: &IndividualDecisionRequest,
        result: DecisionResult,
    ) -> Option<Vec<DecisionResult>> {
        if result.decision == DecisionType::Indeterminate {
            return Self::reject("an individual decision is Indeterminate");
        }
        if !result.pep_actions.is_empty() {
            return Self::reject("an individual decision carries obligations or advice");
        }
        match self.decision {
            Some(first) if first != result.decision => {
                return Self::reject("individual decisions differ");
            }
            Some(_) => {}
            None => self.decision = Some(result.decision),
        }
        for policy in result.applicable_policies {
            if !self.applicable_policies.contains(&policy) {
                self.applicable_policies.push(policy);
            }
        }
        None
    }

    fn filtered_results(self: Box<Self>) -> Vec<DecisionResult> {
        match self.decision {
            Some(decision) => vec![DecisionResult {
                decision,
                status: Status::ok(),
                pep_actions: Default::default(),
                applicable_policies: self.applicable_policies,
            }],
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_core::{EffectType, ExtendedDecision, PepAction, PepActionsBuilder, StatusCode};

    fn result(decision: ExtendedDecision, policy: &str) -> DecisionResult {
        DecisionResult::new(
            decision,
            Default::default(),
            vec![PolicyRef::policy(policy, "1.0")],
        )
    }

    fn feed(
        collector: &mut Box<dyn ResultCollector>,
        results: Vec<DecisionResult>,
    ) -> Option<Vec<DecisionResult>> {
        let request = IndividualDecisionRequest::new();
        results
            .into_iter()
            .find_map(|r| collector.add_result(&request, r))
    }

    #[test]
    fn test_default_filter_keeps_all_results_in_order() {
        let filter = DefaultResultFilter;
        assert!(!filter.supports_multiple_decision_combining());
        let inputs = vec![
            result(ExtendedDecision::Permit, "a"),
            result(ExtendedDecision::Deny, "b"),
            DecisionResult::not_applicable(),
        ];
        let mut collector = filter.new_collector(inputs.len(), false);
        assert!(feed(&mut collector, inputs.clone()).is_none());
        assert_eq!(collector.filtered_results(), inputs);
    }

    #[test]
    fn test_combined_filter_merges_equal_decisions() {
        let filter = CombinedDecisionResultFilter;
        let mut collector = filter.new_collector(3, true);
        let early = feed(
            &mut collector,
            vec![
                result(ExtendedDecision::Permit, "a"),
                result(ExtendedDecision::Permit, "b"),
                result(ExtendedDecision::Permit, "a"),
            ],
        );
        assert!(early.is_none());
        let results = collector.filtered_results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].decision, DecisionType::Permit);
        assert_eq!(
            results[0].applicable_policies,
            vec![PolicyRef::policy("a", "1.0"), PolicyRef::policy("b", "1.0")]
        );
    }

    #[test]
    fn test_combined_filter_stops_on_differing_decisions() {
        let mut collector = CombinedDecisionResultFilter.new_collector(3, true);
        let early = feed(
            &mut collector,
            vec![
                result(ExtendedDecision::Permit, "a"),
                result(ExtendedDecision::Deny, "b"),
                result(ExtendedDecision::Permit, "c"),
            ],
        )
        .unwrap();
        assert_eq!(early.len(), 1);
        assert_eq!(early[0].decision, DecisionType::Indeterminate);
        assert_eq!(early[0].status.code, StatusCode::ProcessingError);
    }

    #[test]
    fn test_combined_filter_rejects_pep_actions() {
        let mut actions = PepActionsBuilder::new();
        actions.add(PepAction::obligation("log", EffectType::Permit));
        let with_obligation =
            DecisionResult::new(ExtendedDecision::Permit, actions.build(), Vec::new());
        let mut collector = CombinedDecisionResultFilter.new_collector(1, true);
        let early = feed(&mut collector, vec![with_obligation]).unwrap();
        assert_eq!(early[0].decision, DecisionType::Indeterminate);
    }

    #[test]
    fn test_combined_filter_without_combining_behaves_like_default() {
        let inputs = vec![
            result(ExtendedDecision::Permit, "a"),
            result(ExtendedDecision::Deny, "b"),
        ];
        let mut collector = CombinedDecisionResultFilter.new_collector(2, false);
        assert!(feed(&mut collector, inputs.clone()).is_none());
        assert_eq!(collector.filtered_results(), inputs);
    }
}
