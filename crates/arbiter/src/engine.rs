//! The policy decision point: evaluates individual decision requests
//! against a root policy, through the decision cache and result filter.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arbiter_core::{DecisionResult, DecisionType, IndividualDecisionRequest};
use arbiter_policy::{Decidable, EvaluationContext};
use tracing::{debug, info, warn};

use crate::cache::DecisionCache;
use crate::config::PdpConfig;
use crate::error::{PdpError, PdpResult};
use crate::filter::DecisionResultFilter;
use crate::registry::ExtensionRegistry;

pub struct Pdp {
    root: Arc<dyn Decidable>,
    strict_attribute_issuer_match: bool,
    cache: Option<Box<dyn DecisionCache>>,
    filter: Arc<dyn DecisionResultFilter>,
}

impl fmt::Debug for Pdp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pdp")
            .field("root", &self.root.id())
            .field("strict_attribute_issuer_match", &self.strict_attribute_issuer_match)
            .field("cache", &self.cache)
            .field("filter", &self.filter.id())
            .finish()
    }
}

impl Pdp {
    /// Build a PDP over `root`. The cache and result filter named in
    /// `config` are looked up in `registry`; any misconfiguration fails here.
    pub fn new(
        root: Arc<dyn Decidable>,
        config: &PdpConfig,
        registry: &ExtensionRegistry,
    ) -> PdpResult<Self> {
        config.validate()?;
        let filter = registry.result_filter(&config.result_filter.kind)?;
        let cache = config
            .decision_cache
            .as_ref()
            .map(|c| registry.new_cache(c))
            .transpose()?;
        info!(
            root = root.id(),
            filter = filter.id(),
            cache = config.decision_cache.as_ref().map(|c| c.kind.as_str()),
            strict_issuer = config.strict_attribute_issuer_match,
            "PDP initialized"
        );
        Ok(Self {
            root,
            strict_attribute_issuer_match: config.strict_attribute_issuer_match,
            cache,
            filter,
        })
    }

    /// Evaluate one request, consulting the cache.
    pub fn evaluate(&self, request: &IndividualDecisionRequest) -> DecisionResult {
        let requests = std::slice::from_ref(request);
        if let Some(result) = self.cached(requests).remove(request).flatten() {
            return result;
        }
        let result = self.evaluate_uncached(request);
        self.store(&[(request.clone(), result.clone())]);
        result
    }

    /// Evaluate a batch of requests and pass the results through the result
    /// filter. `combine` asks for a single combined decision and is rejected
    /// if the configured filter cannot do that.
    pub fn evaluate_all(
        &self,
        requests: &[IndividualDecisionRequest],
        combine: bool,
    ) -> PdpResult<Vec<DecisionResult>> {
        if combine && !self.filter.supports_multiple_decision_combining() {
            return Err(PdpError::Unsupported(format!(
                "result filter '{}' does not support combined decisions",
                self.filter.id()
            )));
        }

        let cached = self.cached(requests);
        let mut computed = Vec::new();
        let mut collector = self.filter.new_collector(requests.len(), combine);
        let mut early = None;
        for request in requests {
            let result = match cached.get(request).cloned().flatten() {
                Some(hit) => hit,
                None => {
                    let result = self.evaluate_uncached(request);
                    computed.push((request.clone(), result.clone()));
                    result
                }
            };
            if let Some(results) = collector.add_result(request, result) {
                early = Some(results);
                break;
            }
        }
        self.store(&computed);
        Ok(match early {
            Some(results) => results,
            None => collector.filtered_results(),
        })
    }

    /// Release the decision cache.
    pub fn close(self) -> PdpResult<()> {
        if let Some(cache) = self.cache {
            cache.close()?;
        }
        info!(root = self.root.id(), "PDP closed");
        Ok(())
    }

    fn evaluate_uncached(&self, request: &IndividualDecisionRequest) -> DecisionResult {
        let ctx = EvaluationContext::new(request)
            .with_strict_issuer_match(self.strict_attribute_issuer_match);
        let mut applicable = Vec::new();
        let sink = if ctx.applicable_policy_ids_requested() {
            Some(&mut applicable)
        } else {
            None
        };
        let outcome = self.root.evaluate(&ctx, sink);
        let result = DecisionResult::new(outcome.decision, outcome.pep_actions, applicable);
        if result.decision == DecisionType::Indeterminate {
            warn!(
                root = self.root.id(),
                status = %result.status.code,
                message = result.status.message.as_deref().unwrap_or(""),
                "Indeterminate decision"
            );
        } else {
            debug!(root = self.root.id(), decision = %result.decision, "decision");
        }
        result
    }

    /// Cache lookup; a failing cache counts as all misses.
    fn cached<'a>(
        &self,
        requests: &'a [IndividualDecisionRequest],
    ) -> HashMap<&'a IndividualDecisionRequest, Option<DecisionResult>> {
        let Some(cache) = &self.cache else {
            return HashMap::new();
        };
        match cache.get_all(requests) {
            Ok(found) => {
                debug!(
                    requests = requests.len(),
                    hits = found.values().filter(|r| r.is_some()).count(),
                    "decision cache lookup"
                );
                found
            }
            Err(e) => {
                warn!(error = %e, "decision cache lookup failed");
                HashMap::new()
            }
        }
    }

    fn store(&self, entries: &[(IndividualDecisionRequest, DecisionResult)]) {
        let Some(cache) = &self.cache else {
            return;
        };
        if entries.is_empty() {
            return;
        }
        if let Err(e) = cache.put_all(entries) {
            warn!(error = %e, entries = entries.len(), "decision cache update failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DecisionCacheConfig, ResultFilterConfig};
    use crate::error::{CacheError, CacheResult};
    use crate::filter::COMBINED_DECISION_FILTER_ID;
    use arbiter_core::{
        categories, AttributeKey, DatatypeId, EffectType, PolicyRef, StringValue,
    };
    use arbiter_policy::{
        AttributeDesignator, CombinedElement, Constant, PepActionExpression, Policy, Rule,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    const FIRST_APPLICABLE: &str =
        "urn:oasis:names:tc:xacml:1.0:rule-combining-algorithm:first-applicable";

    fn subject_key() -> AttributeKey {
        AttributeKey::new(categories::ACCESS_SUBJECT, "subject-id", DatatypeId::String)
    }

    fn request(subject: &str) -> IndividualDecisionRequest {
        IndividualDecisionRequest::new().with_attribute(subject_key(), StringValue::new(subject).into())
    }

    /// Permit for "alice", Deny otherwise; Indeterminate without a subject.
    fn root_policy(registry: &ExtensionRegistry) -> Arc<dyn Decidable> {
        let is_alice = registry
            .functions()
            .call(
                "urn:oasis:names:tc:xacml:1.0:function:string-equal",
                vec![
                    AttributeDesignator::new(subject_key(), true).into_ref(),
                    Constant::new(StringValue::new("alice")).into_ref(),
                ],
            )
            .unwrap();
        let rules = vec![
            CombinedElement::new(Arc::new(
                Rule::new("permit-alice", EffectType::Permit)
                    .with_condition(is_alice)
                    .unwrap(),
            )),
            CombinedElement::new(Arc::new(Rule::new("deny-rest", EffectType::Deny))),
        ];
        Arc::new(
            Policy::new(
                PolicyRef::policy("root", "1.0"),
                &registry.combining_algorithms(&PdpConfig::default()),
                FIRST_APPLICABLE,
                rules,
            )
            .unwrap(),
        )
    }

    #[derive(Debug, Default)]
    struct FailingCache {
        puts: Arc<AtomicUsize>,
    }

    impl DecisionCache for FailingCache {
        fn get_all<'a>(
            &self,
            _requests: &'a [IndividualDecisionRequest],
        ) -> CacheResult<HashMap<&'a IndividualDecisionRequest, Option<DecisionResult>>> {
            Err(CacheError::Storage("unreachable".into()))
        }

        fn put_all(
            &self,
            _entries: &[(IndividualDecisionRequest, DecisionResult)],
        ) -> CacheResult<()> {
            self.puts.fetch_add(1, Ordering::SeqCst);
            Err(CacheError::Storage("unreachable".into()))
        }

        fn close(self: Box<Self>) -> CacheResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_evaluate_single_request() {
        let registry = ExtensionRegistry::standard();
        let pdp = Pdp::new(root_policy(&registry), &PdpConfig::default(), &registry).unwrap();
        assert_eq!(pdp.evaluate(&request("alice")).decision, DecisionType::Permit);
        assert_eq!(pdp.evaluate(&request("bob")).decision, DecisionType::Deny);
        let missing = pdp.evaluate(&IndividualDecisionRequest::new());
        assert_eq!(missing.decision, DecisionType::Indeterminate);
        pdp.close().unwrap();
    }

    #[test]
    fn test_combined_rejected_by_default_filter() {
        let registry = ExtensionRegistry::standard();
        let pdp = Pdp::new(root_policy(&registry), &PdpConfig::default(), &registry).unwrap();
        let err = pdp.evaluate_all(&[request("alice")], true).unwrap_err();
        assert!(matches!(err, PdpError::Unsupported(_)));
    }

    #[test]
    fn test_combined_decision_filter() {
        let registry = ExtensionRegistry::standard();
        let config = PdpConfig {
            result_filter: ResultFilterConfig {
                kind: COMBINED_DECISION_FILTER_ID.into(),
            },
            ..PdpConfig::default()
        };
        let pdp = Pdp::new(root_policy(&registry), &config, &registry).unwrap();
        let same = pdp
            .evaluate_all(&[request("bob"), request("carol")], true)
            .unwrap();
        assert_eq!(same.len(), 1);
        assert_eq!(same[0].decision, DecisionType::Deny);

        let mixed = pdp
            .evaluate_all(&[request("alice"), request("bob")], true)
            .unwrap();
        assert_eq!(mixed.len(), 1);
        assert_eq!(mixed[0].decision, DecisionType::Indeterminate);
    }

    #[test]
    fn test_cache_failures_do_not_fail_decisions() {
        let registry = ExtensionRegistry::standard();
        let puts = Arc::new(AtomicUsize::new(0));
        let pdp = Pdp {
            root: root_policy(&registry),
            strict_attribute_issuer_match: false,
            cache: Some(Box::new(FailingCache {
                puts: Arc::clone(&puts),
            })),
            filter: registry.result_filter("default").unwrap(),
        };
        let results = pdp
            .evaluate_all(&[request("alice"), request("bob")], false)
            .unwrap();
        assert_eq!(results[0].decision, DecisionType::Permit);
        assert_eq!(results[1].decision, DecisionType::Deny);
        assert_eq!(puts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_cache_type_fails_construction() {
        let registry = ExtensionRegistry::standard();
        let config = PdpConfig {
            decision_cache: Some(DecisionCacheConfig::new("memcached")),
            ..PdpConfig::default()
        };
        assert!(matches!(
            Pdp::new(root_policy(&registry), &config, &registry),
            Err(PdpError::Config(_))
        ));
    }

    #[test]
    fn test_applicable_policies_only_when_requested() {
        let registry = ExtensionRegistry::standard();
        let pdp = Pdp::new(root_policy(&registry), &PdpConfig::default(), &registry).unwrap();
        assert!(pdp.evaluate(&request("alice")).applicable_policies.is_empty());
        let with_ids = pdp.evaluate(&request("alice").with_return_policy_id_list(true));
        assert_eq!(
            with_ids.applicable_policies,
            vec![PolicyRef::policy("root", "1.0")]
        );
    }

    #[test]
    fn test_pep_actions_in_result() {
        let registry = ExtensionRegistry::standard();
        let rule = Rule::new("permit-all", EffectType::Permit).with_pep_action(
            PepActionExpression::obligation("audit", EffectType::Permit),
        );
        let policy = Policy::new(
            PolicyRef::policy("p", "1.0"),
            &registry.combining_algorithms(&PdpConfig::default()),
            FIRST_APPLICABLE,
            vec![CombinedElement::new(Arc::new(rule))],
        )
        .unwrap();
        let pdp = Pdp::new(Arc::new(policy), &PdpConfig::default(), &registry).unwrap();
        let result = pdp.evaluate(&request("anyone"));
        assert_eq!(result.pep_actions.obligations().len(), 1);
        assert_eq!(result.pep_actions.obligations()[0].id, "audit");
    }
}
