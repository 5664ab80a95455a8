use arbiter_core::{AttributeKey, AttributeValue, IndividualDecisionRequest};

/// Per-request evaluation state.
///
/// Read-only: the accumulators for PEP actions and applicable policy ids are
/// passed explicitly to the combining evaluators, so a context can be shared
/// by reference across a whole evaluation and dropped afterwards.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    request: &'a IndividualDecisionRequest,
    strict_attribute_issuer_match: bool,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(request: &'a IndividualDecisionRequest) -> Self {
        Self {
            request,
            strict_attribute_issuer_match: false,
        }
    }

    pub fn with_strict_issuer_match(mut self, strict: bool) -> Self {
        self.strict_attribute_issuer_match = strict;
        self
    }

    pub fn request(&self) -> &'a IndividualDecisionRequest {
        self.request
    }

    /// Bag of values for (category, id, datatype[, issuer]).
    pub fn attribute(&self, key: &AttributeKey) -> Vec<&'a AttributeValue> {
        self.request
            .lookup(key, self.strict_attribute_issuer_match)
    }

    pub fn applicable_policy_ids_requested(&self) -> bool {
        self.request.return_policy_id_list()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbiter_core::{categories, DatatypeId, StringValue};

    #[test]
    fn test_context_lookup_honours_strict_flag() {
        let key = AttributeKey::new(categories::RESOURCE, "resource-id", DatatypeId::String);
        let req = IndividualDecisionRequest::new().with_attribute(
            key.clone().with_issuer("cms"),
            AttributeValue::String(StringValue::new("doc-1")),
        );

        let lenient = EvaluationContext::new(&req);
        assert_eq!(lenient.attribute(&key).len(), 1);

        let strict = EvaluationContext::new(&req).with_strict_issuer_match(true);
        assert!(strict.attribute(&key).is_empty());
    }

    #[test]
    fn test_applicable_ids_flag() {
        let req = IndividualDecisionRequest::new().with_return_policy_id_list(true);
        assert!(EvaluationContext::new(&req).applicable_policy_ids_requested());
    }
}
