//! Individual decision requests: the unit of evaluation and the cache key.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::value::{AttributeValue, DatatypeId};

/// Standard XACML attribute category identifiers.
pub mod categories {
    pub const ACCESS_SUBJECT: &str = "urn:oasis:names:tc:xacml:1.0:subject-category:access-subject";
    pub const RESOURCE: &str = "urn:oasis:names:tc:xacml:3.0:attribute-category:resource";
    pub const ACTION: &str = "urn:oasis:names:tc:xacml:3.0:attribute-category:action";
    pub const ENVIRONMENT: &str = "urn:oasis:names:tc:xacml:3.0:attribute-category:environment";
}

// ---------------------------------------------------------------------------
// AttributeKey
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttributeKey {
    pub category: String,
    pub id: String,
    pub datatype: DatatypeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
}

impl AttributeKey {
    pub fn new(category: impl Into<String>, id: impl Into<String>, datatype: DatatypeId) -> Self {
        Self {
            category: category.into(),
            id: id.into(),
            datatype,
            issuer: None,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    fn same_name(&self, other: &AttributeKey) -> bool {
        self.category == other.category && self.id == other.id && self.datatype == other.datatype
    }
}

// ---------------------------------------------------------------------------
// IndividualDecisionRequest
// ---------------------------------------------------------------------------

/// One attribute set evaluated to one decision.
///
/// Equality and hashing cover the full semantic content (ordered attribute
/// map and the applicable-policy-id flag), so it serves directly as a
/// decision cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndividualDecisionRequest {
    #[serde(with = "attribute_entries")]
    attributes: BTreeMap<AttributeKey, Vec<AttributeValue>>,
    #[serde(default)]
    return_policy_id_list: bool,
}

impl IndividualDecisionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one value to the bag of `key`.
    pub fn with_attribute(mut self, key: AttributeKey, value: AttributeValue) -> Self {
        self.add_attribute(key, value);
        self
    }

    pub fn add_attribute(&mut self, key: AttributeKey, value: AttributeValue) {
        self.attributes.entry(key).or_default().push(value);
    }

    pub fn with_return_policy_id_list(mut self, requested: bool) -> Self {
        self.return_policy_id_list = requested;
        self
    }

    pub fn return_policy_id_list(&self) -> bool {
        self.return_policy_id_list
    }

    /// Exact lookup, issuer included.
    pub fn attribute(&self, key: &AttributeKey) -> Option<&[AttributeValue]> {
        self.attributes.get(key).map(Vec::as_slice)
    }

    /// Values of every attribute with the same category, id and datatype as
    /// `key`. An issuer on `key` restricts matches to that issuer; without
    /// one, attributes from any issuer match unless `strict_issuer` is set,
    /// in which case only attributes without an issuer match.
    pub fn lookup(&self, key: &AttributeKey, strict_issuer: bool) -> Vec<&AttributeValue> {
        if strict_issuer {
            return self
                .attribute(key)
                .map(|values| values.iter().collect())
                .unwrap_or_default();
        }
        self.attributes
            .iter()
            .filter(|(k, _)| k.same_name(key))
            .filter(|(k, _)| key.issuer.is_none() || k.issuer == key.issuer)
            .flat_map(|(_, values)| values.iter())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AttributeKey, &[AttributeValue])> {
        self.attributes.iter().map(|(k, v)| (k, v.as_slice()))
    }
}

/// Serialize the attribute map as a list of `[key, values]` entries; JSON
/// object keys must be strings. Entries repeating a key merge into one bag.
mod attribute_entries {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<AttributeKey, Vec<AttributeValue>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(map.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<AttributeKey, Vec<AttributeValue>>, D::Error> {
        let entries = Vec::<(AttributeKey, Vec<AttributeValue>)>::deserialize(deserializer)?;
        let mut map: BTreeMap<AttributeKey, Vec<AttributeValue>> = BTreeMap::new();
        for (key, values) in entries {
            map.entry(key).or_default().extend(values);
        }
        Ok(map)
    }
}
