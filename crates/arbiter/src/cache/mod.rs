//! Decision caches: batched memo of individual request -> result.

pub mod in_memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use arbiter_core::{DecisionResult, IndividualDecisionRequest};

use crate::error::{CacheResult, PdpError, PdpResult};

pub use in_memory::{InMemoryDecisionCache, InMemoryDecisionCacheFactory};
#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteDecisionCache, SqliteDecisionCacheFactory};

pub trait DecisionCache: Send + Sync + fmt::Debug {
    /// Look up every request. The map has exactly one entry per distinct
    /// request, `None` on a miss.
    fn get_all<'a>(
        &self,
        requests: &'a [IndividualDecisionRequest],
    ) -> CacheResult<HashMap<&'a IndividualDecisionRequest, Option<DecisionResult>>>;

    /// Store results. Callers treat failures as non-fatal.
    fn put_all(&self, entries: &[(IndividualDecisionRequest, DecisionResult)]) -> CacheResult<()>;

    /// Release the underlying resources.
    fn close(self: Box<Self>) -> CacheResult<()>;
}

/// Builds a cache from the parameters of a `[decision_cache]` table whose
/// `type` is [`DecisionCacheFactory::id`].
pub trait DecisionCacheFactory: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    /// Check the parameters without opening or creating anything.
    fn validate(&self, params: &toml::Table) -> PdpResult<()>;

    fn new_cache(&self, params: &toml::Table) -> PdpResult<Box<dyn DecisionCache>>;
}

// ---------------------------------------------------------------------------
// Parameter helpers shared by the factories
// ---------------------------------------------------------------------------

fn reject_unknown(cache: &str, params: &toml::Table, known: &[&str]) -> PdpResult<()> {
    match params.keys().find(|k| !known.contains(&k.as_str())) {
        Some(key) => Err(PdpError::Config(format!(
            "{} cache: unknown parameter '{}'",
            cache, key
        ))),
        None => Ok(()),
    }
}

fn positive_integer(cache: &str, params: &toml::Table, name: &str) -> PdpResult<Option<u64>> {
    match params.get(name) {
        None => Ok(None),
        Some(toml::Value::Integer(n)) if *n > 0 => Ok(Some(*n as u64)),
        Some(other) => Err(PdpError::Config(format!(
            "{} cache: '{}' must be a positive integer, got {}",
            cache, name, other
        ))),
    }
}

fn ttl(cache: &str, params: &toml::Table) -> PdpResult<Option<Duration>> {
    Ok(positive_integer(cache, params, "ttl_secs")?.map(Duration::from_secs))
}
