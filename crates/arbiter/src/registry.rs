//! Registry of the PDP's pluggable extensions, keyed by stable string ids.

use std::collections::HashMap;
use std::sync::Arc;

use arbiter_policy::{CombiningAlg, CombiningAlgRegistry, Function, FunctionRegistry};
use tracing::debug;

use crate::cache::{DecisionCache, DecisionCacheFactory, InMemoryDecisionCacheFactory};
use crate::config::{DecisionCacheConfig, PdpConfig};
use crate::error::{PdpError, PdpResult};
use crate::filter::{CombinedDecisionResultFilter, DecisionResultFilter, DefaultResultFilter};

#[derive(Debug)]
pub struct ExtensionRegistry {
    functions: FunctionRegistry,
    combining_algorithms: Vec<Arc<dyn CombiningAlg>>,
    cache_factories: HashMap<String, Arc<dyn DecisionCacheFactory>>,
    result_filters: HashMap<String, Arc<dyn DecisionResultFilter>>,
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

impl ExtensionRegistry {
    /// Standard functions, caches (in-memory, and sqlite when the feature
    /// is enabled) and result filters.
    pub fn standard() -> Self {
        let mut registry = Self {
            functions: FunctionRegistry::standard(),
            combining_algorithms: Vec::new(),
            cache_factories: HashMap::new(),
            result_filters: HashMap::new(),
        };
        let mut factories: Vec<Arc<dyn DecisionCacheFactory>> =
            vec![Arc::new(InMemoryDecisionCacheFactory)];
        #[cfg(feature = "sqlite")]
        factories.push(Arc::new(crate::cache::SqliteDecisionCacheFactory));
        for factory in factories {
            registry
                .cache_factories
                .insert(factory.id().to_string(), factory);
        }
        let filters: Vec<Arc<dyn DecisionResultFilter>> = vec![
            Arc::new(DefaultResultFilter),
            Arc::new(CombinedDecisionResultFilter),
        ];
        for filter in filters {
            registry.result_filters.insert(filter.id().to_string(), filter);
        }
        registry
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn register_function(&mut self, function: Arc<dyn Function>) -> PdpResult<()> {
        Ok(self.functions.register(function)?)
    }

    pub fn register_combining_algorithm(&mut self, alg: Arc<dyn CombiningAlg>) -> PdpResult<()> {
        let mut check = CombiningAlgRegistry::standard(true);
        for existing in &self.combining_algorithms {
            check.register(Arc::clone(existing))?;
        }
        check.register(Arc::clone(&alg))?;
        self.combining_algorithms.push(alg);
        Ok(())
    }

    pub fn register_cache_factory(&mut self, factory: Arc<dyn DecisionCacheFactory>) -> PdpResult<()> {
        let id = factory.id().to_string();
        if self.cache_factories.contains_key(&id) {
            return Err(PdpError::Config(format!(
                "decision cache {} is already registered",
                id
            )));
        }
        self.cache_factories.insert(id, factory);
        Ok(())
    }

    pub fn register_result_filter(&mut self, filter: Arc<dyn DecisionResultFilter>) -> PdpResult<()> {
        let id = filter.id().to_string();
        if self.result_filters.contains_key(&id) {
            return Err(PdpError::Config(format!(
                "result filter {} is already registered",
                id
            )));
        }
        self.result_filters.insert(id, filter);
        Ok(())
    }

    /// Standard plus registered combining algorithms, with legacy support
    /// as configured.
    pub fn combining_algorithms(&self, config: &PdpConfig) -> CombiningAlgRegistry {
        let mut registry = CombiningAlgRegistry::standard(config.enable_legacy_combining_algorithms);
        for alg in &self.combining_algorithms {
            if let Err(e) = registry.register(Arc::clone(alg)) {
                debug!(algorithm = alg.id(), error = %e, "skipping duplicate combining algorithm");
            }
        }
        registry
    }

    pub fn result_filter(&self, id: &str) -> PdpResult<Arc<dyn DecisionResultFilter>> {
        self.result_filters
            .get(id)
            .cloned()
            .ok_or_else(|| PdpError::Config(format!("unknown result filter type '{}'", id)))
    }

    pub fn new_cache(&self, config: &DecisionCacheConfig) -> PdpResult<Box<dyn DecisionCache>> {
        self.cache_factory(config)?.new_cache(&config.params)
    }

    /// Check a cache configuration without building the cache.
    pub fn validate_cache(&self, config: &DecisionCacheConfig) -> PdpResult<()> {
        self.cache_factory(config)?.validate(&config.params)
    }

    fn cache_factory(&self, config: &DecisionCacheConfig) -> PdpResult<&dyn DecisionCacheFactory> {
        self.cache_factories
            .get(&config.kind)
            .map(|f| f.as_ref())
            .ok_or_else(|| PdpError::Config(format!("unknown decision cache type '{}'", config.kind)))
    }

    pub fn cache_ids(&self) -> Vec<&str> {
        sorted_keys(&self.cache_factories)
    }

    pub fn result_filter_ids(&self) -> Vec<&str> {
        sorted_keys(&self.result_filters)
    }
}

fn sorted_keys<V>(map: &HashMap<String, V>) -> Vec<&str> {
    let mut ids: Vec<&str> = map.keys().map(String::as_str).collect();
    ids.sort_unstable();
    ids
}
